use patchgeom_core::{AxisForm, AxisLabel, Error, ListRole, Result, TensorSpec, ViolationReason};
use serde::Serialize;

use crate::violation;

/// A tabular output after its axes were given row/column roles.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ListGeometry {
    pub roles: Vec<ListRole>,
    /// Original form, before the roles replaced it.
    pub source_form: AxisForm,
}

/// First non-batch axis as rows, every other one as columns.
pub fn default_list_roles(output: &TensorSpec) -> Vec<ListRole> {
    output
        .form
        .working_labels()
        .enumerate()
        .map(|(i, _)| if i == 0 { ListRole::Row } else { ListRole::Column })
        .collect()
}

/// Rewrites `output`'s form with one role per non-batch axis, in order. The
/// batch axis keeps its position.
pub fn remap_list_axes(output: &TensorSpec, roles: &[ListRole]) -> Result<TensorSpec> {
    let working: Vec<AxisLabel> = output.form.working_labels().collect();
    if roles.len() != working.len() {
        return Err(violation(
            &output.name.0,
            None,
            ViolationReason::ArityMismatch,
            Some(working.len() as i64),
            roles.len() as i64,
        ));
    }

    for (i, role) in roles.iter().enumerate() {
        if let Some(j) = roles[..i].iter().position(|r| r == role) {
            return Err(Error::DuplicateRoleAssignment {
                tensor: output.name.0.clone(),
                role: *role,
                first: working[j],
                second: working[i],
            });
        }
    }

    let mut roles = roles.iter();
    let labels = output
        .form
        .labels()
        .iter()
        .map(|&label| match label {
            AxisLabel::Batch => AxisLabel::Batch,
            _ => roles.next().map_or(label, |r| r.label()),
        })
        .collect();
    output.with_form(AxisForm::new(labels)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchgeom_core::{ErrorKind, Shape};

    fn output(form: &str, dims: &[i64]) -> TensorSpec {
        TensorSpec::new("detections", form.parse().unwrap(), Shape::from_signed(dims)).unwrap()
    }

    #[test]
    fn roles_replace_working_axes() {
        let table = remap_list_axes(
            &output("BYX", &[-1, 100, 6]),
            &[ListRole::Row, ListRole::Column],
        )
        .unwrap();
        assert_eq!(table.form.to_string(), "NRC");
        assert_eq!(table.size_of(AxisLabel::Column), Some(6));
    }

    #[test]
    fn batch_keeps_its_position() {
        let table = remap_list_axes(
            &output("YXB", &[6, 100, -1]),
            &[ListRole::Column, ListRole::Row],
        )
        .unwrap();
        assert_eq!(
            table.form.labels(),
            &[AxisLabel::Column, AxisLabel::Row, AxisLabel::Batch]
        );
    }

    #[test]
    fn duplicate_role_names_both_axes() {
        let err = remap_list_axes(
            &output("BYX", &[-1, 100, 6]),
            &[ListRole::Row, ListRole::Row],
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateRoleAssignment);
        match err {
            Error::DuplicateRoleAssignment { first, second, .. } => {
                assert_eq!(first, AxisLabel::Height);
                assert_eq!(second, AxisLabel::Width);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn role_count_must_match() {
        let err = remap_list_axes(&output("BYX", &[-1, 100, 6]), &[ListRole::Row]).unwrap_err();
        assert_eq!(err.violation().unwrap().reason, ViolationReason::ArityMismatch);
    }

    #[test]
    fn default_roles_are_row_then_columns() {
        assert_eq!(
            default_list_roles(&output("BYX", &[-1, 100, 6])),
            vec![ListRole::Row, ListRole::Column]
        );
    }
}
