use patchgeom_core::{Result, TensorSpec, ViolationReason};
use serde::Serialize;

use crate::violation;

/// A validated pyramid level: one positive size per output axis.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PyramidalGeometry {
    pub level_sizes: Vec<usize>,
}

impl PyramidalGeometry {
    /// Declared sizes where bound, `0` (still to be entered) where not.
    pub fn defaults(output: &TensorSpec) -> Vec<i64> {
        output
            .form
            .labels()
            .iter()
            .enumerate()
            .map(|(i, label)| {
                if label.is_batch() {
                    1
                } else {
                    output.shape.get(i).map_or(0, |s| s as i64)
                }
            })
            .collect()
    }
}

pub fn validate_pyramidal_geometry(output: &TensorSpec, levels: &[i64]) -> Result<PyramidalGeometry> {
    let tensor = &output.name.0;
    if levels.len() != output.rank() {
        return Err(violation(
            tensor,
            None,
            ViolationReason::ArityMismatch,
            Some(output.rank() as i64),
            levels.len() as i64,
        ));
    }

    let level_sizes = output
        .form
        .labels()
        .iter()
        .zip(levels)
        .map(|(&label, &size)| {
            if label.is_batch() {
                return Ok(1);
            }
            usize::try_from(size)
                .ok()
                .filter(|s| *s > 0)
                .ok_or_else(|| {
                    violation(
                        tensor,
                        Some(label),
                        ViolationReason::NonPositiveLevel,
                        None,
                        size,
                    )
                })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(PyramidalGeometry { level_sizes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchgeom_core::{AxisLabel, Shape};

    fn output(dims: &[i64]) -> TensorSpec {
        TensorSpec::new("level_1", "BYXC".parse().unwrap(), Shape::from_signed(dims)).unwrap()
    }

    #[test]
    fn defaults_leave_unbound_axes_empty() {
        assert_eq!(PyramidalGeometry::defaults(&output(&[-1, 64, -1, 3])), vec![1, 64, 0, 3]);
    }

    #[test]
    fn positive_sizes_are_accepted_and_batch_is_one() {
        let geometry = validate_pyramidal_geometry(&output(&[-1, 64, -1, 3]), &[7, 64, 32, 3]).unwrap();
        assert_eq!(geometry.level_sizes, vec![1, 64, 32, 3]);
    }

    #[test]
    fn non_positive_level_names_the_axis() {
        let out = output(&[-1, 64, -1, 3]);
        let err = validate_pyramidal_geometry(&out, &PyramidalGeometry::defaults(&out)).unwrap_err();
        let v = err.violation().unwrap();
        assert_eq!(v.reason, ViolationReason::NonPositiveLevel);
        assert_eq!(v.axis, Some(AxisLabel::Width));
        assert_eq!(v.actual, 0);

        assert!(validate_pyramidal_geometry(&out, &[1, -4, 32, 3]).is_err());
        assert!(validate_pyramidal_geometry(&out, &[1, 64, 32]).is_err());
    }
}
