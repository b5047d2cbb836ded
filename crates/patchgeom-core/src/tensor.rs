use serde::Serialize;
use smallvec::SmallVec;

use crate::{AxisForm, AxisLabel, Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    F32,
    F16,
    F64,
    I64,
    I32,
    U8,
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct IOName(pub String);

impl std::fmt::Display for IOName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-axis sizes. `None` = unbound, the model accepts any size there.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Shape(pub SmallVec<[Option<usize>; 6]>);

impl Shape {
    pub fn from_slice(d: &[Option<usize>]) -> Self {
        Self(d.iter().copied().collect())
    }

    /// Backend dims use negative values for unknown sizes.
    pub fn from_signed(d: &[i64]) -> Self {
        Self(
            d.iter()
                .map(|&v| usize::try_from(v).ok())
                .collect(),
        )
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, index: usize) -> Option<usize> {
        self.0.get(index).copied().flatten()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TensorSpec {
    pub name: IOName,
    pub form: AxisForm,
    pub shape: Shape,
}

impl TensorSpec {
    pub fn new(name: impl Into<String>, form: AxisForm, shape: Shape) -> Result<Self> {
        let name = IOName(name.into());
        if form.len() != shape.rank() {
            return Err(Error::InvalidForm {
                form: form.to_string(),
                detail: format!(
                    "tensor `{name}` has rank {} but the form names {} axes",
                    shape.rank(),
                    form.len()
                ),
            });
        }
        Ok(Self { name, form, shape })
    }

    /// Same tensor, reinterpreted with a caller-chosen axis form.
    pub fn with_form(&self, form: AxisForm) -> Result<Self> {
        Self::new(self.name.0.clone(), form, self.shape.clone())
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    /// Size at `label`; `None` when the axis is absent or unbound.
    pub fn size_of(&self, label: AxisLabel) -> Option<usize> {
        self.form.index_of(label).and_then(|i| self.shape.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_dims_become_unbound() {
        let shape = Shape::from_signed(&[-1, 256, 256, 3]);
        assert_eq!(shape.get(0), None);
        assert_eq!(shape.get(1), Some(256));
        assert_eq!(shape.rank(), 4);
    }

    #[test]
    fn rank_must_match_form() {
        let form: AxisForm = "BYX".parse().unwrap();
        let err = TensorSpec::new("x", form, Shape::from_signed(&[1, 2])).unwrap_err();
        assert!(err.to_string().contains("rank 2"));
    }

    #[test]
    fn size_of_reads_through_form() {
        let spec = TensorSpec::new(
            "input",
            "BYXC".parse().unwrap(),
            Shape::from_signed(&[-1, 128, -1, 3]),
        )
        .unwrap();
        assert_eq!(spec.size_of(AxisLabel::Height), Some(128));
        assert_eq!(spec.size_of(AxisLabel::Width), None);
        assert_eq!(spec.size_of(AxisLabel::Depth), None);
    }
}
