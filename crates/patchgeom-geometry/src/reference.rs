use patchgeom_core::{AxisLabel, Error, Result, TensorSpec};
use serde::Serialize;

/// An input tensor together with the patch constraints the model accepts on
/// it. Every per-axis vector is indexed like `spec.form`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReferenceInput {
    pub spec: TensorSpec,
    pub minimum_size: Vec<usize>,
    /// `0` means the axis is fixed at `minimum_size`.
    pub step: Vec<usize>,
    /// Patch size used when processing; `None` until chosen.
    pub patch: Vec<Option<usize>>,
}

impl ReferenceInput {
    /// Bound axes are fixed at their declared size, unbound axes accept any
    /// size from 1 up.
    pub fn from_spec(spec: TensorSpec) -> Self {
        let rank = spec.rank();
        let mut minimum_size = Vec::with_capacity(rank);
        let mut step = Vec::with_capacity(rank);
        let mut patch = Vec::with_capacity(rank);
        for (i, label) in spec.form.labels().iter().enumerate() {
            match (label.is_batch(), spec.shape.get(i)) {
                (true, _) => {
                    minimum_size.push(1);
                    step.push(0);
                    patch.push(Some(1));
                }
                (false, Some(size)) => {
                    minimum_size.push(size);
                    step.push(0);
                    patch.push(Some(size));
                }
                (false, None) => {
                    minimum_size.push(1);
                    step.push(1);
                    patch.push(None);
                }
            }
        }
        Self {
            spec,
            minimum_size,
            step,
            patch,
        }
    }

    /// Overrides the constraints on one axis.
    pub fn with_axis(
        mut self,
        label: AxisLabel,
        minimum_size: usize,
        step: usize,
        patch: Option<usize>,
    ) -> Result<Self> {
        let i = self
            .spec
            .form
            .index_of(label)
            .ok_or_else(|| Error::InvalidForm {
                form: self.spec.form.to_string(),
                detail: format!("input `{}` has no axis `{label}`", self.spec.name),
            })?;
        self.minimum_size[i] = minimum_size;
        self.step[i] = step;
        self.patch[i] = patch;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.spec.name.0
    }

    /// Patch size along `label`. The batch axis is always processed one item
    /// at a time.
    pub fn patch_size(&self, label: AxisLabel) -> Option<usize> {
        if label.is_batch() {
            return Some(1);
        }
        self.spec
            .form
            .index_of(label)
            .and_then(|i| self.patch[i])
    }
}
