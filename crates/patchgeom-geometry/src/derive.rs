//! Axis values read off a tensor spec, with the defaults a model without the
//! axis implies.

use patchgeom_core::{AxisLabel, TensorSpec};

use crate::ReferenceInput;

/// Size of `label` in `spec`. An absent batch, channel or depth axis counts
/// as 1; so does an unbound batch axis. Anything else absent or unbound is
/// `None`.
pub fn derive_axis_value(spec: &TensorSpec, label: AxisLabel) -> Option<usize> {
    match spec.form.index_of(label) {
        Some(i) if label.is_batch() => Some(spec.shape.get(i).unwrap_or(1)),
        Some(i) => spec.shape.get(i),
        None => match label {
            AxisLabel::Batch | AxisLabel::Channel | AxisLabel::Depth => Some(1),
            _ => None,
        },
    }
}

pub fn batch_size(spec: &TensorSpec) -> usize {
    derive_axis_value(spec, AxisLabel::Batch).unwrap_or(1)
}

pub fn channel_count(spec: &TensorSpec) -> Option<usize> {
    derive_axis_value(spec, AxisLabel::Channel)
}

pub fn slice_count(spec: &TensorSpec) -> Option<usize> {
    derive_axis_value(spec, AxisLabel::Depth)
}

/// Input size along `label` when the input cannot vary there.
pub fn find_fixed_reference_size(input: &ReferenceInput, label: AxisLabel) -> Option<usize> {
    let i = input.spec.form.index_of(label)?;
    (input.step[i] == 0).then(|| input.minimum_size[i])
}

/// Ratio of the output's declared size to the fixed input size along
/// `label`, when both are known.
pub fn suggested_scale(input: &ReferenceInput, output: &TensorSpec, label: AxisLabel) -> Option<f64> {
    let fixed = find_fixed_reference_size(input, label).filter(|s| *s > 0)?;
    let declared = output.size_of(label)?;
    Some(declared as f64 / fixed as f64)
}
