use patchgeom_core::{AxisLabel, Error, Result, TensorSpec, ViolationReason};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{suggested_scale, violation, ReferenceInput};

/// How one output axis relates to the same axis of the reference input.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AxisGeometry {
    /// Output size per input size.
    pub scale: f64,
    /// Border the caller discards on each side.
    pub halo: i64,
    /// Border the model itself crops on each side.
    pub offset: i64,
}

impl AxisGeometry {
    pub const IDENTITY: Self = Self {
        scale: 1.0,
        halo: 0,
        offset: 0,
    };
}

impl Default for AxisGeometry {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A validated image output. `axes` is indexed like the output's form.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ImageGeometry {
    pub reference: String,
    pub axes: Vec<AxisGeometry>,
}

impl ImageGeometry {
    /// Starting values for an output: the scale implied by fixed sizes where
    /// there is one, identity otherwise.
    pub fn defaults(input: &ReferenceInput, output: &TensorSpec) -> Vec<AxisGeometry> {
        output
            .form
            .labels()
            .iter()
            .map(|&label| {
                if label.is_batch() {
                    return AxisGeometry::IDENTITY;
                }
                AxisGeometry {
                    scale: suggested_scale(input, output, label).unwrap_or(1.0),
                    ..AxisGeometry::IDENTITY
                }
            })
            .collect()
    }
}

/// Output size a patch of `patch` produces along one axis; `None` when it
/// does not fit in an `i64`.
pub fn expected_output_size(patch: usize, axis: &AxisGeometry) -> Option<i64> {
    let scaled = (patch as f64 * axis.scale).round();
    if !scaled.is_finite() || scaled.abs() >= i64::MAX as f64 {
        return None;
    }
    (scaled as i64).checked_sub(axis.offset.checked_mul(2)?)
}

/// Checks `axes` against `output` and the reference input. The batch axis is
/// forced to identity whatever the caller passed.
pub fn validate_image_geometry(
    input: &ReferenceInput,
    output: &TensorSpec,
    axes: &[AxisGeometry],
) -> Result<ImageGeometry> {
    let tensor = &output.name.0;
    if axes.len() != output.rank() {
        return Err(violation(
            tensor,
            None,
            ViolationReason::ArityMismatch,
            Some(output.rank() as i64),
            axes.len() as i64,
        ));
    }

    let mut resolved = Vec::with_capacity(axes.len());
    for (i, (&label, axis)) in output.form.labels().iter().zip(axes).enumerate() {
        if label.is_batch() {
            resolved.push(AxisGeometry::IDENTITY);
            continue;
        }
        if !(axis.scale.is_finite() && axis.scale > 0.0) {
            return Err(scale_violation(tensor, label, ViolationReason::NonPositiveScale, axis));
        }
        if axis.halo < 0 {
            return Err(violation(
                tensor,
                Some(label),
                ViolationReason::NegativeHalo,
                None,
                axis.halo,
            ));
        }

        let declared = output.shape.get(i).and_then(|s| i64::try_from(s).ok());
        let derived = match input.patch_size(label) {
            Some(patch) if input.spec.form.contains(label) => {
                Some(expected_output_size(patch, axis).ok_or_else(|| {
                    scale_violation(tensor, label, ViolationReason::SizeOutOfRange, axis)
                })?)
            }
            _ => None,
        };
        if let (Some(declared), Some(derived)) = (declared, derived) {
            if declared != derived {
                return Err(violation(
                    tensor,
                    Some(label),
                    ViolationReason::SizeMismatch,
                    Some(derived),
                    declared,
                ));
            }
        }

        if let Some(size) = declared.or(derived) {
            let interior = size.saturating_sub(axis.halo.saturating_mul(2));
            if interior <= 0 {
                return Err(violation(
                    tensor,
                    Some(label),
                    ViolationReason::HaloTooLarge,
                    None,
                    interior,
                ));
            }
        }
        resolved.push(*axis);
    }

    debug!(output = %tensor, reference = input.name(), "image geometry accepted");
    Ok(ImageGeometry {
        reference: input.name().to_string(),
        axes: resolved,
    })
}

/// A violation carrying the entered scale, with the offset as `actual`.
fn scale_violation(
    tensor: &str,
    label: AxisLabel,
    reason: ViolationReason,
    axis: &AxisGeometry,
) -> Error {
    let mut err = violation(tensor, Some(label), reason, None, axis.offset);
    if let Error::GeometryViolation(v) = &mut err {
        v.parameter = Some(axis.scale);
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchgeom_core::{ErrorKind, Shape};

    fn spec(name: &str, dims: &[i64]) -> TensorSpec {
        TensorSpec::new(name, "BYXC".parse().unwrap(), Shape::from_signed(dims)).unwrap()
    }

    fn cropped(offset: i64, halo: i64) -> Vec<AxisGeometry> {
        let axis = AxisGeometry {
            scale: 1.0,
            halo,
            offset,
        };
        vec![AxisGeometry::IDENTITY, axis, axis, AxisGeometry::IDENTITY]
    }

    #[test]
    fn offset_crops_both_sides() {
        let input = ReferenceInput::from_spec(spec("input", &[-1, 100, 100, 1]));
        let output = spec("output", &[-1, 80, 80, 1]);
        let geometry = validate_image_geometry(&input, &output, &cropped(10, 0)).unwrap();
        assert_eq!(geometry.reference, "input");
        assert_eq!(geometry.axes[1].offset, 10);
    }

    #[test]
    fn size_mismatch_names_the_axis() {
        let input = ReferenceInput::from_spec(spec("input", &[-1, 100, 100, 1]));
        let output = spec("output", &[-1, 81, 80, 1]);
        let err = validate_image_geometry(&input, &output, &cropped(10, 0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GeometryViolation);
        let v = err.violation().unwrap();
        assert_eq!(v.axis, Some(AxisLabel::Height));
        assert_eq!(v.reason, ViolationReason::SizeMismatch);
        assert_eq!(v.expected, Some(80));
        assert_eq!(v.actual, 81);
    }

    #[test]
    fn halo_must_leave_an_interior() {
        let input = ReferenceInput::from_spec(spec("input", &[-1, 80, 80, 1]));
        let output = spec("output", &[-1, 80, 80, 1]);

        let err = validate_image_geometry(&input, &output, &cropped(0, 40)).unwrap_err();
        assert_eq!(err.violation().unwrap().reason, ViolationReason::HaloTooLarge);

        assert!(validate_image_geometry(&input, &output, &cropped(0, 39)).is_ok());
    }

    #[test]
    fn halo_checked_against_derived_size_when_output_is_unbound() {
        let input = ReferenceInput::from_spec(spec("input", &[-1, 64, 64, 1]));
        let output = spec("output", &[-1, -1, -1, 1]);
        let axis = AxisGeometry {
            scale: 0.5,
            halo: 16,
            offset: 0,
        };
        let axes = vec![AxisGeometry::IDENTITY, axis, axis, AxisGeometry::IDENTITY];
        let err = validate_image_geometry(&input, &output, &axes).unwrap_err();
        assert_eq!(err.violation().unwrap().actual, 0);
    }

    #[test]
    fn bad_parameters_are_rejected() {
        let input = ReferenceInput::from_spec(spec("input", &[-1, 64, 64, 1]));
        let output = spec("output", &[-1, 64, 64, 1]);

        let mut axes = cropped(0, 0);
        axes[2].scale = 0.0;
        let err = validate_image_geometry(&input, &output, &axes).unwrap_err();
        let v = err.violation().unwrap();
        assert_eq!(v.reason, ViolationReason::NonPositiveScale);
        assert_eq!(v.parameter, Some(0.0));
        assert!(err.to_string().contains("got 0"));

        axes[2].scale = -2.5;
        let err = validate_image_geometry(&input, &output, &axes).unwrap_err();
        assert_eq!(err.violation().unwrap().parameter, Some(-2.5));
        assert!(err.to_string().contains("got -2.5"));

        let mut axes = cropped(0, 0);
        axes[1].halo = -1;
        let err = validate_image_geometry(&input, &output, &axes).unwrap_err();
        assert_eq!(err.violation().unwrap().reason, ViolationReason::NegativeHalo);

        let err = validate_image_geometry(&input, &output, &axes[..3]).unwrap_err();
        assert_eq!(err.violation().unwrap().reason, ViolationReason::ArityMismatch);
    }

    #[test]
    fn huge_halo_is_rejected_not_overflowed() {
        let input = ReferenceInput::from_spec(spec("input", &[-1, 80, 80, 1]));
        let output = spec("output", &[-1, 80, 80, 1]);
        let err =
            validate_image_geometry(&input, &output, &cropped(0, i64::MAX / 2 + 1)).unwrap_err();
        let v = err.violation().unwrap();
        assert_eq!(v.reason, ViolationReason::HaloTooLarge);
        assert!(v.actual <= 0);

        let err = validate_image_geometry(&input, &output, &cropped(0, i64::MAX)).unwrap_err();
        assert_eq!(err.violation().unwrap().reason, ViolationReason::HaloTooLarge);
    }

    #[test]
    fn extreme_offset_is_out_of_range() {
        let input = ReferenceInput::from_spec(spec("input", &[-1, 80, 80, 1]));
        let output = spec("output", &[-1, 80, 80, 1]);
        for offset in [i64::MIN / 2 - 1, i64::MAX / 2 + 1, i64::MIN] {
            let err = validate_image_geometry(&input, &output, &cropped(offset, 0)).unwrap_err();
            let v = err.violation().unwrap();
            assert_eq!(v.reason, ViolationReason::SizeOutOfRange);
            assert_eq!(v.actual, offset);
            assert_eq!(v.parameter, Some(1.0));
        }
    }

    #[test]
    fn huge_scale_does_not_wrap() {
        let input = ReferenceInput::from_spec(spec("input", &[-1, 80, 80, 1]));
        let output = spec("output", &[-1, 80, 80, 1]);
        let mut axes = cropped(0, 0);
        axes[1].scale = 1e300;
        let err = validate_image_geometry(&input, &output, &axes).unwrap_err();
        let v = err.violation().unwrap();
        assert_eq!(v.reason, ViolationReason::SizeOutOfRange);
        assert_eq!(v.parameter, Some(1e300));
    }

    #[test]
    fn batch_axis_is_forced_to_identity() {
        let input = ReferenceInput::from_spec(spec("input", &[-1, 32, 32, 1]));
        let output = spec("output", &[-1, 32, 32, 1]);
        let mut axes = cropped(0, 0);
        axes[0] = AxisGeometry {
            scale: 3.0,
            halo: 5,
            offset: 2,
        };
        let geometry = validate_image_geometry(&input, &output, &axes).unwrap();
        assert_eq!(geometry.axes[0], AxisGeometry::IDENTITY);
    }

    #[test]
    fn defaults_follow_fixed_sizes() {
        let input = ReferenceInput::from_spec(spec("input", &[-1, 256, -1, 1]));
        let output = spec("output", &[-1, 128, -1, 1]);
        let axes = ImageGeometry::defaults(&input, &output);
        assert_eq!(axes[1].scale, 0.5);
        assert_eq!(axes[2].scale, 1.0);
        assert!(validate_image_geometry(&input, &output, &axes).is_ok());
    }
}
