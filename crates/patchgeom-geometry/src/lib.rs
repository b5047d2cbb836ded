//! Output geometry relative to a reference input: per-axis scale, halo and
//! offset for images, per-level sizes for pyramids, row/column roles for
//! tables. [`ResolutionSession`] walks a signature's outputs one at a time.

pub mod derive;
pub mod image;
pub mod kind;
pub mod list;
pub mod pyramidal;
pub mod reference;
pub mod session;

pub use derive::*;
pub use image::*;
pub use kind::*;
pub use list::*;
pub use pyramidal::*;
pub use reference::*;
pub use session::*;

use patchgeom_core::{AxisLabel, Error, Violation, ViolationReason};

pub(crate) fn violation(
    tensor: &str,
    axis: Option<AxisLabel>,
    reason: ViolationReason,
    expected: Option<i64>,
    actual: i64,
) -> Error {
    Error::GeometryViolation(Violation {
        tensor: tensor.to_string(),
        axis,
        reason,
        expected,
        actual,
        parameter: None,
    })
}
