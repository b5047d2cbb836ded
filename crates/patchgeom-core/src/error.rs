//! Error taxonomy shared by every patchgeom crate.
//!
//! Each variant carries the context a caller needs to explain or correct the
//! failure; [`Error::kind`] gives the machine-readable category.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::AxisLabel;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AmbiguousFormat,
    Unresolved,
    MalformedMetadata,
    UnknownSignature,
    UnknownTensor,
    DuplicateRoleAssignment,
    GeometryViolation,
    InvalidDataRange,
    InvalidForm,
    InvalidState,
    IoFailure,
    Cancelled,
}

/// Role of a non-batch axis in a tabular output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ListRole {
    Row,
    Column,
}

impl ListRole {
    pub fn label(self) -> AxisLabel {
        match self {
            ListRole::Row => AxisLabel::Row,
            ListRole::Column => AxisLabel::Column,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationReason {
    /// `round(patch * scale) - 2 * offset` (expected) disagrees with the
    /// declared size (actual).
    SizeMismatch,
    /// `size - 2 * halo` leaves no interior.
    HaloTooLarge,
    NonPositiveScale,
    NegativeHalo,
    /// Scale or offset push the derived size outside the representable range.
    SizeOutOfRange,
    NonPositiveLevel,
    /// Number of per-axis values differs from the number of axes.
    ArityMismatch,
}

/// A broken geometry rule on one axis.
#[derive(Clone, Debug, PartialEq)]
pub struct Violation {
    pub tensor: String,
    pub axis: Option<AxisLabel>,
    pub reason: ViolationReason,
    pub expected: Option<i64>,
    pub actual: i64,
    /// The non-integer parameter that broke the rule, e.g. a scale.
    pub parameter: Option<f64>,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let axis = self
            .axis
            .map(|a| format!("axis `{a}`"))
            .unwrap_or_else(|| "tensor".to_string());
        match self.reason {
            ViolationReason::SizeMismatch => write!(
                f,
                "{}: {axis}: parameters yield an output size of {} but the model declares {}",
                self.tensor,
                self.expected.unwrap_or_default(),
                self.actual
            ),
            ViolationReason::HaloTooLarge => write!(
                f,
                "{}: {axis}: halo too large, output size minus twice the halo is {}",
                self.tensor, self.actual
            ),
            ViolationReason::NonPositiveScale => match self.parameter {
                Some(scale) => write!(
                    f,
                    "{}: {axis}: scale must be a positive number, got {scale}",
                    self.tensor
                ),
                None => write!(f, "{}: {axis}: scale must be a positive number", self.tensor),
            },
            ViolationReason::SizeOutOfRange => write!(
                f,
                "{}: {axis}: scale {} with offset {} puts the output size out of range",
                self.tensor,
                self.parameter.unwrap_or(f64::NAN),
                self.actual
            ),
            ViolationReason::NegativeHalo => write!(
                f,
                "{}: {axis}: halo must not be negative, got {}",
                self.tensor, self.actual
            ),
            ViolationReason::NonPositiveLevel => write!(
                f,
                "{}: {axis}: level size must be positive, got {}",
                self.tensor, self.actual
            ),
            ViolationReason::ArityMismatch => write!(
                f,
                "{}: expected {} per-axis values, got {}",
                self.tensor,
                self.expected.unwrap_or_default(),
                self.actual
            ),
        }
    }
}

#[derive(Clone, Debug, Error)]
pub enum Error {
    #[error("no usable model at {}: {detail}", path.display())]
    NotFound { path: PathBuf, detail: String },

    #[error("{} holds both a graph bundle and a scripted module; choose a framework", path.display())]
    AmbiguousFormat { path: PathBuf },

    #[error("no tag opens the model at {} (tried {})", path.display(), tried.join(", "))]
    Unresolved { path: PathBuf, tried: Vec<String> },

    #[error("metadata under tag `{tag}` is malformed: {detail}")]
    MalformedMetadata { tag: String, detail: String },

    #[error("unknown signature `{name}` (available: {})", available.join(", "))]
    UnknownSignature { name: String, available: Vec<String> },

    #[error("no tensor named `{name}`")]
    UnknownTensor { name: String },

    #[error("{tensor}: role {role:?} assigned to both axis `{first}` and axis `{second}`")]
    DuplicateRoleAssignment {
        tensor: String,
        role: ListRole,
        first: AxisLabel,
        second: AxisLabel,
    },

    #[error("{0}")]
    GeometryViolation(Violation),

    #[error("data range must go from a lower to a higher bound, got [{low}, {high}]")]
    InvalidDataRange { low: String, high: String },

    #[error("invalid axis form `{form}`: {detail}")]
    InvalidForm { form: String, detail: String },

    #[error("{0}")]
    InvalidState(String),

    #[error("i/o failure at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("resolution cancelled")]
    Cancelled,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::AmbiguousFormat { .. } => ErrorKind::AmbiguousFormat,
            Error::Unresolved { .. } => ErrorKind::Unresolved,
            Error::MalformedMetadata { .. } => ErrorKind::MalformedMetadata,
            Error::UnknownSignature { .. } => ErrorKind::UnknownSignature,
            Error::UnknownTensor { .. } => ErrorKind::UnknownTensor,
            Error::DuplicateRoleAssignment { .. } => ErrorKind::DuplicateRoleAssignment,
            Error::GeometryViolation(_) => ErrorKind::GeometryViolation,
            Error::InvalidDataRange { .. } => ErrorKind::InvalidDataRange,
            Error::InvalidForm { .. } => ErrorKind::InvalidForm,
            Error::InvalidState(_) => ErrorKind::InvalidState,
            Error::Io { .. } => ErrorKind::IoFailure,
            Error::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// The violation, when this is a geometry error.
    pub fn violation(&self) -> Option<&Violation> {
        match self {
            Error::GeometryViolation(v) => Some(v),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
