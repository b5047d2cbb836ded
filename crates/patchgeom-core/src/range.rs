use std::fmt;

use serde::{Serialize, Serializer};

use crate::{Error, Result};

/// Representable bounds, in order. Ranges are chosen by index into this set.
pub const RANGE_BOUNDS: [f64; 5] = [f64::NEG_INFINITY, -1.0, 0.0, 1.0, f64::INFINITY];

const RANGE_LABELS: [&str; 5] = ["-inf", "-1", "0", "1", "inf"];

/// Position of a textual bound (`-inf`, `-1`, `0`, `1`, `inf`) in
/// [`RANGE_BOUNDS`].
pub fn bound_index(label: &str) -> Option<usize> {
    let label = label.trim();
    let label = label.strip_prefix('+').unwrap_or(label);
    RANGE_LABELS.iter().position(|l| *l == label)
}

/// Bounds on an output's values.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DataRange {
    low: usize,
    high: usize,
}

impl DataRange {
    pub fn from_indices(low: usize, high: usize) -> Result<Self> {
        let label = |i: usize| {
            RANGE_LABELS
                .get(i)
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("#{i}"))
        };
        if low >= high || high >= RANGE_BOUNDS.len() {
            return Err(Error::InvalidDataRange {
                low: label(low),
                high: label(high),
            });
        }
        Ok(Self { low, high })
    }

    pub fn new(low: f64, high: f64) -> Result<Self> {
        let index = |v: f64| RANGE_BOUNDS.iter().position(|b| *b == v);
        match (index(low), index(high)) {
            (Some(l), Some(h)) => Self::from_indices(l, h),
            _ => Err(Error::InvalidDataRange {
                low: low.to_string(),
                high: high.to_string(),
            }),
        }
    }

    /// Parses the textual bounds `-inf`, `-1`, `0`, `1`, `inf`.
    pub fn parse(low: &str, high: &str) -> Result<Self> {
        match (bound_index(low), bound_index(high)) {
            (Some(l), Some(h)) => Self::from_indices(l, h),
            _ => Err(Error::InvalidDataRange {
                low: low.to_string(),
                high: high.to_string(),
            }),
        }
    }

    pub fn low(&self) -> f64 {
        RANGE_BOUNDS[self.low]
    }

    pub fn high(&self) -> f64 {
        RANGE_BOUNDS[self.high]
    }
}

impl Default for DataRange {
    fn default() -> Self {
        Self { low: 0, high: 4 }
    }
}

impl fmt::Display for DataRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", RANGE_LABELS[self.low], RANGE_LABELS[self.high])
    }
}

impl Serialize for DataRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        [RANGE_LABELS[self.low], RANGE_LABELS[self.high]].serialize(serializer)
    }
}
