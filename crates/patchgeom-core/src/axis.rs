use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::{Error, Result};

/// Semantic role of one tensor dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AxisLabel {
    Batch,
    Channel,
    Depth,
    Height,
    Width,
    Row,
    Column,
    Custom(char),
}

impl AxisLabel {
    pub fn as_char(self) -> char {
        match self {
            AxisLabel::Batch => 'B',
            AxisLabel::Channel | AxisLabel::Column => 'C',
            AxisLabel::Depth => 'Z',
            AxisLabel::Height => 'Y',
            AxisLabel::Width => 'X',
            AxisLabel::Row => 'R',
            AxisLabel::Custom(c) => c,
        }
    }

    /// Parses a single label. `tabular` switches `C` from channel to column.
    pub fn from_char(c: char, tabular: bool) -> Option<Self> {
        let label = match c.to_ascii_uppercase() {
            'B' | 'N' => AxisLabel::Batch,
            'C' if tabular => AxisLabel::Column,
            'C' => AxisLabel::Channel,
            'Z' => AxisLabel::Depth,
            'Y' => AxisLabel::Height,
            'X' => AxisLabel::Width,
            'R' => AxisLabel::Row,
            other if other.is_ascii_alphabetic() => AxisLabel::Custom(other),
            _ => return None,
        };
        Some(label)
    }

    pub fn is_batch(self) -> bool {
        matches!(self, AxisLabel::Batch)
    }
}

impl fmt::Display for AxisLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Ordered, duplicate-free list of axis labels, e.g. `BYXC`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AxisForm(Vec<AxisLabel>);

impl AxisForm {
    pub fn new(labels: Vec<AxisLabel>) -> Result<Self> {
        for (i, label) in labels.iter().enumerate() {
            if labels[..i].contains(label) {
                return Err(Error::InvalidForm {
                    form: labels.iter().map(|l| l.as_char()).collect(),
                    detail: format!("label `{label}` appears more than once"),
                });
            }
        }
        Ok(Self(labels))
    }

    /// Default form for a tensor of the given rank, channels-last.
    pub fn default_for_rank(rank: usize) -> Option<Self> {
        let form = match rank {
            1 => "X",
            2 => "YX",
            3 => "YXC",
            4 => "BYXC",
            5 => "BZYXC",
            _ => return None,
        };
        form.parse().ok()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn labels(&self) -> &[AxisLabel] {
        &self.0
    }

    pub fn index_of(&self, label: AxisLabel) -> Option<usize> {
        self.0.iter().position(|l| *l == label)
    }

    pub fn contains(&self, label: AxisLabel) -> bool {
        self.index_of(label).is_some()
    }

    pub fn batch_index(&self) -> Option<usize> {
        self.index_of(AxisLabel::Batch)
    }

    pub fn is_tabular(&self) -> bool {
        self.0
            .iter()
            .any(|l| matches!(l, AxisLabel::Row | AxisLabel::Column))
    }

    /// Labels other than batch, in order.
    pub fn working_labels(&self) -> impl Iterator<Item = AxisLabel> + '_ {
        self.0.iter().copied().filter(|l| !l.is_batch())
    }
}

impl FromStr for AxisForm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let tabular = s.chars().any(|c| c.eq_ignore_ascii_case(&'R'));
        let labels = s
            .chars()
            .map(|c| {
                AxisLabel::from_char(c, tabular).ok_or_else(|| Error::InvalidForm {
                    form: s.to_string(),
                    detail: format!("`{c}` is not an axis label"),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(labels)
    }
}

impl fmt::Display for AxisForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Tables spell their batch axis `N`.
        let tabular = self.is_tabular();
        for label in &self.0 {
            match label {
                AxisLabel::Batch if tabular => f.write_str("N")?,
                _ => write!(f, "{label}")?,
            }
        }
        Ok(())
    }
}

impl Serialize for AxisForm {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
