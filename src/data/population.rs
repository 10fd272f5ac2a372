//! The five measured immune cell populations.

use crate::error::{ProfileError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A measured immune cell population.
///
/// The declaration order is the canonical order used for derived rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Population {
    BCell,
    Cd8TCell,
    Cd4TCell,
    NkCell,
    Monocyte,
}

impl Population {
    /// All populations in canonical order.
    pub const ALL: [Population; 5] = [
        Population::BCell,
        Population::Cd8TCell,
        Population::Cd4TCell,
        Population::NkCell,
        Population::Monocyte,
    ];

    /// Column / population name as it appears in input files and outputs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::BCell => "b_cell",
            Self::Cd8TCell => "cd8_t_cell",
            Self::Cd4TCell => "cd4_t_cell",
            Self::NkCell => "nk_cell",
            Self::Monocyte => "monocyte",
        }
    }

    /// Position in the canonical order.
    #[inline]
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Population {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Population {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self> {
        Population::ALL
            .iter()
            .copied()
            .find(|p| p.name() == s)
            .ok_or_else(|| ProfileError::InvalidParameter(format!("Unknown population '{}'", s)))
    }
}
