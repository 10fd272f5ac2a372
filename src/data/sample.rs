//! Normalized entities and the denormalized per-sample wide row.

use super::population::Population;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Treatment response label recorded on a sample.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    /// Responder ("yes").
    Yes,
    /// Non-responder ("no").
    No,
    /// Any other non-empty label, kept verbatim.
    Other(String),
    /// No label recorded.
    Unset,
}

impl Response {
    /// Parse a raw label. Matching is exact; empty text is `Unset`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "" => Self::Unset,
            "yes" => Self::Yes,
            "no" => Self::No,
            other => Self::Other(other.to_string()),
        }
    }

    /// Label as stored, `None` when unset.
    pub fn as_label(&self) -> Option<&str> {
        match self {
            Self::Yes => Some("yes"),
            Self::No => Some("no"),
            Self::Other(s) => Some(s),
            Self::Unset => None,
        }
    }

    /// Build from a nullable stored label.
    pub fn from_label(label: Option<&str>) -> Self {
        label.map(Self::parse).unwrap_or(Self::Unset)
    }

    /// True for "yes" and "no", the two labels compared by the response test.
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Yes | Self::No)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label().unwrap_or("NA"))
    }
}

/// Raw counts for the five populations of one sample.
///
/// `None` is a missing measurement and is never treated as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CellCounts {
    counts: [Option<f64>; 5],
}

impl CellCounts {
    /// Create from counts in canonical population order.
    pub fn new(counts: [Option<f64>; 5]) -> Self {
        Self { counts }
    }

    /// Create from fully measured counts.
    pub fn complete(counts: [f64; 5]) -> Self {
        Self {
            counts: counts.map(Some),
        }
    }

    /// Count for one population.
    #[inline]
    pub fn get(&self, population: Population) -> Option<f64> {
        self.counts[population.index()]
    }

    /// Sum of all five counts, undefined if any one is missing.
    pub fn total(&self) -> Option<f64> {
        self.counts.iter().try_fold(0.0, |acc, c| c.map(|v| acc + v))
    }

    /// Whether every population was measured.
    pub fn is_complete(&self) -> bool {
        self.counts.iter().all(Option::is_some)
    }
}

/// A project, identified by its unique name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
}

/// A subject within a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: i64,
    pub project_id: i64,
    pub subject_code: String,
    pub condition: Option<String>,
    pub age: Option<i64>,
    pub sex: Option<String>,
}

/// A treatment, identified by its unique name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treatment {
    pub id: i64,
    pub name: String,
}

/// A single measured sample and its counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: i64,
    pub subject_id: i64,
    pub treatment_id: Option<i64>,
    pub response: Response,
    pub sample_code: String,
    pub sample_type: Option<String>,
    pub time_from_treatment_start: Option<f64>,
    pub counts: CellCounts,
}

/// Denormalized view of one sample with every joined attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WideRow {
    /// Surrogate sample identifier.
    pub sample_id: i64,
    /// Surrogate subject identifier (unique per project + subject code).
    pub subject_id: i64,
    pub project: String,
    pub subject: String,
    pub condition: Option<String>,
    pub age: Option<i64>,
    pub sex: Option<String>,
    pub treatment: Option<String>,
    pub response: Response,
    pub sample: String,
    pub sample_type: Option<String>,
    pub time_from_treatment_start: Option<f64>,
    pub counts: CellCounts,
}

impl WideRow {
    /// Sample taken at treatment start.
    pub fn is_baseline(&self) -> bool {
        self.time_from_treatment_start == Some(0.0)
    }
}
