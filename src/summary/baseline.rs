//! Baseline cohort summary.

use super::cohort::CohortFilter;
use super::group::{count_rows, count_rows_by, count_subjects_by, GroupCounts, GroupKey};
use crate::data::WideRow;
use crate::error::Result;
use crate::store::DerivedStore;
use serde::{Deserialize, Serialize};

/// Sample and subject counts of a baseline cohort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineSummary {
    /// Cohort the counts were computed over.
    pub cohort: CohortFilter,
    /// Number of cohort samples.
    pub total_samples: usize,
    /// Samples per project (row counts).
    pub samples_per_project: GroupCounts,
    /// Subjects per response label (distinct subjects).
    pub subjects_by_response: GroupCounts,
    /// Subjects per sex (distinct subjects).
    pub subjects_by_sex: GroupCounts,
}

impl std::fmt::Display for BaselineSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Baseline cohort ({})", self.cohort.describe())?;
        writeln!(f, "Total baseline samples: {}", self.total_samples)?;
        writeln!(f)?;
        writeln!(f, "Samples per project:")?;
        write!(f, "{}", self.samples_per_project)?;
        writeln!(f)?;
        writeln!(f, "Subjects by response:")?;
        write!(f, "{}", self.subjects_by_response)?;
        writeln!(f)?;
        writeln!(f, "Subjects by sex:")?;
        write!(f, "{}", self.subjects_by_sex)?;
        Ok(())
    }
}

/// Summarize a cohort of wide rows.
pub fn summarize_baseline(rows: &[WideRow], cohort: &CohortFilter) -> BaselineSummary {
    BaselineSummary {
        cohort: cohort.clone(),
        total_samples: count_rows(rows, cohort),
        samples_per_project: count_rows_by(rows, cohort, GroupKey::Project),
        subjects_by_response: count_subjects_by(rows, cohort, GroupKey::Response),
        subjects_by_sex: count_subjects_by(rows, cohort, GroupKey::Sex),
    }
}

/// Summarize the baseline cohort of a fully built store.
pub fn baseline_summary(store: &DerivedStore, cohort: &CohortFilter) -> Result<BaselineSummary> {
    let rows = store.wide_rows()?;
    Ok(summarize_baseline(&rows, cohort))
}
