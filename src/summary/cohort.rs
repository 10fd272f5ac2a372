//! Cohort filters selecting wide rows by sample attributes.

use crate::data::{Response, WideRow};
use serde::{Deserialize, Serialize};

/// Disease condition of the reference cohort.
pub const DEFAULT_CONDITION: &str = "melanoma";
/// Treatment of the reference cohort.
pub const DEFAULT_TREATMENT: &str = "miraclib";
/// Specimen type of the reference cohort.
pub const DEFAULT_SAMPLE_TYPE: &str = "PBMC";

/// Conjunction of equality constraints on wide-row attributes.
///
/// Unset fields do not constrain. Rows with a missing attribute never match
/// a constraint on that attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CohortFilter {
    pub condition: Option<String>,
    pub treatment: Option<String>,
    pub sample_type: Option<String>,
    /// Only samples with `time_from_treatment_start == 0`.
    pub baseline_only: bool,
    pub sex: Option<String>,
    pub response: Option<Response>,
}

impl CohortFilter {
    /// Filter that matches every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Treatment + specimen cohort used for the responder comparison.
    pub fn response_default() -> Self {
        Self::all()
            .treatment(DEFAULT_TREATMENT)
            .sample_type(DEFAULT_SAMPLE_TYPE)
    }

    /// Baseline cohort: condition, treatment, specimen, time zero.
    pub fn baseline_default() -> Self {
        Self::response_default()
            .condition(DEFAULT_CONDITION)
            .baseline()
    }

    pub fn condition(mut self, condition: &str) -> Self {
        self.condition = Some(condition.to_string());
        self
    }

    pub fn treatment(mut self, treatment: &str) -> Self {
        self.treatment = Some(treatment.to_string());
        self
    }

    pub fn sample_type(mut self, sample_type: &str) -> Self {
        self.sample_type = Some(sample_type.to_string());
        self
    }

    pub fn baseline(mut self) -> Self {
        self.baseline_only = true;
        self
    }

    pub fn sex(mut self, sex: &str) -> Self {
        self.sex = Some(sex.to_string());
        self
    }

    pub fn response(mut self, response: Response) -> Self {
        self.response = Some(response);
        self
    }

    /// Check whether a row belongs to the cohort.
    pub fn matches(&self, row: &WideRow) -> bool {
        fn field_matches(want: &Option<String>, have: &Option<String>) -> bool {
            match want {
                Some(w) => have.as_deref() == Some(w.as_str()),
                None => true,
            }
        }

        field_matches(&self.condition, &row.condition)
            && field_matches(&self.treatment, &row.treatment)
            && field_matches(&self.sample_type, &row.sample_type)
            && field_matches(&self.sex, &row.sex)
            && (!self.baseline_only || row.is_baseline())
            && self.response.as_ref().map_or(true, |r| *r == row.response)
    }

    /// Rows of `rows` belonging to the cohort.
    pub fn select<'a>(&'a self, rows: &'a [WideRow]) -> impl Iterator<Item = &'a WideRow> + 'a {
        rows.iter().filter(move |r| self.matches(r))
    }

    /// Short human-readable description.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(c) = &self.condition {
            parts.push(format!("condition={}", c));
        }
        if let Some(t) = &self.treatment {
            parts.push(format!("treatment={}", t));
        }
        if let Some(s) = &self.sample_type {
            parts.push(format!("sample_type={}", s));
        }
        if self.baseline_only {
            parts.push("time_from_treatment_start=0".to_string());
        }
        if let Some(s) = &self.sex {
            parts.push(format!("sex={}", s));
        }
        if let Some(r) = &self.response {
            parts.push(format!("response={}", r));
        }
        if parts.is_empty() {
            "all samples".to_string()
        } else {
            parts.join(", ")
        }
    }
}
