//! Cohort selection and grouped counts.

pub mod baseline;
pub mod cohort;
pub mod group;

pub use baseline::{baseline_summary, summarize_baseline, BaselineSummary};
pub use cohort::{CohortFilter, DEFAULT_CONDITION, DEFAULT_SAMPLE_TYPE, DEFAULT_TREATMENT};
pub use group::{
    count_by, count_rows, count_rows_by, count_subjects_by, mean_count, CountMode, GroupCount,
    GroupCounts, GroupKey,
};
