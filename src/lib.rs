//! Immune Cell Population Profiling Library
//!
//! This library loads per-sample immune cell counts into a relational store,
//! derives relative population frequencies and compares treatment responders
//! with non-responders.
//!
//! # Overview
//!
//! The library is organized into composable modules:
//!
//! - **data**: Core data structures (RawRecord, WideRow, FrequencyTable)
//! - **store**: SQLite schema store with typed phase handles
//! - **ingest**: Normalization of raw records into the store
//! - **normalize**: Relative frequency derivation
//! - **summary**: Cohort filters, grouped counts and the baseline summary
//! - **test**: Hypothesis testing (Mann-Whitney U)
//! - **compare**: Responder vs non-responder comparison
//! - **pipeline**: Pipeline composition and execution
//!
//! # Example
//!
//! ```no_run
//! use immunoprofile::prelude::*;
//!
//! let store = SchemaStore::open("cell_counts.db").unwrap();
//! let ingested = ingest_csv(store, "cell-count.csv").unwrap();
//! let derived = derive_frequencies(ingested).unwrap();
//!
//! let groups = response_groups(&derived, &CohortFilter::response_default()).unwrap();
//! let result = compare_response(&groups, &CompareConfig::default()).unwrap();
//! println!("{}", result);
//! ```

pub mod compare;
pub mod data;
pub mod error;
pub mod ingest;
pub mod normalize;
pub mod pipeline;
pub mod store;
pub mod summary;
pub mod test;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::compare::{
        compare_response, response_groups, CompareConfig, ComparisonResult,
        PopulationComparison, ResponseGroup, ResponseGroups,
    };
    pub use crate::data::{
        read_records, CellCounts, FrequencyRow, FrequencyTable, Population, RawRecord, Response,
        WideRow,
    };
    pub use crate::error::{ProfileError, Result};
    pub use crate::ingest::{ingest_csv, ingest_records, IngestSummary};
    pub use crate::normalize::{derive_frequencies, relative_frequencies};
    pub use crate::pipeline::{analyze, load, AnalysisReport, Pipeline, PipelineConfig};
    pub use crate::store::{DerivedStore, IngestedStore, SchemaStore};
    pub use crate::summary::{
        baseline_summary, count_by, count_rows_by, count_subjects_by, mean_count,
        BaselineSummary, CohortFilter, CountMode, GroupCounts, GroupKey,
    };
    pub use crate::test::{test_mann_whitney, MannWhitneyMethod, MannWhitneyResult};
}
