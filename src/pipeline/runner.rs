//! Pipeline runner: load, derive, summarize and compare in one call.

use crate::compare::{
    compare_response, response_groups, CompareConfig, ComparisonResult, ResponseGroups,
};
use crate::data::{FrequencyTable, Population, Response};
use crate::error::Result;
use crate::ingest::{ingest_csv, IngestSummary};
use crate::normalize::derive_frequencies;
use crate::store::{DerivedStore, SchemaStore};
use crate::summary::{
    baseline_summary, mean_count, BaselineSummary, CohortFilter, DEFAULT_CONDITION,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Pipeline configuration for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Name of the pipeline.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Input CSV of per-sample cell counts.
    pub input: PathBuf,
    /// SQLite database, rebuilt on every run.
    pub database: PathBuf,
    /// Directory for TSV/JSON outputs; nothing is written when unset.
    pub output_dir: Option<PathBuf>,
    /// Rows shown in the frequency preview.
    pub preview_limit: usize,
    /// Cohort for the responder comparison.
    pub response_cohort: CohortFilter,
    /// Cohort for the baseline summary.
    pub baseline_cohort: CohortFilter,
    /// Cohort for the mean B-cell count report.
    pub mean_count_cohort: CohortFilter,
    pub compare: CompareConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: "immunoprofile".to_string(),
            description: None,
            input: PathBuf::from("cell-count.csv"),
            database: PathBuf::from("cell_counts.db"),
            output_dir: Some(PathBuf::from("outputs")),
            preview_limit: 20,
            response_cohort: CohortFilter::response_default(),
            baseline_cohort: CohortFilter::baseline_default(),
            mean_count_cohort: default_mean_count_cohort(),
            compare: CompareConfig::default(),
        }
    }
}

/// Melanoma male responders at baseline.
fn default_mean_count_cohort() -> CohortFilter {
    CohortFilter::all()
        .condition(DEFAULT_CONDITION)
        .sex("M")
        .response(Response::Yes)
        .baseline()
}

impl PipelineConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Load from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }
}

/// Mean raw count of one population over a cohort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanCountReport {
    pub cohort: CohortFilter,
    pub population: Population,
    /// `None` when no cohort sample has the population measured.
    pub mean: Option<f64>,
}

impl std::fmt::Display for MeanCountReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.mean {
            Some(mean) => writeln!(
                f,
                "Average {} count ({}): {:.2}",
                self.population,
                self.cohort.describe(),
                mean
            ),
            None => writeln!(
                f,
                "No samples with a {} count found ({})",
                self.population,
                self.cohort.describe()
            ),
        }
    }
}

/// Everything computed from a derived store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub baseline: BaselineSummary,
    pub groups: ResponseGroups,
    pub comparison: ComparisonResult,
    pub mean_b_cell: MeanCountReport,
}

impl AnalysisReport {
    /// Write `comparison.tsv`, `response_groups.tsv` and `summary.json` into `dir`.
    pub fn write_outputs<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        self.comparison.to_tsv(dir.join("comparison.tsv"))?;
        self.groups.to_tsv(dir.join("response_groups.tsv"))?;

        let summary = SummaryJson {
            baseline: &self.baseline,
            comparison: &self.comparison,
            mean_b_cell: &self.mean_b_cell,
        };
        fs::write(dir.join("summary.json"), serde_json::to_string_pretty(&summary)?)?;

        info!(dir = %dir.display(), "wrote analysis outputs");
        Ok(())
    }
}

#[derive(Serialize)]
struct SummaryJson<'a> {
    baseline: &'a BaselineSummary,
    comparison: &'a ComparisonResult,
    mean_b_cell: &'a MeanCountReport,
}

impl std::fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.baseline)?;
        writeln!(f)?;
        write!(f, "{}", self.comparison)?;
        writeln!(f)?;
        write!(f, "{}", self.mean_b_cell)
    }
}

/// Result of a full pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub ingest: IngestSummary,
    pub frequencies: FrequencyTable,
    pub analysis: AnalysisReport,
}

/// Rebuild the store from a CSV file: ingest then derive frequencies.
///
/// Each stage runs in its own transaction. A failed ingestion leaves the
/// previous content of `database` in place.
pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    database: Q,
) -> Result<(IngestSummary, DerivedStore)> {
    let store = SchemaStore::open(database)?;
    let ingested = ingest_csv(store, input)?;
    let summary = ingested.summary().clone();
    let derived = derive_frequencies(ingested)?;
    Ok((summary, derived))
}

/// Compute the baseline summary, responder comparison and mean B-cell count.
pub fn analyze(store: &DerivedStore, config: &PipelineConfig) -> Result<AnalysisReport> {
    let baseline = baseline_summary(store, &config.baseline_cohort)?;
    let groups = response_groups(store, &config.response_cohort)?;
    let comparison = compare_response(&groups, &config.compare)?;

    let rows = store.wide_rows()?;
    let mean_b_cell = MeanCountReport {
        cohort: config.mean_count_cohort.clone(),
        population: Population::BCell,
        mean: mean_count(&rows, &config.mean_count_cohort, Population::BCell),
    };

    Ok(AnalysisReport {
        baseline,
        groups,
        comparison,
        mean_b_cell,
    })
}

/// Builder for configuring and running the pipeline.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from a config.
    pub fn from_config(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn input<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.input = path.into();
        self
    }

    pub fn database<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.database = path.into();
        self
    }

    pub fn output_dir<P: Into<PathBuf>>(mut self, dir: Option<P>) -> Self {
        self.config.output_dir = dir.map(Into::into);
        self
    }

    pub fn alpha(mut self, alpha: f64) -> Self {
        self.config.compare.alpha = alpha;
        self
    }

    pub fn min_group_size(mut self, n: usize) -> Self {
        self.config.compare.min_group_size = n;
        self
    }

    pub fn response_cohort(mut self, cohort: CohortFilter) -> Self {
        self.config.response_cohort = cohort;
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage and write outputs when an output directory is set.
    pub fn run(&self) -> Result<PipelineReport> {
        let config = &self.config;
        // fail before touching the database
        config.compare.validate()?;

        info!(pipeline = %config.name, input = %config.input.display(), "running pipeline");
        let (ingest, store) = load(&config.input, &config.database)?;
        let frequencies = store.frequencies()?;
        let analysis = analyze(&store, config)?;

        if let Some(dir) = &config.output_dir {
            fs::create_dir_all(dir)?;
            frequencies.to_tsv(dir.join("frequencies.tsv"))?;
            analysis.write_outputs(dir)?;
        }

        Ok(PipelineReport {
            ingest,
            frequencies,
            analysis,
        })
    }
}
