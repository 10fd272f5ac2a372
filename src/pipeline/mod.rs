//! Pipeline composition and execution.

mod runner;

pub use runner::{
    analyze, load, AnalysisReport, MeanCountReport, Pipeline, PipelineConfig, PipelineReport,
};
