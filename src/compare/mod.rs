//! Responder vs non-responder comparison of relative frequencies.

pub mod groups;
pub mod response;

pub use groups::{response_groups, ResponseGroup, ResponseGroups};
pub use response::{compare_response, CompareConfig, ComparisonResult, PopulationComparison};
