//! Data structures for immune cell count analysis.

mod frequency;
mod population;
pub mod record;
mod sample;

pub use frequency::{FrequencyRow, FrequencyTable};
pub use population::Population;
pub use record::{read_records, read_records_from, RawRecord, RawRow, REQUIRED_COLUMNS};
pub use sample::{CellCounts, Project, Response, Sample, Subject, Treatment, WideRow};
