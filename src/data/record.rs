//! Raw input records and their validation at the ingestion boundary.

use super::population::Population;
use super::sample::{CellCounts, Response};
use crate::error::{ProfileError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Column names every input file must provide.
pub const REQUIRED_COLUMNS: [&str; 15] = [
    "project",
    "subject",
    "condition",
    "age",
    "sex",
    "treatment",
    "response",
    "sample",
    "sample_type",
    "time_from_treatment_start",
    "b_cell",
    "cd8_t_cell",
    "cd4_t_cell",
    "nk_cell",
    "monocyte",
];

/// One input row exactly as read, every field as text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    pub project: String,
    pub subject: String,
    pub condition: String,
    pub age: String,
    pub sex: String,
    pub treatment: String,
    pub response: String,
    pub sample: String,
    pub sample_type: String,
    pub time_from_treatment_start: String,
    pub b_cell: String,
    pub cd8_t_cell: String,
    pub cd4_t_cell: String,
    pub nk_cell: String,
    pub monocyte: String,
}

impl RawRow {
    fn count_field(&self, population: Population) -> &str {
        match population {
            Population::BCell => &self.b_cell,
            Population::Cd8TCell => &self.cd8_t_cell,
            Population::Cd4TCell => &self.cd4_t_cell,
            Population::NkCell => &self.nk_cell,
            Population::Monocyte => &self.monocyte,
        }
    }
}

/// A validated, strongly typed input record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Source line (1-based, header is line 1).
    pub line: usize,
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

impl RawRecord {
    /// Validate a raw row.
    ///
    /// Key fields (project, subject, sample) must be non-empty. Empty numeric
    /// fields become `None`; unparsable ones are rejected.
    pub fn from_row(line: usize, row: &RawRow) -> Result<Self> {
        let project = required(line, "project", &row.project)?;
        let subject = required(line, "subject", &row.subject)?;
        let sample = required(line, "sample", &row.sample)?;

        let age = match optional(&row.age) {
            Some(v) => Some(v.parse::<i64>().map_err(|_| ProfileError::InvalidNumber {
                line,
                field: "age",
                value: v.to_string(),
            })?),
            None => None,
        };

        let time_from_treatment_start =
            parse_real(line, "time_from_treatment_start", &row.time_from_treatment_start)?;

        let mut counts = [None; 5];
        for population in Population::ALL {
            let value = parse_real(line, population.name(), row.count_field(population))?;
            if let Some(v) = value {
                if v < 0.0 {
                    return Err(ProfileError::Ingestion {
                        line,
                        reason: format!("negative count {} for '{}'", v, population.name()),
                    });
                }
            }
            counts[population.index()] = value;
        }

        Ok(Self {
            line,
            project,
            subject,
            condition: optional(&row.condition).map(String::from),
            age,
            sex: optional(&row.sex).map(String::from),
            treatment: optional(&row.treatment).map(String::from),
            response: Response::parse(&row.response),
            sample,
            sample_type: optional(&row.sample_type).map(String::from),
            time_from_treatment_start,
            counts: CellCounts::new(counts),
        })
    }
}

impl RawRecord {
    /// Re-check the invariants `from_row` establishes.
    ///
    /// Records may also be built directly, so ingestion runs this on each
    /// record before writing it.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("project", &self.project),
            ("subject", &self.subject),
            ("sample", &self.sample),
        ] {
            if value.trim().is_empty() {
                return Err(ProfileError::MissingField {
                    line: self.line,
                    field,
                });
            }
        }
        for population in Population::ALL {
            if let Some(v) = self.counts.get(population) {
                if !v.is_finite() || v < 0.0 {
                    return Err(ProfileError::Ingestion {
                        line: self.line,
                        reason: format!("invalid count {} for '{}'", v, population.name()),
                    });
                }
            }
        }
        Ok(())
    }
}

fn optional(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn required(line: usize, field: &'static str, raw: &str) -> Result<String> {
    optional(raw)
        .map(String::from)
        .ok_or(ProfileError::MissingField { line, field })
}

fn parse_real(line: usize, field: &'static str, raw: &str) -> Result<Option<f64>> {
    let Some(v) = optional(raw) else {
        return Ok(None);
    };
    match v.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => Ok(Some(parsed)),
        _ => Err(ProfileError::InvalidNumber {
            line,
            field,
            value: v.to_string(),
        }),
    }
}

/// Read and validate every record of a CSV file.
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<Vec<RawRecord>> {
    let file = File::open(path)?;
    read_records_from(file)
}

/// Read and validate every record from any CSV source.
///
/// The header must contain all of [`REQUIRED_COLUMNS`]; extra columns are
/// ignored. The first invalid record aborts the read. A header-only input
/// yields no records.
pub fn read_records_from<R: Read>(source: R) -> Result<Vec<RawRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(source);

    let headers = reader.headers()?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(ProfileError::MissingColumn(column.to_string()));
        }
    }

    let mut records = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let string_record = result.map_err(|e| malformed_record(e, idx + 2))?;
        let line = string_record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 2);
        let row: RawRow = string_record
            .deserialize(Some(&headers))
            .map_err(|e| malformed_record(e, line))?;
        records.push(RawRecord::from_row(line, &row)?);
    }

    Ok(records)
}

/// Short rows, bad UTF-8 and other record-level CSV faults are ingestion
/// errors; I/O failures stay CSV errors.
fn malformed_record(err: csv::Error, fallback_line: usize) -> ProfileError {
    if err.is_io_error() {
        return ProfileError::Csv(err);
    }
    let line = err
        .position()
        .map_or(fallback_line, |p| p.line() as usize);
    ProfileError::Ingestion {
        line,
        reason: format!("malformed record: {}", err),
    }
}
