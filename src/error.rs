//! Error types for the immunoprofile library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Missing column '{0}' in input header")]
    MissingColumn(String),

    #[error("Missing required field '{field}' at line {line}")]
    MissingField { line: usize, field: &'static str },

    #[error("Invalid numeric value '{value}' for field '{field}' at line {line}")]
    InvalidNumber {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("Ingestion error at line {line}: {reason}")]
    Ingestion { line: usize, reason: String },

    #[error("Store not ready: {0}")]
    StatePrecondition(String),

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProfileError {
    /// Whether this error was raised while validating raw input records.
    pub fn is_ingestion(&self) -> bool {
        matches!(
            self,
            Self::MissingColumn(_)
                | Self::MissingField { .. }
                | Self::InvalidNumber { .. }
                | Self::Ingestion { .. }
        )
    }
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, ProfileError>;
