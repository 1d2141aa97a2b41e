//! Error types for Ledger Core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    /// A mandatory column is missing or the ledger cannot be processed in the
    /// requested shape.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A cell in a mandatory column could not be coerced. Rows are 1-based and
    /// exclude the header.
    #[error("Parse error at row {row}, column '{column}': cannot parse '{value}'")]
    Parse {
        row: usize,
        column: String,
        value: String,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    /// Short machine-readable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Schema(_) => "SCHEMA_ERROR",
            LedgerError::Parse { .. } => "PARSE_ERROR",
            LedgerError::Csv(_) => "INVALID_CSV",
            LedgerError::Io(_) => "IO_ERROR",
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
