//! CSV ingestion
//!
//! Reads an uploaded ledger fully into memory as untyped string cells. Column
//! resolution and coercion happen later in [`crate::schema`].

use std::path::Path;

use csv::ReaderBuilder;

use crate::error::{LedgerError, LedgerResult};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A header row plus string records, exactly as uploaded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub records: Vec<Vec<String>>,
}

impl RawTable {
    /// Parse CSV bytes. A leading byte-order mark is tolerated and short
    /// records are padded with empty cells.
    pub fn from_csv_bytes(bytes: &[u8]) -> LedgerResult<Self> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.to_string())
            .collect();

        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(LedgerError::Schema(
                "Ledger has no header row".to_string(),
            ));
        }

        let mut records = Vec::new();
        for result in reader.records() {
            let record = result?;
            let mut cells: Vec<String> = record.iter().map(|c| c.to_string()).collect();
            cells.resize(headers.len(), String::new());
            records.push(cells);
        }

        tracing::debug!(
            columns = headers.len(),
            records = records.len(),
            "CSV ledger read"
        );

        Ok(Self { headers, records })
    }

    /// Read a ledger file into memory once and parse it
    pub fn from_path<P: AsRef<Path>>(path: P) -> LedgerResult<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), bytes = bytes.len(), "Ledger file loaded");
        Self::from_csv_bytes(&bytes)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
