//! In-memory tabular result loaded from an extract's payload file.
//!
//! Payloads are delimited text with a header row. Every [`Table`] handed to
//! the aggregate manifest carries a `report_name` column holding the source
//! key, including the zero-row stand-in used for failed sources.

use crate::error::HarvestError;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, instrument};

/// Column that labels every row with the source key it came from.
pub const REPORT_NAME_COLUMN: &str = "report_name";

/// A header plus string-valued rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Zero-row table labelled with `report_name`.
    pub fn empty_labeled(report_name: &str) -> Self {
        Table::default().with_report_name(report_name)
    }

    /// Parse delimited text with a header row.
    ///
    /// Ragged rows, invalid UTF-8, and a missing header are load failures.
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, HarvestError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);

        let columns = rdr
            .headers()
            .map_err(|e| HarvestError::Load(format!("bad header row: {e}")))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect::<Vec<_>>();

        if columns.is_empty() || columns.iter().all(String::is_empty) {
            return Err(HarvestError::Load("payload has no header row".into()));
        }

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(|e| HarvestError::Load(e.to_string()))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Table { columns, rows })
    }

    /// Load a payload file from disk.
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub fn from_path(path: &Path) -> Result<Self, HarvestError> {
        let file = std::fs::File::open(path)
            .map_err(|e| HarvestError::Load(format!("{}: {e}", path.display())))?;
        let table = Table::from_reader(file)?;
        debug!(rows = table.len(), columns = table.columns.len(), "Loaded payload table");
        Ok(table)
    }

    /// Set the `report_name` column on every row, adding it if absent.
    pub fn with_report_name(mut self, report_name: &str) -> Self {
        match self.column_index(REPORT_NAME_COLUMN) {
            Some(idx) => {
                for row in &mut self.rows {
                    row[idx] = report_name.to_string();
                }
            }
            None => {
                self.columns.push(REPORT_NAME_COLUMN.to_string());
                for row in &mut self.rows {
                    row.push(report_name.to_string());
                }
            }
        }
        self
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
