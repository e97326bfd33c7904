//! Data models shared by the listing parser, pipeline, and orchestrator.
//!
//! - [`ReportSource`]: one configured listing page to harvest
//! - [`ExtractCandidate`] / [`ListingManifest`]: what a listing page offers
//! - [`RetrievalResult`]: the outcome of one source's run
//! - [`AggregateManifest`]: every source's outcome, in configured order

use crate::error::{ErrorKind, HarvestError};
use crate::table::Table;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A configured report listing page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReportSource {
    /// Unique label; also names the source's workspace directory.
    pub key: String,
    /// URL of the listing page enumerating the published extracts.
    pub listing_url: String,
}

impl ReportSource {
    pub fn new(key: impl Into<String>, listing_url: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            listing_url: listing_url.into(),
        }
    }
}

/// One row of a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractCandidate {
    pub download_link: String,
    pub posted_at: NaiveDateTime,
}

/// Everything parsed out of a listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListingManifest {
    /// Human-readable payload name; used to name the downloaded archive.
    pub payload_name: String,
    /// Every candidate row, in document order.
    pub candidates: Vec<ExtractCandidate>,
}

/// Outcome of one source's harvest.
///
/// `table` is always present and always carries a `report_name` column equal
/// to `source_key`, so failed and successful results aggregate uniformly.
#[derive(Debug)]
pub struct RetrievalResult {
    pub source_key: String,
    pub table: Table,
    pub archive_path: Option<PathBuf>,
    pub extract_dir: Option<PathBuf>,
    pub payload_name: Option<String>,
    /// The candidate that was downloaded, when selection succeeded.
    pub selected: Option<ExtractCandidate>,
    /// Every candidate the listing offered, kept for diagnostics.
    pub candidates: Vec<ExtractCandidate>,
    pub error: Option<HarvestError>,
}

impl RetrievalResult {
    /// Empty-but-labelled stand-in for a failed source.
    pub fn failed(source_key: &str, error: HarvestError) -> Self {
        Self {
            source_key: source_key.to_string(),
            table: Table::empty_labeled(source_key),
            archive_path: None,
            extract_dir: None,
            payload_name: None,
            selected: None,
            candidates: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(HarvestError::kind)
    }

    /// Operator-facing `(archive_path, extract_dir, payload_name)` view.
    pub fn report_line(&self) -> ReportLine {
        ReportLine {
            archive_path: self.archive_path.clone(),
            extract_dir: self.extract_dir.clone(),
            payload_name: self.payload_name.clone(),
        }
    }
}

/// Where a source's extract landed on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportLine {
    pub archive_path: Option<PathBuf>,
    pub extract_dir: Option<PathBuf>,
    pub payload_name: Option<String>,
}

/// Every configured source's result, in configured order.
#[derive(Debug, Default)]
pub struct AggregateManifest {
    pub results: Vec<RetrievalResult>,
}

impl AggregateManifest {
    pub fn get(&self, source_key: &str) -> Option<&RetrievalResult> {
        self.results.iter().find(|r| r.source_key == source_key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.results.iter().map(|r| r.source_key.as_str())
    }

    /// `source_key -> table`, the shape downstream loaders consume.
    pub fn tables(&self) -> impl Iterator<Item = (&str, &Table)> {
        self.results.iter().map(|r| (r.source_key.as_str(), &r.table))
    }

    pub fn report(&self) -> impl Iterator<Item = (&str, ReportLine)> {
        self.results
            .iter()
            .map(|r| (r.source_key.as_str(), r.report_line()))
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }
}
