//! JSON output of the aggregate manifest.
//!
//! One record per configured source, in configured order:
//!
//! ```json
//! [
//!   {
//!     "source_key": "Demand",
//!     "status": "ok",
//!     "archive_path": "/home/op/downloads/DemandData_20240301_170000.zip",
//!     "extract_dir": "/home/op/downloads/unzipped_files/Demand",
//!     "payload_name": "DemandData",
//!     "posted_at": "2024-03-01T17:00:00",
//!     "rows": 24,
//!     ...
//!   }
//! ]
//! ```

use crate::error::ErrorKind;
use crate::models::{AggregateManifest, RetrievalResult};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    Failed,
}

/// Serialisable view of one [`RetrievalResult`].
#[derive(Debug, Serialize)]
pub struct ManifestRecord<'a> {
    pub source_key: &'a str,
    pub status: Status,
    pub error_kind: Option<ErrorKind>,
    pub error: Option<String>,
    pub archive_path: Option<&'a PathBuf>,
    pub extract_dir: Option<&'a PathBuf>,
    pub payload_name: Option<&'a str>,
    pub download_link: Option<&'a str>,
    pub posted_at: Option<NaiveDateTime>,
    pub candidates_observed: usize,
    /// Posting time of every listing row, in listing order.
    pub candidates_posted_at: Vec<NaiveDateTime>,
    pub rows: usize,
    pub columns: &'a [String],
}

impl<'a> From<&'a RetrievalResult> for ManifestRecord<'a> {
    fn from(r: &'a RetrievalResult) -> Self {
        Self {
            source_key: &r.source_key,
            status: if r.is_success() { Status::Ok } else { Status::Failed },
            error_kind: r.error_kind(),
            error: r.error.as_ref().map(ToString::to_string),
            archive_path: r.archive_path.as_ref(),
            extract_dir: r.extract_dir.as_ref(),
            payload_name: r.payload_name.as_deref(),
            download_link: r.selected.as_ref().map(|c| c.download_link.as_str()),
            posted_at: r.selected.as_ref().map(|c| c.posted_at),
            candidates_observed: r.candidates.len(),
            candidates_posted_at: r.candidates.iter().map(|c| c.posted_at).collect(),
            rows: r.table.len(),
            columns: &r.table.columns,
        }
    }
}

pub fn manifest_to_json(manifest: &AggregateManifest) -> Result<String, serde_json::Error> {
    let records = manifest
        .results
        .iter()
        .map(ManifestRecord::from)
        .collect::<Vec<_>>();
    serde_json::to_string_pretty(&records)
}

/// Write the manifest to `path`, creating parent directories as needed.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_manifest(manifest: &AggregateManifest, path: &Path) -> Result<(), Box<dyn Error>> {
    let json = manifest_to_json(manifest)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(parent).await {
            error!(dir = %parent.display(), error = %e, "Failed to create manifest dir");
            return Err(e.into());
        }
    }

    fs::write(path, json).await?;
    info!(sources = manifest.results.len(), "Wrote manifest JSON");
    Ok(())
}
