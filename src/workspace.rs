//! On-disk layout for downloaded archives and per-source workspaces.
//!
//! ```text
//! base_dir/
//! └── downloads/
//!     ├── DemandData_20240301_170000.zip
//!     └── unzipped_files/
//!         ├── Demand/
//!         └── Solar/
//! ```
//!
//! Each source owns `downloads/unzipped_files/<key>/` exclusively, and it is
//! wiped and recreated before every extraction. Workspaces are left in place
//! after a run for inspection.

use chrono::NaiveDateTime;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, instrument};

const DOWNLOADS_DIR: &str = "downloads";
const UNZIPPED_DIR: &str = "unzipped_files";
const ARCHIVE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Paths derived from the configured base directory.
#[derive(Debug, Clone)]
pub struct Layout {
    base_dir: PathBuf,
}

impl Layout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Shared directory holding every downloaded archive.
    pub fn downloads_dir(&self) -> PathBuf {
        self.base_dir.join(DOWNLOADS_DIR)
    }

    /// Extraction directory owned by `source_key`.
    pub fn workspace_dir(&self, source_key: &str) -> PathBuf {
        self.downloads_dir().join(UNZIPPED_DIR).join(source_key)
    }

    pub fn archive_path(&self, payload_name: &str, posted_at: &NaiveDateTime) -> PathBuf {
        self.downloads_dir()
            .join(archive_file_name(payload_name, posted_at))
    }

    /// Delete and recreate the source's workspace so no earlier payload survives.
    #[instrument(level = "debug", skip(self))]
    pub async fn reset_workspace(&self, source_key: &str) -> std::io::Result<PathBuf> {
        let dir = self.workspace_dir(source_key);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => debug!(dir = %dir.display(), "Cleared previous workspace"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    pub async fn ensure_downloads_dir(&self) -> std::io::Result<PathBuf> {
        let dir = self.downloads_dir();
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }
}

/// Deterministic archive name: `<payload>_<YYYYMMDD_HHMMSS>.zip`.
///
/// The same extract always maps to the same file, so re-runs overwrite rather
/// than accumulate copies. Path separators in the payload name are replaced.
pub fn archive_file_name(payload_name: &str, posted_at: &NaiveDateTime) -> String {
    let stem = payload_name
        .trim()
        .replace(|c: char| c == '/' || c == '\\' || c.is_control(), "_");
    format!("{}_{}.zip", stem, posted_at.format(ARCHIVE_TIMESTAMP_FORMAT))
}
