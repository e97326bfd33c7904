//! Failure taxonomy for a single source's harvest run.
//!
//! Every stage of the per-source pipeline reports failure through
//! [`HarvestError`]. The orchestrator catches all of them at the source
//! boundary, so none of these ever terminates the whole run.

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while harvesting one report source.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// The page renderer could not be started or is misconfigured.
    #[error("renderer unavailable: {0}")]
    RendererUnavailable(String),

    /// Network, transport, or non-success HTTP status.
    #[error("fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    /// The listing markup is missing its expected structure.
    #[error("listing parse failed: {0}")]
    Parse(String),

    /// The listing contained no candidate extracts.
    #[error("no candidates found in listing")]
    Selection,

    /// The downloaded archive is corrupt, unsupported, or unsafe to unpack.
    #[error("archive extraction failed: {0}")]
    Extract(String),

    /// The extracted payload could not be loaded as a table.
    #[error("payload load failed: {0}")]
    Load(String),

    /// The per-source deadline expired.
    #[error("source timed out after {0:?}")]
    Timeout(Duration),

    /// Anything not covered above (filesystem errors, task panics, ...).
    #[error("unclassified error: {0}")]
    Unclassified(String),
}

/// Coarse classification of a [`HarvestError`], used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RendererUnavailable,
    FetchFailure,
    ParseFailure,
    SelectionFailure,
    ExtractFailure,
    LoadFailure,
    Timeout,
    Unclassified,
}

impl HarvestError {
    /// Build a [`HarvestError::Fetch`] from anything displayable.
    pub fn fetch(url: impl Into<String>, message: impl fmt::Display) -> Self {
        HarvestError::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            HarvestError::RendererUnavailable(_) => ErrorKind::RendererUnavailable,
            HarvestError::Fetch { .. } => ErrorKind::FetchFailure,
            HarvestError::Parse(_) => ErrorKind::ParseFailure,
            HarvestError::Selection => ErrorKind::SelectionFailure,
            HarvestError::Extract(_) => ErrorKind::ExtractFailure,
            HarvestError::Load(_) => ErrorKind::LoadFailure,
            HarvestError::Timeout(_) => ErrorKind::Timeout,
            HarvestError::Unclassified(_) => ErrorKind::Unclassified,
        }
    }

    /// Only transport failures are worth repeating; the rest are structural.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HarvestError::Fetch { .. })
    }
}

impl From<std::io::Error> for HarvestError {
    fn from(e: std::io::Error) -> Self {
        HarvestError::Unclassified(e.to_string())
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::RendererUnavailable => "RendererUnavailable",
            ErrorKind::FetchFailure => "FetchFailure",
            ErrorKind::ParseFailure => "ParseFailure",
            ErrorKind::SelectionFailure => "SelectionFailure",
            ErrorKind::ExtractFailure => "ExtractFailure",
            ErrorKind::LoadFailure => "LoadFailure",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::Unclassified => "Unclassified",
        };
        f.write_str(name)
    }
}
