//! Static run configuration.
//!
//! Configuration is read once at startup from an optional YAML file and then
//! overridden by CLI flags. It is passed into the orchestrator as a value;
//! nothing reads it from ambient state.
//!
//! ```yaml
//! base_dir: ~/
//! renderer: chromium
//! chromium_path: /opt/chrome/chrome
//! concurrency: 2
//! source_timeout_secs: 300
//! fetch_retries: 3
//! retry_base_delay_ms: 500
//! sources:
//!   - key: Demand
//!     listing_url: https://www.ercot.com/mp/data-products/data-product-details?id=NP3-560-CD
//! ```
//!
//! Without a file, the built-in ERCOT MIS report set is used.

use crate::cli::Cli;
use crate::models::ReportSource;
use crate::renderer::RendererKind;
use crate::utils::expand_home;
use itertools::Itertools;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Everything a harvest run needs, fixed for the lifetime of the run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarvestConfig {
    /// Root under which `downloads/` is created. `~` expands to the home directory.
    pub base_dir: PathBuf,
    pub renderer: RendererKind,
    /// Browser executable for the chromium renderer.
    pub chromium_path: Option<PathBuf>,
    /// Number of sources processed at once; `1` keeps strict configured order.
    pub concurrency: usize,
    pub source_timeout_secs: u64,
    /// Retries for download failures only.
    pub fetch_retries: usize,
    pub retry_base_delay_ms: u64,
    /// Report sources, processed in this order.
    pub sources: Vec<ReportSource>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("~"),
            renderer: RendererKind::default(),
            chromium_path: None,
            concurrency: 1,
            source_timeout_secs: 300,
            fetch_retries: 3,
            retry_base_delay_ms: 500,
            sources: default_sources(),
        }
    }
}

/// ERCOT MIS report listings harvested when no config file names sources.
pub fn default_sources() -> Vec<ReportSource> {
    const BASE: &str = "https://www.ercot.com/mp/data-products/data-product-details?id=";
    [
        ("Demand", "NP3-560-CD"),
        ("Solar", "NP4-745-CD"),
        ("Wind", "NP4-732-CD"),
        ("Reserves", "NP3-763-CD"),
        ("Outages", "NP3-233-CD"),
    ]
    .into_iter()
    .map(|(key, id)| ReportSource::new(key, format!("{BASE}{id}")))
    .collect()
}

impl HarvestConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: HarvestConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_yaml(&yaml)?;
        info!(sources = config.sources.len(), "Loaded configuration");
        Ok(config)
    }

    /// Load the file named by `--config` (if any) and apply CLI overrides.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = match &cli.config {
            Some(path) => Self::from_path(Path::new(path))?,
            None => Self::default(),
        };
        config.apply_overrides(cli);
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(base_dir) = &cli.base_dir {
            self.base_dir = PathBuf::from(base_dir);
        }
        if let Some(renderer) = cli.renderer {
            self.renderer = renderer;
        }
        if let Some(path) = &cli.chromium_path {
            self.chromium_path = Some(PathBuf::from(path));
        }
        if let Some(n) = cli.concurrency {
            self.concurrency = n;
        }
        if let Some(secs) = cli.timeout_secs {
            self.source_timeout_secs = secs;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::Invalid("no sources configured".into()));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
        }
        if self.source_timeout_secs == 0 {
            return Err(ConfigError::Invalid("source_timeout_secs must be at least 1".into()));
        }
        if let Some(bad) = self.sources.iter().find(|s| !is_safe_key(&s.key)) {
            return Err(ConfigError::Invalid(format!(
                "source key {:?} cannot name a directory",
                bad.key
            )));
        }
        let dupes = self.sources.iter().map(|s| s.key.as_str()).duplicates().join(", ");
        if !dupes.is_empty() {
            return Err(ConfigError::Invalid(format!("duplicate source keys: {dupes}")));
        }
        Ok(())
    }

    /// Base directory with `~` expanded.
    pub fn resolved_base_dir(&self) -> PathBuf {
        expand_home(&self.base_dir)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

fn is_safe_key(key: &str) -> bool {
    !key.trim().is_empty()
        && key != "."
        && key != ".."
        && !key.contains(['/', '\\'])
        && !key.chars().any(char::is_control)
}
