//! Command-line interface definitions.
//!
//! Every flag overrides the matching field of the YAML configuration file,
//! and most can also be supplied through environment variables.

use crate::renderer::RendererKind;
use clap::Parser;

/// Command-line arguments for the extract harvester.
///
/// # Examples
///
/// ```sh
/// # Built-in sources, plain HTTP listing fetches, downloads under ~/downloads
/// extract_harvester
///
/// # Custom sources rendered through headless Chromium, two at a time
/// extract_harvester -c harvest.yaml --renderer chromium --concurrency 2
///
/// # Also write the aggregate manifest as JSON
/// extract_harvester --manifest-json ./manifest.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "HARVEST_CONFIG")]
    pub config: Option<String>,

    /// Root directory under which `downloads/` is created
    #[arg(short, long, env = "HARVEST_BASE_DIR")]
    pub base_dir: Option<String>,

    /// How listing pages are rendered
    #[arg(long, value_enum, env = "HARVEST_RENDERER")]
    pub renderer: Option<RendererKind>,

    /// Path to the Chromium executable used by the chromium renderer
    #[arg(long, env = "CHROMIUM_PATH")]
    pub chromium_path: Option<String>,

    /// Number of sources processed concurrently
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Per-source deadline in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Write the aggregate manifest to this JSON file
    #[arg(short, long)]
    pub manifest_json: Option<String>,
}
