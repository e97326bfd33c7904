//! Command-line entry point; see the library crate docs for the pipeline.

use clap::Parser;
use reqwest::Client;
use std::error::Error;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

use extract_harvester::cli::Cli;
use extract_harvester::config::HarvestConfig;
use extract_harvester::fetch::{HttpFetcher, RetryFetch};
use extract_harvester::orchestrator::Orchestrator;
use extract_harvester::outputs::{json, summary};
use extract_harvester::renderer::{ChromiumRenderer, HttpRenderer, Renderer, RendererKind};
use extract_harvester::utils::ensure_writable_dir;

const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("extract_harvester starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let config = HarvestConfig::load(&args).inspect_err(|e| {
        error!(error = %e, "Invalid configuration");
    })?;
    info!(
        sources = config.sources.len(),
        renderer = ?config.renderer,
        concurrency = config.concurrency,
        "Configuration loaded"
    );

    // Early check: ensure the downloads root is writable
    let base_dir = config.resolved_base_dir();
    if let Err(e) = ensure_writable_dir(&base_dir).await {
        error!(
            path = %base_dir.display(),
            error = %e,
            "Base directory is not writable (fix perms or choose a different --base-dir)"
        );
        return Err(e);
    }

    let client = Client::builder().timeout(HTTP_TIMEOUT).build()?;
    let renderer = match config.renderer {
        RendererKind::Http => Renderer::Http(HttpRenderer::new(client.clone())),
        RendererKind::Chromium => {
            Renderer::Chromium(ChromiumRenderer::new(config.chromium_path.clone()))
        }
    };
    let fetcher = RetryFetch::new(
        HttpFetcher::new(client),
        config.fetch_retries,
        config.retry_base_delay(),
    );

    let orchestrator = Orchestrator::new(&config, renderer, fetcher);
    let manifest = orchestrator.run().await;

    for (key, table) in manifest.tables() {
        debug!(source = %key, rows = table.len(), columns = ?table.columns, "Table ready");
    }
    print!("{}", summary::render_summary(&manifest));

    if let Some(path) = &args.manifest_json {
        if let Err(e) = json::write_manifest(&manifest, Path::new(path)).await {
            error!(path = %path, error = %e, "Failed to write manifest JSON");
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        harvested = manifest.success_count(),
        failed = manifest.results.len() - manifest.success_count(),
        "Execution complete"
    );

    Ok(())
}
