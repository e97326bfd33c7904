//! Source orchestration.
//!
//! Runs render → parse → select → materialize once per configured source and
//! collects one [`RetrievalResult`] per source into an [`AggregateManifest`].
//!
//! # Failure isolation
//!
//! Every error a source can produce, including a missed deadline or a panic
//! inside its pipeline, is caught at the source boundary and replaced by an
//! empty table labelled with the source key. Remaining sources always run.
//!
//! # Concurrency
//!
//! Up to `concurrency` sources run at once on the current task. Results come
//! back in configured order regardless of completion order. Each source owns
//! its workspace and archive name, so concurrent runs never touch the same
//! files.

use crate::config::HarvestConfig;
use crate::error::HarvestError;
use crate::fetch::ArchiveFetcher;
use crate::listing::parse_listing;
use crate::models::{AggregateManifest, ReportSource, RetrievalResult};
use crate::pipeline::materialize;
use crate::renderer::PageRenderer;
use crate::selector::select_most_recent;
use crate::utils::truncate_for_log;
use crate::workspace::Layout;
use futures::FutureExt;
use futures::stream::{self, StreamExt};
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument};

pub struct Orchestrator<R, F> {
    layout: Layout,
    renderer: R,
    fetcher: F,
    sources: Vec<ReportSource>,
    concurrency: usize,
    source_timeout: Duration,
}

impl<R: PageRenderer, F: ArchiveFetcher> Orchestrator<R, F> {
    pub fn new(config: &HarvestConfig, renderer: R, fetcher: F) -> Self {
        Self {
            layout: Layout::new(config.resolved_base_dir()),
            renderer,
            fetcher,
            sources: config.sources.clone(),
            concurrency: config.concurrency.max(1),
            source_timeout: config.source_timeout(),
        }
    }

    pub fn with_source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = timeout;
        self
    }

    /// Harvest every configured source; never fails as a whole.
    #[instrument(level = "info", skip_all, fields(sources = self.sources.len(), concurrency = self.concurrency))]
    pub async fn run(&self) -> AggregateManifest {
        let total = self.sources.len();
        let results: Vec<RetrievalResult> = stream::iter(self.sources.iter().enumerate())
            .map(|(i, source)| async move {
                info!(source = %source.key, progress = %format!("{}/{}", i + 1, total), "Processing source");
                self.run_source(source).await
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let manifest = AggregateManifest { results };
        info!(
            total,
            successful = manifest.success_count(),
            failed = total - manifest.success_count(),
            "Completed all sources"
        );
        manifest
    }

    /// One source, bounded by the deadline, with every failure converted.
    async fn run_source(&self, source: &ReportSource) -> RetrievalResult {
        let t0 = Instant::now();
        let attempt = AssertUnwindSafe(self.harvest(source)).catch_unwind();

        let outcome = match tokio::time::timeout(self.source_timeout, attempt).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(HarvestError::Unclassified(panic_message(panic))),
            Err(_) => Err(HarvestError::Timeout(self.source_timeout)),
        };

        match outcome {
            Ok(result) => {
                info!(
                    source = %source.key,
                    rows = result.table.len(),
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    "Source harvested"
                );
                result
            }
            Err(e) => {
                error!(source = %source.key, kind = %e.kind(), error = %e, "Source failed");
                info!(source = %source.key, "Returning an empty table");
                RetrievalResult::failed(&source.key, e)
            }
        }
    }

    #[instrument(level = "info", skip_all, fields(source = %source.key))]
    async fn harvest(&self, source: &ReportSource) -> Result<RetrievalResult, HarvestError> {
        let markup = self.renderer.render(&source.listing_url).await?;
        let listing = parse_listing(&markup).inspect_err(|_| {
            debug!(preview = %truncate_for_log(&markup, 300), "Unparseable listing markup");
        })?;
        debug!(
            payload = %listing.payload_name,
            posted = ?listing.candidates.iter().map(|c| c.posted_at.to_string()).collect::<Vec<_>>(),
            "Listing candidates"
        );
        let candidate = select_most_recent(&listing.candidates)?;
        info!(link = %candidate.download_link, posted_at = %candidate.posted_at, "Selected newest extract");
        materialize(&self.layout, &self.fetcher, source, &listing, candidate).await
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("pipeline panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("pipeline panicked: {s}")
    } else {
        "pipeline panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::fetch::ScriptedFetcher;
    use crate::pipeline::fixtures::zip_bytes;
    use crate::renderer::StaticRenderer;
    use crate::table::REPORT_NAME_COLUMN;

    fn listing(name: &str, rows: &[(&str, &str, &str)]) -> String {
        let rows = rows
            .iter()
            .map(|(link, date, time)| {
                format!(
                    r#"<tr><td class="name">{name}</td><td>{date}</td><td>{time}</td><td><a href="{link}">zip</a></td></tr>"#
                )
            })
            .collect::<String>();
        format!(
            r#"<html><body><table id="reportTable"><tr><td class="name">{name}</td><th>Date</th><th>Time</th><th></th></tr>{rows}</table></body></html>"#
        )
    }

    fn config(base: &std::path::Path, keys: &[&str], concurrency: usize) -> HarvestConfig {
        HarvestConfig {
            base_dir: base.to_path_buf(),
            concurrency,
            sources: keys
                .iter()
                .map(|k| ReportSource::new(*k, format!("https://mis.example.com/{k}")))
                .collect(),
            ..HarvestConfig::default()
        }
    }

    fn assert_labeled(manifest: &AggregateManifest, keys: &[&str]) {
        assert_eq!(manifest.keys().collect::<Vec<_>>(), keys);
        for r in &manifest.results {
            assert!(r.table.column_index(REPORT_NAME_COLUMN).is_some());
            assert!(r.table.column(REPORT_NAME_COLUMN).unwrap().iter().all(|v| *v == r.source_key));
        }
    }

    #[tokio::test]
    async fn test_newest_selected_and_fetch_failure_isolated() {
        let tmp = tempfile::tempdir().unwrap();
        let renderer = StaticRenderer::default()
            .with_page(
                "https://mis.example.com/Demand",
                listing(
                    "DemandData",
                    &[
                        ("/link/a.zip", "03/01/2024", "09:00:00 AM"),
                        ("/link/b.zip", "03/01/2024", "05:00:00 PM"),
                    ],
                ),
            )
            .with_page(
                "https://mis.example.com/Wind",
                listing("WindData", &[("/link/w.zip", "03/02/2024", "01:00:00 AM")]),
            );
        let fetcher = ScriptedFetcher::default()
            .with_failure("https://mis.example.com/link/b.zip", "status 500")
            .with_bytes(
                "https://mis.example.com/link/w.zip",
                zip_bytes(&[("wind.csv", "Hour,MW\n1,5000\n")]),
            );

        let orchestrator = Orchestrator::new(&config(tmp.path(), &["Demand", "Wind"], 1), renderer, fetcher);
        let manifest = orchestrator.run().await;

        assert_labeled(&manifest, &["Demand", "Wind"]);

        let demand = manifest.get("Demand").unwrap();
        assert_eq!(demand.error_kind(), Some(ErrorKind::FetchFailure));
        assert!(demand.table.is_empty());
        assert!(demand.archive_path.is_none());
        assert!(demand.extract_dir.is_none());
        assert!(demand.payload_name.is_none());

        let wind = manifest.get("Wind").unwrap();
        assert!(wind.is_success());
        assert_eq!(wind.table.len(), 1);
        assert_eq!(wind.payload_name.as_deref(), Some("WindData"));

        assert_eq!(orchestrator.fetcher.request_count("https://mis.example.com/link/b.zip"), 1);
        assert_eq!(orchestrator.fetcher.request_count("https://mis.example.com/link/a.zip"), 0);
        assert_eq!(orchestrator.fetcher.request_count("https://mis.example.com/link/w.zip"), 1);
    }

    #[tokio::test]
    async fn test_renderer_unavailable_for_one_of_three() {
        let tmp = tempfile::tempdir().unwrap();
        let renderer = StaticRenderer::default()
            .with_page(
                "https://mis.example.com/Solar",
                listing("SolarData", &[("/s.zip", "01/05/2024", "10:00:00 AM")]),
            )
            .with_unavailable("https://mis.example.com/Wind", "chromedriver missing")
            .with_page(
                "https://mis.example.com/Outages",
                listing("OutageData", &[("/o.zip", "01/05/2024", "11:00:00 AM")]),
            );
        let fetcher = ScriptedFetcher::default()
            .with_bytes("https://mis.example.com/s.zip", zip_bytes(&[("s.csv", "a\n1\n")]))
            .with_bytes("https://mis.example.com/o.zip", zip_bytes(&[("o.csv", "b\n2\n3\n")]));

        let manifest = Orchestrator::new(
            &config(tmp.path(), &["Solar", "Wind", "Outages"], 1),
            renderer,
            fetcher,
        )
        .run()
        .await;

        assert_labeled(&manifest, &["Solar", "Wind", "Outages"]);
        assert_eq!(manifest.success_count(), 2);
        assert_eq!(
            manifest.get("Wind").unwrap().error_kind(),
            Some(ErrorKind::RendererUnavailable)
        );
        assert_eq!(manifest.get("Solar").unwrap().table.len(), 1);
        assert_eq!(manifest.get("Outages").unwrap().table.len(), 2);
    }

    #[test]
    fn test_listing_fixture_without_rows_still_names_payload() {
        let manifest = parse_listing(&listing("ReserveData", &[])).unwrap();
        assert_eq!(manifest.payload_name, "ReserveData");
        assert!(manifest.candidates.is_empty());
    }

    #[tokio::test]
    async fn test_empty_listing_never_downloads() {
        let tmp = tempfile::tempdir().unwrap();
        let renderer = StaticRenderer::default()
            .with_page("https://mis.example.com/Reserves", listing("ReserveData", &[]));

        let orchestrator = Orchestrator::new(
            &config(tmp.path(), &["Reserves"], 1),
            renderer,
            ScriptedFetcher::default(),
        );
        let manifest = orchestrator.run().await;

        assert_eq!(
            manifest.get("Reserves").unwrap().error_kind(),
            Some(ErrorKind::SelectionFailure)
        );
        assert!(orchestrator.fetcher.requests.lock().unwrap().is_empty());
        assert!(!orchestrator.layout.workspace_dir("Reserves").exists());
    }

    #[tokio::test]
    async fn test_concurrent_run_keeps_configured_order() {
        let tmp = tempfile::tempdir().unwrap();
        let keys = ["E", "D", "C", "B", "A"];
        let mut renderer = StaticRenderer::default();
        let mut fetcher = ScriptedFetcher::default();
        for k in keys {
            renderer = renderer.with_page(
                &format!("https://mis.example.com/{k}"),
                listing(&format!("{k}Data"), &[(format!("/{k}.zip").as_str(), "02/29/2024", "12:00:00 PM")]),
            );
            fetcher = fetcher.with_bytes(
                &format!("https://mis.example.com/{k}.zip"),
                zip_bytes(&[("p.csv", format!("col\n{k}\n").as_str())]),
            );
        }

        let manifest = Orchestrator::new(&config(tmp.path(), &keys, 3), renderer, fetcher)
            .run()
            .await;

        assert_labeled(&manifest, &keys);
        assert_eq!(manifest.success_count(), 5);
        for k in keys {
            let r = manifest.get(k).unwrap();
            assert_eq!(r.table.column("col").unwrap(), vec![k]);
            assert_eq!(r.extract_dir.as_deref(), Some(tmp.path().join(format!("downloads/unzipped_files/{k}")).as_path()));
        }
    }

    struct HangingRenderer;

    impl PageRenderer for HangingRenderer {
        async fn render(&self, _url: &str) -> Result<String, HarvestError> {
            futures::future::pending::<()>().await;
            unreachable!()
        }
    }

    #[tokio::test]
    async fn test_deadline_expiry_is_a_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let manifest = Orchestrator::new(
            &config(tmp.path(), &["Slow"], 1),
            HangingRenderer,
            ScriptedFetcher::default(),
        )
        .with_source_timeout(Duration::from_millis(20))
        .run()
        .await;

        let slow = manifest.get("Slow").unwrap();
        assert_eq!(slow.error_kind(), Some(ErrorKind::Timeout));
        assert_eq!(slow.table.columns, vec![REPORT_NAME_COLUMN]);
    }

    struct PanickingRenderer;

    impl PageRenderer for PanickingRenderer {
        async fn render(&self, url: &str) -> Result<String, HarvestError> {
            panic!("unexpected markup at {url}");
        }
    }

    #[tokio::test]
    async fn test_panic_is_unclassified() {
        let tmp = tempfile::tempdir().unwrap();
        let manifest = Orchestrator::new(
            &config(tmp.path(), &["A", "B"], 1),
            PanickingRenderer,
            ScriptedFetcher::default(),
        )
        .run()
        .await;

        assert_labeled(&manifest, &["A", "B"]);
        assert!(
            manifest
                .results
                .iter()
                .all(|r| r.error_kind() == Some(ErrorKind::Unclassified))
        );
    }
}
