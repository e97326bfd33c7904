//! Headless Chromium renderer (cargo feature `chromium`).
//!
//! Each [`render`](PageRenderer::render) call launches its own browser and
//! closes it afterwards, so concurrent pipeline runs never share a session.
//! Without the feature every call reports the renderer as unavailable.

use super::PageRenderer;
use crate::error::HarvestError;
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct ChromiumRenderer {
    /// Browser executable; autodetected when `None`.
    #[cfg_attr(not(feature = "chromium"), allow(dead_code))]
    executable: Option<PathBuf>,
}

impl ChromiumRenderer {
    pub fn new(executable: Option<PathBuf>) -> Self {
        Self { executable }
    }
}

#[cfg(feature = "chromium")]
impl PageRenderer for ChromiumRenderer {
    #[tracing::instrument(level = "info", skip_all, fields(%url))]
    async fn render(&self, url: &str) -> Result<String, HarvestError> {
        use chromiumoxide::browser::{Browser, BrowserConfig};
        use futures::StreamExt;
        use tracing::{debug, warn};

        let mut builder = BrowserConfig::builder()
            .arg("--headless=new")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-software-rasterizer");

        if let Some(path) = &self.executable {
            if !path.exists() {
                return Err(HarvestError::RendererUnavailable(format!(
                    "browser executable not found at {}",
                    path.display()
                )));
            }
            builder = builder.chrome_executable(path);
        }

        let config = builder
            .build()
            .map_err(|e| HarvestError::RendererUnavailable(format!("browser config: {e}")))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| HarvestError::RendererUnavailable(format!("failed to launch browser: {e}")))?;

        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let html = async {
            let page = browser
                .new_page(url)
                .await
                .map_err(|e| HarvestError::fetch(url, e))?;
            page.wait_for_navigation()
                .await
                .map_err(|e| HarvestError::fetch(url, e))?;
            page.content().await.map_err(|e| HarvestError::fetch(url, e))
        }
        .await;

        if let Err(e) = browser.close().await {
            warn!(error = %e, "Failed to close browser cleanly");
        }
        if let Err(e) = browser.wait().await {
            warn!(error = %e, "Browser process did not exit cleanly");
        }
        handle.abort();

        let html = html?;
        debug!(bytes = html.len(), "Rendered listing markup");
        Ok(html)
    }
}

#[cfg(not(feature = "chromium"))]
impl PageRenderer for ChromiumRenderer {
    async fn render(&self, _url: &str) -> Result<String, HarvestError> {
        Err(HarvestError::RendererUnavailable(
            "built without the `chromium` feature; rebuild with --features chromium or use the http renderer"
                .into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "chromium"))]
    #[tokio::test]
    async fn test_unavailable_without_feature() {
        let err = ChromiumRenderer::default()
            .render("https://example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::RendererUnavailable(_)));
    }

    #[cfg(feature = "chromium")]
    #[tokio::test]
    async fn test_missing_executable_is_unavailable() {
        let err = ChromiumRenderer::new(Some(PathBuf::from("/nonexistent/chromedriver")))
            .render("https://example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::RendererUnavailable(_)));
    }

    #[cfg(feature = "chromium")]
    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_renders_data_url() {
        let html = ChromiumRenderer::default()
            .render("data:text/html,<table id=\"reportTable\"></table>")
            .await
            .unwrap();
        assert!(html.contains("reportTable"));
    }
}
