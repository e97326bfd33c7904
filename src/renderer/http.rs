//! Plain HTTP renderer for listing pages that are served as static markup.

use super::PageRenderer;
use crate::error::HarvestError;
use reqwest::Client;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Default)]
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl PageRenderer for HttpRenderer {
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn render(&self, url: &str) -> Result<String, HarvestError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| HarvestError::fetch(url, e))?
            .error_for_status()
            .map_err(|e| HarvestError::fetch(url, e))?;

        let html = response.text().await.map_err(|e| HarvestError::fetch(url, e))?;
        debug!(bytes = html.len(), "Fetched listing markup");
        Ok(html)
    }
}
