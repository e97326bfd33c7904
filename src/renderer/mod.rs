//! Page rendering collaborators.
//!
//! Listing pages may be built client-side, so the pipeline never fetches
//! them directly. It asks a [`PageRenderer`] for the final markup instead.
//!
//! | Renderer | Module | Notes |
//! |----------|--------|-------|
//! | Plain HTTP | [`http`] | Static markup only; no browser needed |
//! | Headless Chromium | [`chromium`] | Requires the `chromium` cargo feature |
//!
//! A renderer that cannot start reports [`HarvestError::RendererUnavailable`]
//! so configuration problems are distinguishable from transient fetch errors.

pub mod chromium;
pub mod http;

use crate::error::HarvestError;
use serde::Deserialize;

pub use chromium::ChromiumRenderer;
pub use http::HttpRenderer;

/// Narrow capability: turn a URL into fully rendered markup.
pub trait PageRenderer {
    async fn render(&self, url: &str) -> Result<String, HarvestError>;
}

/// Which renderer the harvest run uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    #[default]
    Http,
    Chromium,
}

/// Runtime-selected renderer.
#[derive(Debug)]
pub enum Renderer {
    Http(HttpRenderer),
    Chromium(ChromiumRenderer),
}

impl PageRenderer for Renderer {
    async fn render(&self, url: &str) -> Result<String, HarvestError> {
        match self {
            Renderer::Http(r) => r.render(url).await,
            Renderer::Chromium(r) => r.render(url).await,
        }
    }
}

#[cfg(test)]
pub use stub::StaticRenderer;
