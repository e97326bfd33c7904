//! Retrieval and extraction of one selected extract.
//!
//! Given a source, its parsed listing, and the selected candidate, the
//! pipeline:
//!
//! 1. **Downloads** the archive (relative links resolve against the listing URL)
//! 2. **Resets** the source's workspace and ensures `downloads/` exists
//! 3. **Persists** the archive under its deterministic name
//! 4. **Extracts** every entry into the workspace
//! 5. **Discovers** the payload: exactly one top-level file is expected
//! 6. **Loads** the payload as a [`Table`] labelled with the source key
//!
//! Any step failing returns a typed [`HarvestError`]; the caller decides how
//! to record it.

use crate::error::HarvestError;
use crate::fetch::ArchiveFetcher;
use crate::models::{ExtractCandidate, ListingManifest, ReportSource, RetrievalResult};
use crate::table::Table;
use crate::workspace::Layout;
use std::fs::File;
use std::path::{Path, PathBuf};
use tokio::task;
use tracing::{debug, info, instrument};
use url::Url;

/// Run steps 1-6 for `candidate` and build the source's result.
#[instrument(level = "info", skip_all, fields(source = %source.key, link = %candidate.download_link))]
pub async fn materialize<F: ArchiveFetcher>(
    layout: &Layout,
    fetcher: &F,
    source: &ReportSource,
    listing: &ListingManifest,
    candidate: &ExtractCandidate,
) -> Result<RetrievalResult, HarvestError> {
    let url = resolve_link(&source.listing_url, &candidate.download_link)?;
    let bytes = fetcher.fetch(&url).await?;
    info!(bytes = bytes.len(), %url, "Downloaded extract");

    let extract_dir = layout.reset_workspace(&source.key).await?;
    layout.ensure_downloads_dir().await?;

    let archive_path = layout.archive_path(&listing.payload_name, &candidate.posted_at);
    tokio::fs::write(&archive_path, &bytes).await?;
    debug!(path = %archive_path.display(), "Persisted archive");

    let table = {
        let archive_path = archive_path.clone();
        let extract_dir = extract_dir.clone();
        let key = source.key.clone();
        task::spawn_blocking(move || -> Result<Table, HarvestError> {
            let entries = extract_archive(&archive_path, &extract_dir)?;
            debug!(entries, dir = %extract_dir.display(), "Extracted archive");
            let payload = discover_payload(&extract_dir)?;
            Ok(Table::from_path(&payload)?.with_report_name(&key))
        })
        .await
        .map_err(|e| HarvestError::Unclassified(format!("extraction task failed: {e}")))??
    };

    info!(rows = table.len(), "Loaded payload");
    Ok(RetrievalResult {
        source_key: source.key.clone(),
        table,
        archive_path: Some(archive_path),
        extract_dir: Some(extract_dir),
        payload_name: Some(listing.payload_name.clone()),
        selected: Some(candidate.clone()),
        candidates: listing.candidates.clone(),
        error: None,
    })
}

/// Resolve a listing row's link against the listing page URL.
pub fn resolve_link(listing_url: &str, link: &str) -> Result<String, HarvestError> {
    if let Ok(absolute) = Url::parse(link) {
        return Ok(absolute.to_string());
    }
    Url::parse(listing_url)
        .and_then(|base| base.join(link))
        .map(|u| u.to_string())
        .map_err(|e| HarvestError::fetch(link, format!("cannot resolve link: {e}")))
}

/// Unpack every entry of a zip archive into `dest`, returning the entry count.
///
/// Entries whose names would escape `dest` are rejected.
pub fn extract_archive(archive_path: &Path, dest: &Path) -> Result<usize, HarvestError> {
    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| HarvestError::Extract(format!("{}: {e}", archive_path.display())))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| HarvestError::Extract(e.to_string()))?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| HarvestError::Extract(format!("unsafe entry path {:?}", entry.name())))?;
        let out_path = dest.join(relative);

        let unpack_err = |e: std::io::Error| HarvestError::Extract(format!("{}: {e}", out_path.display()));

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(unpack_err)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(unpack_err)?;
        }
        let mut out = File::create(&out_path).map_err(unpack_err)?;
        std::io::copy(&mut entry, &mut out).map_err(unpack_err)?;
    }

    Ok(archive.len())
}

/// Find the single payload file at the top level of `dir`.
///
/// # Errors
///
/// [`HarvestError::Load`] when the directory is empty, holds more than one
/// entry, or its only entry is not a regular file.
pub fn discover_payload(dir: &Path) -> Result<PathBuf, HarvestError> {
    let entries = std::fs::read_dir(dir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;

    match entries.as_slice() {
        [] => Err(HarvestError::Load("archive contained no files".into())),
        [only] if only.is_file() => Ok(only.clone()),
        [only] => Err(HarvestError::Load(format!(
            "expected a payload file, found directory {}",
            only.display()
        ))),
        many => Err(HarvestError::Load(format!(
            "expected exactly one payload file, found {} entries",
            many.len()
        ))),
    }
}
