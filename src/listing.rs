//! Listing page parser.
//!
//! Turns rendered listing markup into a [`ListingManifest`]. The listing is a
//! single `table#reportTable`: one `td.name` cell names the payload, and each
//! data row carries a download anchor plus a posting date and time split
//! across the second and third cells:
//!
//! ```text
//! <table id="reportTable">
//!   <tr><th>Name</th><th>Posted</th><th></th><th>Link</th></tr>
//!   <tr><td class="name">DemandData</td><td>03/01/2024</td><td>05:00:00 PM</td>
//!       <td><a href="/misdownload/b.zip">zip</a></td></tr>
//! </table>
//! ```
//!
//! Parsing is all-or-nothing: a row with no anchor or an unparseable
//! timestamp fails the whole listing, since it signals that the page layout
//! changed.

use crate::error::HarvestError;
use crate::models::{ExtractCandidate, ListingManifest};
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

/// Format of the joined date and time cells, e.g. `03/01/2024 05:00:00 PM`.
pub const POSTED_AT_FORMAT: &str = "%m/%d/%Y %I:%M:%S %p";

static TABLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table#reportTable").unwrap());
static NAME_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("td.name").unwrap());
static ROW_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());
static CELL_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("td").unwrap());
static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Parse listing markup into its payload name and candidate rows.
///
/// # Errors
///
/// [`HarvestError::Parse`] when the report table or its name cell is missing,
/// or when any data row lacks an anchor `href` or a parseable timestamp.
#[instrument(level = "debug", skip_all, fields(bytes = markup.len()))]
pub fn parse_listing(markup: &str) -> Result<ListingManifest, HarvestError> {
    let document = Html::parse_document(markup);

    let table = document
        .select(&TABLE_SELECTOR)
        .next()
        .ok_or_else(|| HarvestError::Parse("report table not found".into()))?;

    let payload_name = table
        .select(&NAME_SELECTOR)
        .next()
        .map(cell_text)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| HarvestError::Parse("payload name not found".into()))?;

    let candidates = table
        .select(&ROW_SELECTOR)
        .skip(1)
        .enumerate()
        .map(|(i, row)| parse_row(row).map_err(|e| HarvestError::Parse(format!("row {}: {e}", i + 1))))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(%payload_name, count = candidates.len(), "Parsed listing");
    Ok(ListingManifest {
        payload_name,
        candidates,
    })
}

/// Parse one data row.
fn parse_row(row: ElementRef<'_>) -> Result<ExtractCandidate, String> {
    let posted_text = row
        .select(&CELL_SELECTOR)
        .skip(1)
        .take(2)
        .map(cell_text)
        .collect::<Vec<_>>()
        .join(" ");

    let posted_at = NaiveDateTime::parse_from_str(&posted_text, POSTED_AT_FORMAT)
        .map_err(|e| format!("bad timestamp {posted_text:?}: {e}"))?;

    let download_link = row
        .select(&ANCHOR_SELECTOR)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .ok_or_else(|| "download link not found".to_string())?
        .to_string();

    Ok(ExtractCandidate {
        download_link,
        posted_at,
    })
}

/// Cell text with surrounding whitespace removed and inner runs collapsed.
fn cell_text(cell: ElementRef<'_>) -> String {
    let raw = cell.text().collect::<String>();
    WHITESPACE.replace_all(raw.trim(), " ").into_owned()
}
