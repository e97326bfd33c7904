//! # Extract Harvester
//!
//! Finds, downloads, and unpacks the most recently published data extract
//! for each configured report listing page, then loads each extract's
//! payload into a table labelled with its source key.
//!
//! ## Usage
//!
//! ```sh
//! extract_harvester -c harvest.yaml --manifest-json ./manifest.json
//! ```
//!
//! ## Architecture
//!
//! For each source, in configured order (optionally a few at a time):
//! 1. **Rendering**: obtain the listing page markup from a [`renderer`]
//! 2. **Parsing**: read payload name and timestamped links from the listing
//! 3. **Selection**: pick the newest extract
//! 4. **Retrieval**: download, unpack into the source's workspace, load the payload
//!
//! A failure at any step only affects its own source; the run always ends
//! with one result per configured source.

pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod listing;
pub mod models;
pub mod orchestrator;
pub mod outputs;
pub mod pipeline;
pub mod renderer;
pub mod selector;
pub mod table;
pub mod utils;
pub mod workspace;
