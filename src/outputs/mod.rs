//! Operator-facing outputs for a completed harvest run.
//!
//! # Submodules
//!
//! - [`summary`]: console summary of where each source's extract landed
//! - [`json`]: the aggregate manifest as a JSON file
//!
//! ```text
//! Summary of files processed and download locations
//! Extract #0 - Demand:
//! (Some("/home/op/downloads/DemandData_20240301_170000.zip"), Some("/home/op/downloads/unzipped_files/Demand"), Some("DemandData"))
//! Extract #1 - Wind:
//! (None, None, None)
//!   RendererUnavailable: renderer unavailable: failed to launch browser
//! ```

pub mod json;
pub mod summary;
