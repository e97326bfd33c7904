//! Console summary of the aggregate manifest.

use crate::models::AggregateManifest;
use std::fmt::Write;

pub const SUMMARY_HEADER: &str = "Summary of files processed and download locations";

/// Render one block per source, in configured order.
///
/// Each block names the source and shows its `(archive_path, extract_dir,
/// payload_name)` triple; failed sources also show their error kind and
/// message.
pub fn render_summary(manifest: &AggregateManifest) -> String {
    let mut out = String::new();
    writeln!(out, "{SUMMARY_HEADER}").unwrap();

    for (i, (result, (key, line))) in manifest.results.iter().zip(manifest.report()).enumerate() {
        writeln!(out, "Extract #{i} - {key}:").unwrap();
        writeln!(
            out,
            "({:?}, {:?}, {:?})",
            line.archive_path, line.extract_dir, line.payload_name
        )
        .unwrap();
        if let Some(e) = &result.error {
            writeln!(out, "  {}: {e}", e.kind()).unwrap();
        }
    }

    writeln!(
        out,
        "{} of {} sources harvested",
        manifest.success_count(),
        manifest.results.len()
    )
    .unwrap();
    out
}
