//! Plain-text report rendering

use crate::types::{Report, SourceOutcome};
use std::fmt::Write;

/// Shown for a successful source that captured no fields
pub const NO_DATA: &str = "No data returned.";

/// Banner printed above every report
pub fn banner(version: &str) -> String {
    format!("\nOSINT - IP Lookup [Version {}]\n", version)
}

/// Renders a report as text
///
/// The output depends only on the target and on each entry's kind and
/// fields or failure kind. Failure messages and timestamps are not included,
/// so identical source data always renders to identical text.
pub fn render(report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nLookup results for {}", report.ip);

    for entry in report.entries() {
        let _ = write!(out, "\n[ {} ]\n", entry.kind.title());
        match &entry.outcome {
            SourceOutcome::Success { fields, .. } if fields.is_empty() => {
                out.push_str(NO_DATA);
                out.push('\n');
            }
            SourceOutcome::Success { fields, .. } => {
                for (label, value) in fields.iter() {
                    let _ = writeln!(out, "{}: {}", label, value);
                }
            }
            SourceOutcome::Failure { kind, .. } => {
                let _ = writeln!(out, "Error: {}", kind.description());
            }
        }
    }

    out
}
