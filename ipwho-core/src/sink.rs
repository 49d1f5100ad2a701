//! Report output to stdout and an optional file
//!
//! Stdout always receives the report. The file copy is best effort: a failure
//! to save it is reported but never hides the report from stdout.

use crate::error::Result;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Where the file copy of a report ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkReport {
    /// No output name was given
    StdoutOnly,
    /// The report was saved to this path
    Saved(PathBuf),
    /// Saving failed; stdout still received the report
    Failed {
        /// Path that could not be written
        path: PathBuf,
        /// Reason for the failure
        reason: String,
    },
}

/// Makes a user-supplied name safe to use as a file name
///
/// Every character that is not alphanumeric, `_`, `-` or `.` becomes `_`,
/// and only the final path segment is kept. Names that end up empty or made
/// only of dots are replaced with underscores. Applying the function twice
/// gives the same result as applying it once.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let base = replaced
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    if base.is_empty() {
        "_".to_string()
    } else if base.chars().all(|c| c == '.') {
        "_".repeat(base.len())
    } else {
        base.to_string()
    }
}

/// Report writer
#[derive(Debug, Clone)]
pub struct Sink {
    file: Option<PathBuf>,
}

impl Sink {
    /// Creates a sink; when `output_name` is given the report is also saved
    /// as `output_dir/<sanitized name>`
    pub fn new(output_dir: impl AsRef<Path>, output_name: Option<&str>) -> Self {
        Self {
            file: output_name.map(|name| output_dir.as_ref().join(sanitize_filename(name))),
        }
    }

    /// Path the file copy will be written to, if any
    pub fn file_path(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Writes `text` to stdout and, if configured, to the output file
    ///
    /// # Errors
    ///
    /// Returns an error only if stdout cannot be written.
    pub fn emit(&self, text: &str) -> Result<SinkReport> {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        self.emit_to(&mut handle, text)
    }

    /// Same as [`emit`](Self::emit) with an explicit console writer
    pub fn emit_to<W: Write>(&self, console: &mut W, text: &str) -> Result<SinkReport> {
        console.write_all(text.as_bytes())?;
        console.flush()?;

        let Some(path) = &self.file else {
            return Ok(SinkReport::StdoutOnly);
        };

        match save(path, text) {
            Ok(()) => {
                info!(path = %path.display(), "report saved");
                Ok(SinkReport::Saved(path.clone()))
            }
            Err(e) => {
                let reason = match e.kind() {
                    io::ErrorKind::AlreadyExists => "file already exists".to_string(),
                    _ => e.to_string(),
                };
                error!(path = %path.display(), "failed to save report: {}", reason);
                eprintln!("[ERROR] Failed to save results to {}: {}", path.display(), reason);
                Ok(SinkReport::Failed {
                    path: path.clone(),
                    reason,
                })
            }
        }
    }
}

fn save(path: &Path, text: &str) -> io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(text.as_bytes())?;
    file.sync_all()
}
