//! Progress reporting for directory processing
//!
//! Frontends implement [`BatchProgressReporter`] to render per-file progress; the library
//! only emits events.

use crate::processor::{BatchOutcome, BatchReport};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Receives events while a directory is processed
pub trait BatchProgressReporter: Send + Sync {
    /// Called once after enumeration, before the first file
    fn report_start(&self, input_dir: &Path, total: usize);

    /// Called after each file with its 1-based position
    fn report_item(&self, index: usize, total: usize, outcome: &BatchOutcome);

    /// Called once after the last file
    fn report_finish(&self, _report: &BatchReport) {}
}

/// Emits progress as tracing events
#[derive(Debug, Default)]
pub struct TracingProgressReporter;

impl BatchProgressReporter for TracingProgressReporter {
    fn report_start(&self, input_dir: &Path, total: usize) {
        tracing::info!(dir = %input_dir.display(), total, "processing directory");
    }

    fn report_item(&self, index: usize, total: usize, outcome: &BatchOutcome) {
        match &outcome.error {
            None => tracing::info!(index, total, input = %outcome.input.display(), "processed"),
            Some(error) => {
                tracing::error!(index, total, input = %outcome.input.display(), %error, "failed");
            },
        }
    }

    fn report_finish(&self, report: &BatchReport) {
        tracing::info!(
            processed = report.outcomes.len(),
            successful = report.successful(),
            failed = report.failed(),
            "directory complete"
        );
    }
}

/// Human-readable progress lines for terminals
pub struct ConsoleProgressReporter<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> ConsoleProgressReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    fn write_line(&self, line: &str) {
        if let Ok(mut out) = self.out.lock() {
            if let Err(e) = writeln!(out, "{line}") {
                log::debug!("Failed to write progress line: {}", e);
            }
        }
    }
}

impl<W: Write + Send> BatchProgressReporter for ConsoleProgressReporter<W> {
    fn report_start(&self, input_dir: &Path, total: usize) {
        if total == 0 {
            self.write_line(&format!("No image files found in {}", input_dir.display()));
        } else {
            self.write_line(&format!("Processing {total} images..."));
        }
    }

    fn report_item(&self, index: usize, total: usize, outcome: &BatchOutcome) {
        let name = outcome
            .input
            .file_name()
            .map_or_else(|| outcome.input.display().to_string(), |n| n.to_string_lossy().into_owned());
        match &outcome.error {
            None => self.write_line(&format!("[{index}/{total}] Processed: {name}")),
            Some(error) => self.write_line(&format!("Error processing {name}: {error}")),
        }
    }
}
