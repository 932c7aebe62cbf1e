//! File-level background removal pipelines
//!
//! [`BackgroundRemover`] binds a shared session to the single-image and directory
//! pipelines. Both the CLI and the HTTP surface go through it, so output naming and
//! error handling stay identical across frontends.

use crate::{
    config::RemovalOptions,
    error::{BgRemovalError, Result},
    models::ModelId,
    remover,
    services::{BatchProgressReporter, TracingProgressReporter},
    session::{Session, SessionFactory},
};
use log::{debug, error};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::instrument;

/// Extensions processed in directory mode when no allow-list is given
pub const DEFAULT_EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".bmp", ".webp"];

/// Suffix appended to the input stem when no output path is given
const OUTPUT_SUFFIX: &str = "_no_bg";

/// Name of the output directory created inside the input directory
const DEFAULT_OUTPUT_DIR: &str = "no_bg";

/// Result of one file in a directory run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    /// Bytes written, on success
    pub output_size: Option<u64>,
    /// Error message, on failure
    pub error: Option<String>,
}

impl BatchOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-file outcomes of a directory run, in processing order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<BatchOutcome>,
}

impl BatchReport {
    #[must_use]
    pub fn successful(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.successful()
    }

    /// Output paths of the files that succeeded
    #[must_use]
    pub fn output_paths(&self) -> Vec<PathBuf> {
        self.outcomes.iter().filter_map(|o| o.output.clone()).collect()
    }
}

/// Background remover bound to one model session
#[derive(Debug, Clone)]
pub struct BackgroundRemover {
    session: Arc<Session>,
}

impl BackgroundRemover {
    #[must_use]
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Build a remover with a fresh session from `factory`
    ///
    /// # Errors
    /// - `ModelLoad` from the factory
    pub async fn from_factory(factory: &dyn SessionFactory, model: ModelId) -> Result<Self> {
        let session = factory.create_session(model).await?;
        Ok(Self::new(Arc::new(session)))
    }

    #[must_use]
    pub fn model(&self) -> ModelId {
        self.session.model()
    }

    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Remove the background of encoded bytes
    ///
    /// # Errors
    /// - See [`remover::remove`]
    pub fn remove_bytes(&self, input_bytes: &[u8], options: &RemovalOptions) -> Result<Vec<u8>> {
        remover::remove(input_bytes, &self.session, options)
    }

    /// Remove the background of one file and write the result
    ///
    /// Without `output`, the result is written next to the input as `<stem>_no_bg.<ext>`.
    /// Missing parent directories of the output are created.
    ///
    /// # Errors
    /// - `NotFound` if `input` does not exist
    /// - Decoding, inference and I/O failures
    #[instrument(skip(self, options), fields(model = %self.model()))]
    pub fn remove_background(
        &self,
        input: &Path,
        output: Option<&Path>,
        options: &RemovalOptions,
    ) -> Result<PathBuf> {
        if !input.exists() {
            return Err(BgRemovalError::not_found(input));
        }

        let output = output.map_or_else(|| default_output_path(input, options), Path::to_path_buf);

        let input_bytes =
            fs::read(input).map_err(|e| BgRemovalError::file_io_error("read", input, &e))?;
        let output_bytes = self.remove_bytes(&input_bytes, options)?;

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| BgRemovalError::file_io_error("create directory", parent, &e))?;
        }
        fs::write(&output, &output_bytes)
            .map_err(|e| BgRemovalError::file_io_error("write", &output, &e))?;

        debug!(
            "Wrote {} bytes to {}",
            output_bytes.len(),
            output.display()
        );
        Ok(output)
    }

    /// Process every matching image in `input_dir`, returning the outputs that succeeded
    ///
    /// Progress is emitted as tracing events.
    ///
    /// # Errors
    /// - `InvalidInput` if `input_dir` is not a directory
    /// - Failure to list the directory
    pub fn process_directory(
        &self,
        input_dir: &Path,
        output_dir: Option<&Path>,
        extensions: &[String],
        options: &RemovalOptions,
    ) -> Result<Vec<PathBuf>> {
        let report = self.process_directory_with_progress(
            input_dir,
            output_dir,
            extensions,
            options,
            &TracingProgressReporter,
        )?;
        Ok(report.output_paths())
    }

    /// Process every matching image in `input_dir`, reporting each file to `reporter`
    ///
    /// The output directory is created up front, even when no file matches. Files are
    /// processed in sorted order. A failing file is recorded and the run continues.
    ///
    /// # Errors
    /// - `InvalidInput` if `input_dir` is not a directory
    /// - Failure to list the directory
    #[instrument(skip(self, extensions, options, reporter), fields(model = %self.model()))]
    pub fn process_directory_with_progress(
        &self,
        input_dir: &Path,
        output_dir: Option<&Path>,
        extensions: &[String],
        options: &RemovalOptions,
        reporter: &dyn BatchProgressReporter,
    ) -> Result<BatchReport> {
        if !input_dir.is_dir() {
            return Err(BgRemovalError::invalid_input(format!(
                "{} is not a directory",
                input_dir.display()
            )));
        }

        let output_dir =
            output_dir.map_or_else(|| input_dir.join(DEFAULT_OUTPUT_DIR), Path::to_path_buf);
        fs::create_dir_all(&output_dir)
            .map_err(|e| BgRemovalError::file_io_error("create directory", &output_dir, &e))?;
        let files = find_images(input_dir, extensions)?;
        let total = files.len();
        reporter.report_start(input_dir, total);

        let mut report = BatchReport {
            outcomes: Vec::with_capacity(total),
        };

        for (index, input) in files.into_iter().enumerate() {
            let target = output_dir.join(output_file_name(&input, options));
            let outcome = match self.remove_background(&input, Some(&target), options) {
                Ok(output) => BatchOutcome {
                    output_size: fs::metadata(&output).ok().map(|m| m.len()),
                    output: Some(output),
                    input,
                    error: None,
                },
                Err(e) => {
                    error!("Error processing {}: {}", input.display(), e);
                    BatchOutcome {
                        input,
                        output: None,
                        output_size: None,
                        error: Some(e.to_string()),
                    }
                },
            };
            reporter.report_item(index + 1, total, &outcome);
            report.outcomes.push(outcome);
        }

        reporter.report_finish(&report);
        Ok(report)
    }
}

/// `<input_dir>/<stem>_no_bg.<ext>` for the requested output format
#[must_use]
pub fn default_output_path(input: &Path, options: &RemovalOptions) -> PathBuf {
    input.with_file_name(output_file_name(input, options))
}

fn output_file_name(input: &Path, options: &RemovalOptions) -> String {
    let stem = input
        .file_stem()
        .map_or_else(|| "output".into(), |s| s.to_string_lossy());
    format!(
        "{stem}{OUTPUT_SUFFIX}.{}",
        options.output_format.extension()
    )
}

/// Lowercase each extension and make sure it starts with a dot
#[must_use]
pub fn normalize_extensions<S: AsRef<str>>(extensions: &[S]) -> Vec<String> {
    extensions
        .iter()
        .map(|e| {
            let e = e.as_ref().trim().to_lowercase();
            if e.starts_with('.') {
                e
            } else {
                format!(".{e}")
            }
        })
        .collect()
}

/// Regular files directly inside `dir` whose suffix is in `extensions`, sorted
fn find_images(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let allowed = normalize_extensions(extensions);
    let entries =
        fs::read_dir(dir).map_err(|e| BgRemovalError::file_io_error("read directory", dir, &e))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| BgRemovalError::file_io_error("read directory", dir, &e))?
            .path();
        if !path.is_file() {
            continue;
        }
        let Some(ext) = path.extension() else {
            continue;
        };
        let suffix = format!(".{}", ext.to_string_lossy().to_lowercase());
        if allowed.contains(&suffix) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
