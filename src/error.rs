//! Error types for background removal operations

use std::path::Path;
use thiserror::Error;

/// Result type alias for background removal operations
pub type Result<T> = std::result::Result<T, BgRemovalError>;

/// Error taxonomy shared by the library, the CLI and the HTTP surface
#[derive(Error, Debug)]
pub enum BgRemovalError {
    /// Input path does not exist
    #[error("Input path does not exist: {}", .0.display())]
    NotFound(std::path::PathBuf),

    /// Rejected input: wrong MIME type, bad output format, not a directory, unknown model
    #[error("{0}")]
    InvalidInput(String),

    /// Bytes that do not decode as a supported raster image
    #[error("Invalid image: {0}")]
    InvalidImage(#[from] image::ImageError),

    /// Session construction failure (weights missing, download failed, runtime rejected the model)
    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    /// Failure inside the inference call or while interpreting its output
    #[error("Inference error: {0}")]
    Inference(String),

    /// Input/output errors (permission denied, disk full, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Model weight download failure
    #[error("Network error: {0}")]
    Network(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BgRemovalError {
    /// Create a new not-found error
    pub fn not_found<P: AsRef<Path>>(path: P) -> Self {
        Self::NotFound(path.as_ref().to_path_buf())
    }

    /// Create a new invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new model loading error
    pub fn model_load<S: Into<String>>(msg: S) -> Self {
        Self::ModelLoad(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<Path>>(operation: &str, path: P, error: &std::io::Error) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create network error with context
    pub fn network_error<S: Into<String>, E: std::fmt::Display>(msg: S, error: E) -> Self {
        Self::Network(format!("{}: {}", msg.into(), error))
    }

    /// Whether the error stems from rejected caller input rather than a processing failure
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::InvalidInput(_))
    }
}
