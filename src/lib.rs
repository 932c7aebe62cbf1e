#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Background Remover
//!
//! Background removal with the U²-Net family of segmentation models, usable as a library,
//! a command-line tool and an HTTP service.
//!
//! ## Features
//!
//! - **Four models**: `u2net`, `u2netp`, `u2net_human_seg` and `u2net_cloth_seg`
//! - **ONNX Runtime backend** with CUDA, `CoreML` and CPU execution providers
//! - **Model management**: weights are downloaded on first use and cached on disk
//! - **Alpha matting**: optional edge refinement of the predicted mask
//! - **Output**: RGBA cutouts or single-channel masks as PNG or WebP
//! - **Frontends**: `bg-remover` CLI and `bg-remover-server` HTTP API
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bg_remover::{
//!     BackendConfig, BackgroundRemover, ModelCache, ModelId, OnnxSessionFactory,
//!     RemovalOptions,
//! };
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! // Weights are fetched into the cache the first time a model is used
//! let factory = OnnxSessionFactory::new(ModelCache::new()?, BackendConfig::default())?;
//! let remover = BackgroundRemover::from_factory(&factory, ModelId::U2net).await?;
//!
//! let options = RemovalOptions::builder().alpha_matting(true).build()?;
//! let output = remover.remove_background(Path::new("input.jpg"), None, &options)?;
//! println!("wrote {}", output.display());
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `onnx` (default): ONNX Runtime backend and the downloading session factory
//! - `cli` (default): command-line interface, progress bars and subscriber setup
//! - `server` (default): axum HTTP surface
//! - `webp-support` (default): WebP input and output
//! - `tracing-json`: JSON log output for the binaries
//!
//! Without `onnx`, provide your own [`SessionFactory`] and [`InferenceBackend`].

pub mod backends;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod inference;
pub mod models;
pub mod processor;
pub mod remover;
#[cfg(feature = "server")]
pub mod server;
pub mod services;
pub mod session;
pub mod session_cache;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod utils;

use tokio::io::AsyncRead;

// Public API exports
#[cfg(feature = "onnx")]
pub use backends::OnnxBackend;
pub use cache::{format_size, CachedModelInfo, ModelCache};
pub use config::{
    AlphaMattingConfig, BackendConfig, ExecutionProvider, OutputFormat, RemovalOptions,
    RemovalOptionsBuilder, ServerConfig,
};
pub use download::ModelDownloader;
pub use error::{BgRemovalError, Result};
pub use inference::InferenceBackend;
pub use models::{ModelId, ModelInfo, OutputKind};
pub use processor::{
    normalize_extensions, BackgroundRemover, BatchOutcome, BatchReport, DEFAULT_EXTENSIONS,
};
pub use services::{
    BatchProgressReporter, ConsoleProgressReporter, OutputFormatHandler,
    TracingProgressReporter,
};
#[cfg(feature = "onnx")]
pub use session::OnnxSessionFactory;
pub use session::{Session, SessionFactory};
pub use session_cache::{SessionCache, SessionCacheStats};
pub use utils::ImagePreprocessor;

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Remove the background from encoded image bytes
///
/// Suitable for web handlers and other in-memory callers.
///
/// ```rust,no_run
/// use bg_remover::{remove_background_from_bytes, RemovalOptions, Session};
///
/// # fn example(session: &Session, upload: &[u8]) -> bg_remover::Result<()> {
/// let png = remove_background_from_bytes(upload, session, &RemovalOptions::default())?;
/// # Ok(())
/// # }
/// ```
pub fn remove_background_from_bytes(
    image_bytes: &[u8],
    session: &Session,
    options: &RemovalOptions,
) -> Result<Vec<u8>> {
    remover::remove(image_bytes, session, options)
}

/// Remove the background from an async reader
///
/// The stream is read to the end before decoding.
pub async fn remove_background_from_reader<R: AsyncRead + Unpin>(
    mut reader: R,
    session: &Session,
    options: &RemovalOptions,
) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut buffer).await?;
    remove_background_from_bytes(&buffer, session, options)
}
