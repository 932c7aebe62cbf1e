//! Model weight downloading
//!
//! Weights are streamed into a uniquely named `.part` file inside the cache directory and
//! renamed into place once complete, so concurrent first-use downloads never observe a
//! half-written weight file.

use crate::cache::ModelCache;
use crate::error::{BgRemovalError, Result};
use crate::models::ModelId;
use futures_util::stream::TryStreamExt;
#[cfg(feature = "cli")]
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

/// Model downloader with progress reporting
#[derive(Debug, Clone)]
pub struct ModelDownloader {
    client: Client,
    cache: ModelCache,
}

/// Progress bar abstraction that works with and without CLI features
#[derive(Debug)]
pub enum ProgressIndicator {
    #[cfg(feature = "cli")]
    Indicatif(ProgressBar),
    NoOp,
}

impl ProgressIndicator {
    pub fn set_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_message(msg),
            Self::NoOp => {
                let _ = msg;
            },
        }
    }

    pub fn set_length(&self, len: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_length(len),
            Self::NoOp => {
                let _ = len;
            },
        }
    }

    pub fn set_position(&self, pos: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_position(pos),
            Self::NoOp => {
                let _ = pos;
            },
        }
    }

    pub fn finish_with_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.finish_with_message(msg),
            Self::NoOp => {
                let _ = msg;
            },
        }
    }
}

impl ModelDownloader {
    /// Create a new model downloader writing into `cache`
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new(cache: ModelCache) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| BgRemovalError::network_error("Failed to create HTTP client", e))?;

        Ok(Self { client, cache })
    }

    /// Return the cached weight path for `model`, downloading it first if needed
    ///
    /// A cached file whose digest no longer matches its sidecar is downloaded again.
    ///
    /// # Errors
    /// - Network errors during download
    /// - File system errors during caching
    pub async fn ensure_model(&self, model: ModelId, show_progress: bool) -> Result<PathBuf> {
        self.ensure_model_from(model, &model.download_url(), show_progress)
            .await
    }

    async fn ensure_model_from(
        &self,
        model: ModelId,
        url: &str,
        show_progress: bool,
    ) -> Result<PathBuf> {
        if self.cache.is_model_cached(model) {
            match self.verify_cached_model(model) {
                Ok(true) => {
                    log::debug!("Model already cached: {}", model);
                    return Ok(self.cache.model_path(model));
                },
                Ok(false) => log::warn!("Cached model {} is corrupt, downloading again", model),
                Err(e) => log::warn!("Failed to verify cached model {}: {}, downloading again", model, e),
            }
        }
        self.download_model_from(model, url, show_progress).await
    }

    /// Download the weights for `model` from `url` into the cache
    ///
    /// # Errors
    /// - Non-success HTTP status or transport failure
    /// - File system errors while writing or renaming
    pub async fn download_model_from(
        &self,
        model: ModelId,
        url: &str,
        show_progress: bool,
    ) -> Result<PathBuf> {
        log::info!("Downloading model {} from: {}", model, url);

        let final_path = self.cache.model_path(model);
        let temp_path = self.cache.cache_dir().join(format!(
            ".{}.{}.part",
            model.file_name(),
            unique_suffix()
        ));

        let progress = show_progress.then(Self::create_progress_indicator);
        if let Some(pb) = &progress {
            pb.set_message(format!("Downloading {}", model.file_name()));
        }

        match self.download_file(url, &temp_path, progress.as_ref()).await {
            Ok(digest) => {
                fs::rename(&temp_path, &final_path).map_err(|e| {
                    BgRemovalError::file_io_error("move downloaded model to cache", &final_path, &e)
                })?;

                let checksum_path = self.cache.checksum_path(model);
                if let Err(e) = fs::write(&checksum_path, format!("{digest}\n")) {
                    log::warn!("Failed to record checksum for {}: {}", model, e);
                }

                if let Some(pb) = progress {
                    pb.finish_with_message(format!("Downloaded {}", model));
                }

                log::info!("Successfully downloaded model: {} (sha256 {})", model, digest);
                Ok(final_path)
            },
            Err(e) => {
                if temp_path.exists() {
                    if let Err(cleanup_err) = fs::remove_file(&temp_path) {
                        log::warn!("Failed to cleanup partial download: {}", cleanup_err);
                    }
                }

                if let Some(pb) = progress {
                    pb.finish_with_message("Download failed".to_string());
                }

                Err(e)
            },
        }
    }

    fn create_progress_indicator() -> ProgressIndicator {
        #[cfg(feature = "cli")]
        {
            let pb = ProgressBar::new(0);
            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
            ) {
                pb.set_style(style.progress_chars("#>-"));
            }
            ProgressIndicator::Indicatif(pb)
        }
        #[cfg(not(feature = "cli"))]
        {
            ProgressIndicator::NoOp
        }
    }

    /// Stream `url` into `local_path`, returning the hex SHA-256 of the body
    async fn download_file(
        &self,
        url: &str,
        local_path: &Path,
        progress: Option<&ProgressIndicator>,
    ) -> Result<String> {
        log::debug!("Downloading: {} -> {}", url, local_path.display());

        let response =
            self.client.get(url).send().await.map_err(|e| {
                BgRemovalError::network_error(format!("Failed to download {}", url), e)
            })?;

        if !response.status().is_success() {
            return Err(BgRemovalError::network_error(
                format!("Failed to download {}", url),
                format!("HTTP error {}", response.status()),
            ));
        }

        let total_size = response.content_length();
        if let (Some(pb), Some(total)) = (progress, total_size) {
            pb.set_length(total);
        }

        let mut file = tokio::fs::File::create(local_path)
            .await
            .map_err(|e| BgRemovalError::file_io_error("create file", local_path, &e))?;

        let mut stream = StreamReader::new(
            response
                .bytes_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
        );

        let mut hasher = Sha256::new();
        let mut downloaded = 0u64;
        let mut buffer = vec![0; 8192];

        loop {
            let bytes_read = tokio::io::AsyncReadExt::read(&mut stream, &mut buffer)
                .await
                .map_err(|e| BgRemovalError::network_error("Failed to read download stream", e))?;

            if bytes_read == 0 {
                break;
            }

            let chunk = buffer.get(..bytes_read).unwrap_or(&[]);
            hasher.update(chunk);
            file.write_all(chunk)
                .await
                .map_err(|e| BgRemovalError::file_io_error("write to file", local_path, &e))?;

            downloaded += bytes_read as u64;

            if let Some(pb) = progress {
                if total_size.is_some() {
                    pb.set_position(downloaded);
                } else {
                    pb.set_message(format!(
                        "Downloaded {:.1} MB",
                        downloaded as f64 / 1_048_576.0
                    ));
                }
            }
        }

        if downloaded == 0 {
            return Err(BgRemovalError::network_error(
                format!("Failed to download {}", url),
                "empty response body",
            ));
        }

        file.flush()
            .await
            .map_err(|e| BgRemovalError::file_io_error("flush file", local_path, &e))?;

        log::debug!("Downloaded {} bytes to {}", downloaded, local_path.display());
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Recompute the digest of a cached model and compare it with the recorded one
    ///
    /// Returns `true` when no digest was recorded.
    ///
    /// # Errors
    /// - Model not cached
    /// - Failed to read the weight file
    pub fn verify_cached_model(&self, model: ModelId) -> Result<bool> {
        let path = self.cache.model_path(model);
        if !self.cache.is_model_cached(model) {
            return Err(BgRemovalError::not_found(path));
        }

        let Some(expected) = self.cache.recorded_checksum(model) else {
            return Ok(true);
        };

        let actual = compute_file_sha256(&path)?;
        if actual == expected {
            Ok(true)
        } else {
            log::warn!(
                "File integrity check failed for {}: expected {}, got {}",
                path.display(),
                expected,
                actual
            );
            Ok(false)
        }
    }

    /// Get the model cache for other operations
    #[must_use]
    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }
}

/// Hex SHA-256 of a file, read in fixed-size chunks
///
/// # Errors
/// - Failed to open or read the file
pub fn compute_file_sha256(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)
        .map_err(|e| BgRemovalError::file_io_error("open file for verification", path, &e))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0; 64 * 1024];
    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| BgRemovalError::file_io_error("read file for verification", path, &e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(buffer.get(..bytes_read).unwrap_or(&[]));
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn unique_suffix() -> String {
    #[cfg(feature = "cli")]
    {
        uuid::Uuid::new_v4().simple().to_string()
    }
    #[cfg(not(feature = "cli"))]
    {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        format!("{}-{}", std::process::id(), nanos)
    }
}
