//! Model weight cache
//!
//! Weight files live flat in one directory as `<model>.onnx`, each with an optional
//! `<model>.onnx.sha256` sidecar written by the downloader. The layout matches the
//! `U2NET_HOME` directory used by other U²-Net tooling, so an existing cache can be reused.

use crate::error::{BgRemovalError, Result};
use crate::models::ModelId;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the cache location
pub const CACHE_DIR_ENV: &str = "U2NET_HOME";

/// Information about a cached model
#[derive(Debug, Clone)]
pub struct CachedModelInfo {
    pub model: ModelId,
    /// Path to the weight file
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Digest recorded at download time, if any
    pub sha256: Option<String>,
}

/// Model cache manager
#[derive(Debug, Clone)]
pub struct ModelCache {
    cache_dir: PathBuf,
}

impl ModelCache {
    /// Create a new model cache manager
    ///
    /// Resolution order:
    /// - `U2NET_HOME` environment variable
    /// - Linux/macOS: `~/.cache/bg-remover/models/`
    /// - Windows: `%LOCALAPPDATA%/bg-remover/models/`
    ///
    /// # Errors
    /// - Failed to determine cache directory
    /// - Failed to create cache directory
    pub fn new() -> Result<Self> {
        let cache_dir = Self::get_cache_dir()?;
        Self::with_custom_cache_dir(&cache_dir)
    }

    /// Create a new model cache rooted at `cache_dir`
    ///
    /// # Errors
    /// - Failed to create cache directory
    pub fn with_custom_cache_dir(cache_dir: &Path) -> Result<Self> {
        if !cache_dir.exists() {
            fs::create_dir_all(cache_dir).map_err(|e| {
                BgRemovalError::file_io_error("create cache directory", cache_dir, &e)
            })?;
        }

        Ok(Self {
            cache_dir: cache_dir.to_path_buf(),
        })
    }

    fn get_cache_dir() -> Result<PathBuf> {
        if let Ok(cache_override) = std::env::var(CACHE_DIR_ENV) {
            return Ok(PathBuf::from(cache_override));
        }

        Ok(dirs::cache_dir()
            .ok_or_else(|| {
                BgRemovalError::invalid_input(format!(
                    "Failed to determine cache directory. Set the {CACHE_DIR_ENV} environment variable."
                ))
            })?
            .join("bg-remover")
            .join("models"))
    }

    /// Path of the weight file for `model` (may not exist)
    #[must_use]
    pub fn model_path(&self, model: ModelId) -> PathBuf {
        self.cache_dir.join(model.file_name())
    }

    /// Path of the digest sidecar for `model` (may not exist)
    #[must_use]
    pub fn checksum_path(&self, model: ModelId) -> PathBuf {
        self.cache_dir.join(format!("{}.sha256", model.file_name()))
    }

    /// `true` if a non-empty weight file is present
    #[must_use]
    pub fn is_model_cached(&self, model: ModelId) -> bool {
        fs::metadata(self.model_path(model)).is_ok_and(|meta| meta.is_file() && meta.len() > 0)
    }

    /// Digest recorded for `model` by the downloader
    #[must_use]
    pub fn recorded_checksum(&self, model: ModelId) -> Option<String> {
        fs::read_to_string(self.checksum_path(model))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Return every supported model that is present in the cache
    ///
    /// # Errors
    /// - Failed to read file metadata
    pub fn scan_cached_models(&self) -> Result<Vec<CachedModelInfo>> {
        let mut models = Vec::new();

        for model in ModelId::ALL {
            if !self.is_model_cached(model) {
                continue;
            }
            let path = self.model_path(model);
            let size_bytes = fs::metadata(&path)
                .map_err(|e| BgRemovalError::file_io_error("read metadata of", &path, &e))?
                .len();
            models.push(CachedModelInfo {
                model,
                sha256: self.recorded_checksum(model),
                path,
                size_bytes,
            });
        }

        Ok(models)
    }

    /// Remove one model's weights and sidecar
    ///
    /// Returns `false` when the model was not cached.
    ///
    /// # Errors
    /// - Failed to remove the weight file
    pub fn clear_model(&self, model: ModelId) -> Result<bool> {
        let model_path = self.model_path(model);
        if !model_path.exists() {
            return Ok(false);
        }

        log::info!("Removing cached model: {}", model);
        fs::remove_file(&model_path)
            .map_err(|e| BgRemovalError::file_io_error("remove cached model", &model_path, &e))?;

        let checksum_path = self.checksum_path(model);
        if checksum_path.exists() {
            if let Err(e) = fs::remove_file(&checksum_path) {
                log::warn!("Failed to remove {}: {}", checksum_path.display(), e);
            }
        }

        Ok(true)
    }

    /// Remove every cached model
    ///
    /// # Errors
    /// - Failed to remove a weight file
    pub fn clear_all(&self) -> Result<Vec<ModelId>> {
        let mut removed = Vec::new();
        for model in ModelId::ALL {
            if self.clear_model(model)? {
                removed.push(model);
            }
        }
        Ok(removed)
    }

    /// Get the current cache directory path
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

/// Format file size in human-readable format
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS.get(unit_index).unwrap_or(&"B"))
    } else {
        format!("{:.1} {}", size, UNITS.get(unit_index).unwrap_or(&"B"))
    }
}
