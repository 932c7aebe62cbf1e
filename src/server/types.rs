use crate::{config::ServerConfig, models::ModelId, session_cache::SessionCache};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared state handed to every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub sessions: Arc<SessionCache>,
    pub config: Arc<ServerConfig>,
    /// Directory for per-request temporary files; the system default when unset
    pub temp_dir: Option<PathBuf>,
}

impl AppState {
    #[must_use]
    pub fn new(sessions: Arc<SessionCache>, config: ServerConfig) -> Self {
        Self {
            sessions,
            config: Arc::new(config),
            temp_dir: None,
        }
    }

    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }
}

/// `GET /`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
    pub endpoints: BTreeMap<String, String>,
}

/// One entry of `GET /models`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    pub description: String,
}

impl From<ModelId> for ModelEntry {
    fn from(model: ModelId) -> Self {
        Self {
            name: model.as_str().to_string(),
            description: model.description().to_string(),
        }
    }
}

/// `GET /models`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelEntry>,
}

/// Per-file result of `POST /remove-batch`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchItem {
    pub filename: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchItem {
    #[must_use]
    pub fn succeeded(filename: String, output_size: u64) -> Self {
        Self {
            filename,
            success: true,
            output_size: Some(output_size),
            error: None,
        }
    }

    #[must_use]
    pub fn failed(filename: String, error: impl Into<String>) -> Self {
        Self {
            filename,
            success: false,
            output_size: None,
            error: Some(error.into()),
        }
    }
}

/// `POST /remove-batch`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<BatchItem>,
}

impl From<Vec<BatchItem>> for BatchResponse {
    fn from(results: Vec<BatchItem>) -> Self {
        let successful = results.iter().filter(|r| r.success).count();
        Self {
            processed: results.len(),
            successful,
            failed: results.len() - successful,
            results,
        }
    }
}

/// Error body shared by every failing endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}
