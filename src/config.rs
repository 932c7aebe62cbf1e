//! Configuration types for background removal

use crate::error::{BgRemovalError, Result};
use crate::models::ModelId;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon acceleration
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

impl FromStr for ExecutionProvider {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            "coreml" => Ok(Self::CoreMl),
            other => Err(BgRemovalError::invalid_input(format!(
                "Unknown execution provider: {other} (expected auto, cpu, cuda or coreml)"
            ))),
        }
    }
}

/// Output container format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// PNG with alpha channel transparency
    #[default]
    Png,
    /// Lossless WebP with alpha channel transparency
    WebP,
}

impl OutputFormat {
    /// File extension without the leading dot
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::WebP => "webp",
        }
    }

    /// MIME type used for HTTP responses
    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::WebP => "image/webp",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Parses the exact lowercase names accepted by the HTTP surface
impl FromStr for OutputFormat {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::WebP),
            _ => Err(BgRemovalError::invalid_input(
                "Output format must be png or webp",
            )),
        }
    }
}

/// Trimap and refinement parameters for alpha matting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlphaMattingConfig {
    /// Mask values above this are treated as certain foreground
    pub foreground_threshold: u8,
    /// Mask values below this are treated as certain background
    pub background_threshold: u8,
    /// Side of the square structuring element used to erode both certain regions
    pub erode_size: u32,
}

impl Default for AlphaMattingConfig {
    fn default() -> Self {
        Self {
            foreground_threshold: 240,
            background_threshold: 10,
            erode_size: 10,
        }
    }
}

/// Flags for a single removal request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemovalOptions {
    /// Refine mask edges before compositing
    pub alpha_matting: bool,
    /// Emit the single-channel mask instead of the cutout
    pub only_mask: bool,
    /// Container format of the produced bytes
    pub output_format: OutputFormat,
    /// Parameters used when `alpha_matting` is set
    #[serde(default)]
    pub matting: AlphaMattingConfig,
}

impl RemovalOptions {
    /// Create a new options builder
    #[must_use]
    pub fn builder() -> RemovalOptionsBuilder {
        RemovalOptionsBuilder::default()
    }
}

/// Builder for `RemovalOptions`
#[derive(Debug, Default)]
pub struct RemovalOptionsBuilder {
    options: RemovalOptions,
}

impl RemovalOptionsBuilder {
    /// Enable or disable alpha matting
    #[must_use]
    pub fn alpha_matting(mut self, enabled: bool) -> Self {
        self.options.alpha_matting = enabled;
        self
    }

    /// Enable or disable mask-only output
    #[must_use]
    pub fn only_mask(mut self, enabled: bool) -> Self {
        self.options.only_mask = enabled;
        self
    }

    /// Set output format
    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.options.output_format = format;
        self
    }

    /// Set alpha matting parameters
    #[must_use]
    pub fn matting(mut self, matting: AlphaMattingConfig) -> Self {
        self.options.matting = matting;
        self
    }

    /// Validate and build the options
    ///
    /// # Errors
    /// - Background threshold not below the foreground threshold
    pub fn build(self) -> Result<RemovalOptions> {
        let matting = self.options.matting;
        if matting.background_threshold >= matting.foreground_threshold {
            return Err(BgRemovalError::invalid_input(format!(
                "Alpha matting background threshold ({}) must be below foreground threshold ({})",
                matting.background_threshold, matting.foreground_threshold
            )));
        }
        Ok(self.options)
    }
}

/// ONNX Runtime session parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Execution provider for ONNX Runtime
    pub execution_provider: ExecutionProvider,
    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,
    /// Number of inter-op threads for inference (0 = auto)
    pub inter_threads: usize,
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// Model loaded at startup and used when a request names no other
    pub default_model: ModelId,
    /// Upper bound on files accepted by `/remove-batch`
    pub max_batch_files: usize,
    /// Non-default sessions kept alive across requests (0 = build per request)
    pub session_cache_capacity: usize,
    /// Request body limit in bytes
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            default_model: ModelId::default(),
            max_batch_files: 10,
            session_cache_capacity: 2,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Socket address string for `TcpListener::bind`
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    /// - Zero batch size or zero upload limit
    pub fn validate(&self) -> Result<()> {
        if self.max_batch_files == 0 {
            return Err(BgRemovalError::invalid_input(
                "max_batch_files must be at least 1",
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(BgRemovalError::invalid_input(
                "max_upload_bytes must be at least 1",
            ));
        }
        Ok(())
    }
}
