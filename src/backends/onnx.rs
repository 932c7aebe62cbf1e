//! ONNX Runtime backend for the U²-Net family
//!
//! Sessions are built from a weight file on disk with graph optimization level 3 and the
//! execution providers selected in [`BackendConfig`]. Requested accelerators that are not
//! available fall back to CPU with a warning.

use crate::config::{BackendConfig, ExecutionProvider};
use crate::error::{BgRemovalError, Result};
use crate::inference::InferenceBackend;
use crate::models::ModelId;
use ndarray::Array4;
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::path::Path;
use std::time::Instant;

/// ONNX Runtime backend holding one loaded session
#[derive(Debug)]
pub struct OnnxBackend {
    session: Session,
    model: ModelId,
}

impl OnnxBackend {
    /// List ONNX Runtime execution providers with availability status and descriptions
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        let cuda_available =
            OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false);
        let coreml_available =
            OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default())
                .unwrap_or(false);

        vec![
            (
                "CPU".to_string(),
                true,
                "Always available, uses CPU for inference".to_string(),
            ),
            (
                "CUDA".to_string(),
                cuda_available,
                "NVIDIA GPU acceleration (requires CUDA toolkit and compatible GPU)".to_string(),
            ),
            (
                "CoreML".to_string(),
                coreml_available,
                "Apple Silicon GPU acceleration (macOS only)".to_string(),
            ),
        ]
    }

    /// Load the weights at `model_path` into a new ONNX Runtime session
    ///
    /// # Errors
    /// - Weight file missing or not a valid ONNX graph
    /// - Session builder rejected the configuration
    pub fn load(model_path: &Path, model: ModelId, config: &BackendConfig) -> Result<Self> {
        let model_load_start = Instant::now();

        let session_builder = Session::builder()
            .map_err(|e| BgRemovalError::model_load(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                BgRemovalError::model_load(format!("Failed to set optimization level: {e}"))
            })?;

        let providers = Self::select_providers(config.execution_provider);
        let session_builder = if providers.is_empty() {
            session_builder
        } else {
            session_builder
                .with_execution_providers(providers)
                .map_err(|e| {
                    BgRemovalError::model_load(format!("Failed to set execution providers: {e}"))
                })?
        };

        let available = std::thread::available_parallelism()
            .map(std::num::NonZero::get)
            .unwrap_or(4);
        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            available
        };
        let inter_threads = if config.inter_threads > 0 {
            config.inter_threads
        } else {
            (available / 4).max(1)
        };

        let session = session_builder
            .with_intra_threads(intra_threads)
            .map_err(|e| BgRemovalError::model_load(format!("Failed to set intra threads: {e}")))?
            .with_inter_threads(inter_threads)
            .map_err(|e| BgRemovalError::model_load(format!("Failed to set inter threads: {e}")))?
            .commit_from_file(model_path)
            .map_err(|e| {
                BgRemovalError::model_load(format!(
                    "Failed to create session from '{}': {e}",
                    model_path.display()
                ))
            })?;

        log::debug!("ONNX Runtime session created for {}", model);
        log::debug!("  - Requested provider: {}", config.execution_provider);
        log::debug!(
            "  - Threading: {intra_threads} intra-op threads, {inter_threads} inter-op threads"
        );
        log::info!(
            "Model {} loaded in {:.0}ms",
            model,
            model_load_start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(Self { session, model })
    }

    fn select_providers(requested: ExecutionProvider) -> Vec<ExecutionProviderDispatch> {
        let cuda = || {
            let provider = CUDAExecutionProvider::default();
            OrtExecutionProvider::is_available(&provider)
                .unwrap_or(false)
                .then(|| provider.build())
        };
        let coreml = || {
            let provider = CoreMLExecutionProvider::default();
            OrtExecutionProvider::is_available(&provider)
                .unwrap_or(false)
                .then(|| CoreMLExecutionProvider::default().with_subgraphs(true).build())
        };

        match requested {
            ExecutionProvider::Auto => {
                let providers: Vec<_> = [cuda(), coreml()].into_iter().flatten().collect();
                if providers.is_empty() {
                    log::info!("No hardware acceleration available, using CPU");
                } else {
                    log::info!(
                        "Hardware acceleration enabled with {} provider(s)",
                        providers.len()
                    );
                }
                providers
            },
            ExecutionProvider::Cpu => {
                log::info!("Using CPU execution provider");
                Vec::new()
            },
            ExecutionProvider::Cuda => cuda().map_or_else(
                || {
                    log::warn!(
                        "CUDA execution provider requested but not available, falling back to CPU"
                    );
                    Vec::new()
                },
                |provider| vec![provider],
            ),
            ExecutionProvider::CoreMl => coreml().map_or_else(
                || {
                    log::warn!(
                        "CoreML execution provider requested but not available, falling back to CPU"
                    );
                    Vec::new()
                },
                |provider| vec![provider],
            ),
        }
    }
}

impl InferenceBackend for OnnxBackend {
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let inference_start = Instant::now();
        log::debug!("Starting inference with input shape: {:?}", input.dim());

        let input_value = Value::from_array(input.clone()).map_err(|e| {
            BgRemovalError::inference(format!("Failed to convert input tensor: {e}"))
        })?;

        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(|e| BgRemovalError::inference(format!("ONNX inference failed: {e}")))?;

        // U²-Net emits several side outputs; the fused prediction comes first
        let output_tensor = {
            let keys: Vec<_> = outputs.keys().collect();
            let first_key = keys
                .first()
                .ok_or_else(|| BgRemovalError::inference("No output tensors found"))?;
            outputs
                .get(first_key)
                .ok_or_else(|| BgRemovalError::inference("First output tensor not found"))?
                .try_extract_array::<f32>()
                .map_err(|e| {
                    BgRemovalError::inference(format!("Failed to extract output tensor: {e}"))
                })?
        };

        let output_shape = output_tensor.shape().to_vec();
        if output_shape.len() != 4 {
            return Err(BgRemovalError::inference(format!(
                "Expected 4D output tensor, got {}D",
                output_shape.len()
            )));
        }

        let output_data = output_tensor.iter().copied().collect::<Vec<f32>>();
        let result = Array4::from_shape_vec(
            (
                output_shape.first().copied().unwrap_or(1),
                output_shape.get(1).copied().unwrap_or(1),
                output_shape.get(2).copied().unwrap_or(1),
                output_shape.get(3).copied().unwrap_or(1),
            ),
            output_data,
        )
        .map_err(|e| BgRemovalError::inference(format!("Failed to reshape output tensor: {e}")))?;

        log::debug!(
            "Inference complete: {:.2}ms",
            inference_start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(result)
    }

    fn model(&self) -> ModelId {
        self.model
    }

    fn name(&self) -> &'static str {
        "onnx"
    }
}
