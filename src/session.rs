//! Sessions and the factory that builds them
//!
//! A [`Session`] is a loaded network bound to one [`ModelId`]. It is shared behind an
//! `Arc` and serializes calls into its backend, so one session can serve many requests
//! without assuming the backend tolerates concurrent use.

use crate::error::{BgRemovalError, Result};
use crate::inference::InferenceBackend;
use crate::models::ModelId;
use async_trait::async_trait;
use ndarray::Array4;
use std::sync::Mutex;

#[cfg(feature = "onnx")]
use crate::{
    backends::OnnxBackend, cache::ModelCache, config::BackendConfig, download::ModelDownloader,
};

/// Reusable inference handle bound to one model's weights
pub struct Session {
    model: ModelId,
    backend_name: &'static str,
    backend: Mutex<Box<dyn InferenceBackend>>,
}

impl Session {
    #[must_use]
    pub fn new(backend: Box<dyn InferenceBackend>) -> Self {
        Self {
            model: backend.model(),
            backend_name: backend.name(),
            backend: Mutex::new(backend),
        }
    }

    /// Model this session was built for
    #[must_use]
    pub fn model(&self) -> ModelId {
        self.model
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    /// Run the network on `input`, waiting for any in-flight call on this session
    ///
    /// # Errors
    /// - Backend inference failure
    /// - A previous call panicked while holding the backend
    pub fn run(&self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let mut backend = self
            .backend
            .lock()
            .map_err(|_| BgRemovalError::internal("Session backend lock poisoned"))?;
        backend.infer(input)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("model", &self.model)
            .field("backend", &self.backend_name)
            .finish_non_exhaustive()
    }
}

/// Builds sessions for a model identifier
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Create a new session for `model`
    ///
    /// # Errors
    /// - `ModelLoad` when the weights cannot be fetched or loaded
    async fn create_session(&self, model: ModelId) -> Result<Session>;
}

/// Factory that downloads weights on first use and loads them into ONNX Runtime
#[cfg(feature = "onnx")]
#[derive(Debug, Clone)]
pub struct OnnxSessionFactory {
    downloader: ModelDownloader,
    backend_config: BackendConfig,
    show_progress: bool,
}

#[cfg(feature = "onnx")]
impl OnnxSessionFactory {
    /// # Errors
    /// - Failed to create the HTTP client used for downloads
    pub fn new(cache: ModelCache, backend_config: BackendConfig) -> Result<Self> {
        Ok(Self {
            downloader: ModelDownloader::new(cache)?,
            backend_config,
            show_progress: false,
        })
    }

    /// Show a download progress bar on first use of a model
    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    #[must_use]
    pub fn cache(&self) -> &ModelCache {
        self.downloader.cache()
    }
}

#[cfg(feature = "onnx")]
#[async_trait]
impl SessionFactory for OnnxSessionFactory {
    async fn create_session(&self, model: ModelId) -> Result<Session> {
        let model_path = self
            .downloader
            .ensure_model(model, self.show_progress)
            .await
            .map_err(|e| BgRemovalError::model_load(format!("{model}: {e}")))?;

        let config = self.backend_config;
        let backend =
            tokio::task::spawn_blocking(move || OnnxBackend::load(&model_path, model, &config))
                .await
                .map_err(|e| BgRemovalError::internal(format!("Model loading task failed: {e}")))??;

        Ok(Session::new(Box::new(backend)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::MockBackend;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    #[test]
    fn test_session_reports_backend_model() {
        let session = Session::new(Box::new(MockBackend::new(ModelId::U2netHumanSeg)));
        assert_eq!(session.model(), ModelId::U2netHumanSeg);
        assert_eq!(session.backend_name(), "mock");
        assert!(format!("{session:?}").contains("U2netHumanSeg"));
    }

    #[test]
    fn test_session_is_shared_across_threads() {
        let (session, calls) = MockBackend::new(ModelId::U2netp).into_session();
        let input = Array4::<f32>::zeros((1, 3, 8, 8));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let session = Arc::clone(&session);
                let input = input.clone();
                std::thread::spawn(move || session.run(&input).map(|out| out.dim()))
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap(), (1, 1, 8, 8));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_inference_failure_is_surfaced() {
        let session = Session::new(Box::new(MockBackend::new_failing_inference(ModelId::U2net)));
        let result = session.run(&Array4::zeros((1, 3, 4, 4)));
        assert!(matches!(result, Err(BgRemovalError::Inference(_))));
    }
}
