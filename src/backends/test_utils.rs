//! Mock backends for unit tests that run without model weights or ONNX Runtime

use crate::{
    error::{BgRemovalError, Result},
    inference::InferenceBackend,
    models::{ModelId, OutputKind},
    session::Session,
};
use ndarray::Array4;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Mock backend producing a centered disc as foreground
#[derive(Debug, Clone)]
pub struct MockBackend {
    model: ModelId,
    /// Number of `infer` calls, shared with clones for assertions
    calls: Arc<AtomicUsize>,
    should_fail_inference: bool,
}

impl MockBackend {
    #[must_use]
    pub fn new(model: ModelId) -> Self {
        Self {
            model,
            calls: Arc::new(AtomicUsize::new(0)),
            should_fail_inference: false,
        }
    }

    /// Create a mock backend that will fail during inference
    #[must_use]
    pub fn new_failing_inference(model: ModelId) -> Self {
        Self {
            should_fail_inference: true,
            ..Self::new(model)
        }
    }

    /// Shared counter of inference calls
    #[must_use]
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    /// Wrap the backend into a session, returning the call counter alongside
    #[must_use]
    pub fn into_session(self) -> (Arc<Session>, Arc<AtomicUsize>) {
        let calls = self.call_counter();
        (Arc::new(Session::new(Box::new(self))), calls)
    }
}

impl InferenceBackend for MockBackend {
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail_inference {
            return Err(BgRemovalError::inference("Mock inference failure"));
        }

        let (_, channels, height, width) = input.dim();
        if channels != 3 {
            return Err(BgRemovalError::inference(format!(
                "Expected 3 input channels, got {channels}"
            )));
        }

        let classes = match self.model.info().output {
            OutputKind::Saliency => 1,
            OutputKind::MultiClass { classes } => classes,
        };

        let center_y = height as f32 / 2.0;
        let center_x = width as f32 / 2.0;
        let radius = height.min(width) as f32 / 3.0;

        let output = Array4::from_shape_fn((1, classes, height, width), |(_, c, y, x)| {
            let dy = y as f32 - center_y;
            let dx = x as f32 - center_x;
            let inside = (dy * dy + dx * dx).sqrt() < radius;
            match (classes, c, inside) {
                (1, _, true) => 0.9,
                (1, _, false) => 0.1,
                // Multi-class logits: background dominates outside, class 1 inside
                (_, 0, true) => -4.0,
                (_, 0, false) | (_, 1, true) => 4.0,
                _ => -4.0,
            }
        });

        Ok(output)
    }

    fn model(&self) -> ModelId {
        self.model
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
