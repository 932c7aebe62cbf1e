//! Inference backend abstraction

use crate::{error::Result, models::ModelId};
use ndarray::Array4;

/// A loaded network that maps an NCHW input tensor to its raw output tensor
///
/// Implementations are constructed fully loaded by a [`crate::session::SessionFactory`];
/// there is no separate initialization step.
pub trait InferenceBackend: Send {
    /// Run inference on the input tensor
    ///
    /// # Errors
    /// - Model inference failures
    /// - Tensor conversion errors
    /// - Invalid input tensor dimensions
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Model whose weights this backend holds
    fn model(&self) -> ModelId;

    /// Short backend name for diagnostics
    fn name(&self) -> &'static str;
}
