//! Inference backend implementations
//!
//! - ONNX Runtime backend (CPU, CUDA and `CoreML` execution providers)
//! - Mock backend for unit tests

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(test)]
pub mod test_utils;

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxBackend;
