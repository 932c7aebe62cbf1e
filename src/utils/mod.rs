//! Image utilities used around model inference

pub mod matting;
pub mod preprocessing;

pub use preprocessing::ImagePreprocessor;
