//! Shared fakes and fixtures for integration tests
//!
//! Everything here goes through the public traits, so no model weights or ONNX Runtime
//! are needed.

#![allow(dead_code)]

use async_trait::async_trait;
use bg_remover::{BgRemovalError, InferenceBackend, ModelId, OutputKind, Result, Session, SessionFactory};
use image::{DynamicImage, ImageFormat};
use ndarray::Array4;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Backend that marks a centered square as foreground
pub struct SquareBackend {
    model: ModelId,
    infer_calls: Arc<AtomicUsize>,
}

impl InferenceBackend for SquareBackend {
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        self.infer_calls.fetch_add(1, Ordering::SeqCst);
        let (_, _, height, width) = input.dim();
        let classes = match self.model.info().output {
            OutputKind::Saliency => 1,
            OutputKind::MultiClass { classes } => classes,
        };
        Ok(Array4::from_shape_fn((1, classes, height, width), |(_, c, y, x)| {
            let inside = (height / 4..height * 3 / 4).contains(&y) && (width / 4..width * 3 / 4).contains(&x);
            match (classes, c, inside) {
                (1, _, true) => 1.0,
                (1, _, false) => 0.0,
                (_, 0, false) | (_, 1, true) => 5.0,
                _ => -5.0,
            }
        }))
    }

    fn model(&self) -> ModelId {
        self.model
    }

    fn name(&self) -> &'static str {
        "square"
    }
}

/// Factory recording every session it builds
#[derive(Default)]
pub struct FakeFactory {
    pub sessions_created: AtomicUsize,
    pub infer_calls: Arc<AtomicUsize>,
    pub created_models: Mutex<Vec<ModelId>>,
    /// Model whose creation fails with `ModelLoad`
    pub failing_model: Option<ModelId>,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(model: ModelId) -> Self {
        Self {
            failing_model: Some(model),
            ..Self::default()
        }
    }

    pub fn session(&self, model: ModelId) -> Session {
        Session::new(Box::new(SquareBackend {
            model,
            infer_calls: Arc::clone(&self.infer_calls),
        }))
    }

    pub fn sessions_created(&self) -> usize {
        self.sessions_created.load(Ordering::SeqCst)
    }

    pub fn infer_calls(&self) -> usize {
        self.infer_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    async fn create_session(&self, model: ModelId) -> Result<Session> {
        self.sessions_created.fetch_add(1, Ordering::SeqCst);
        if self.failing_model == Some(model) {
            return Err(BgRemovalError::model_load(format!("weights for {model} unavailable")));
        }
        self.created_models.lock().unwrap().push(model);
        Ok(self.session(model))
    }
}

/// Gradient test image encoded in `format`
pub fn encoded_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let image = image::RgbImage::from_fn(width, height, |x, y| {
        let intensity = ((x + y) % 100) as u8;
        image::Rgb([intensity, 128, 255 - intensity])
    });
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut buffer, format)
        .unwrap();
    buffer.into_inner()
}

pub fn png_bytes() -> Vec<u8> {
    encoded_image(40, 30, ImageFormat::Png)
}

pub fn jpeg_bytes() -> Vec<u8> {
    encoded_image(40, 30, ImageFormat::Jpeg)
}

pub fn write_image(path: &Path) {
    let format = ImageFormat::from_path(path).unwrap_or(ImageFormat::Png);
    std::fs::write(path, encoded_image(24, 24, format)).unwrap();
}
