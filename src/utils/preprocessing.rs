//! Tensor preparation and mask extraction around the network call

use crate::{
    error::{BgRemovalError, Result},
    models::{ModelInfo, OutputKind},
};
use image::{imageops::FilterType, GrayImage, RgbImage};
use ndarray::{Array4, Axis};

/// Converts images to network input and network output to masks
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Build the NCHW input tensor for `info`
    ///
    /// The image is resized to the square model resolution without preserving aspect ratio,
    /// scaled by its brightest channel value, then normalized per channel.
    #[must_use]
    pub fn preprocess_for_inference(image: &RgbImage, info: &ModelInfo) -> Array4<f32> {
        let size = info.input_size;
        let resized = image::imageops::resize(image, size, size, FilterType::Lanczos3);

        let max_value = resized.as_raw().iter().copied().max().unwrap_or(0).max(1);
        let scale = 1.0 / f32::from(max_value);

        let side = size as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, side, side));

        for (x, y, pixel) in resized.enumerate_pixels() {
            for (c, value) in pixel.0.iter().enumerate() {
                let mean = info.mean.get(c).copied().unwrap_or(0.0);
                let std = info.std.get(c).copied().unwrap_or(1.0);
                if let Some(slot) = tensor.get_mut([0, c, y as usize, x as usize]) {
                    *slot = (f32::from(*value) * scale - mean) / std;
                }
            }
        }

        tensor
    }

    /// Turn the raw network output into an 8-bit mask of `width` x `height`
    ///
    /// # Errors
    /// - Output tensor has no spatial extent or too few class channels
    pub fn postprocess_mask(
        output: &Array4<f32>,
        info: &ModelInfo,
        width: u32,
        height: u32,
    ) -> Result<GrayImage> {
        let (batch, channels, out_height, out_width) = output.dim();
        if batch == 0 || channels == 0 || out_height == 0 || out_width == 0 {
            return Err(BgRemovalError::inference(format!(
                "Unexpected output tensor shape: {:?}",
                output.dim()
            )));
        }

        let sample = output.index_axis(Axis(0), 0);
        let foreground: Vec<f32> = match info.output {
            OutputKind::Saliency => {
                let prediction = sample.index_axis(Axis(0), 0);
                let (min, max) = prediction
                    .iter()
                    .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                        (lo.min(v), hi.max(v))
                    });
                let range = max - min;
                if range > f32::EPSILON {
                    prediction.iter().map(|&v| (v - min) / range).collect()
                } else {
                    vec![0.0; out_height * out_width]
                }
            },
            OutputKind::MultiClass { classes } => {
                if channels < classes {
                    return Err(BgRemovalError::inference(format!(
                        "Expected {classes} class channels, got {channels}"
                    )));
                }
                let mut probabilities = Vec::with_capacity(out_height * out_width);
                let mut logits = Vec::with_capacity(classes);
                for y in 0..out_height {
                    for x in 0..out_width {
                        logits.clear();
                        logits.extend(
                            (0..classes).map(|c| sample.get([c, y, x]).copied().unwrap_or(0.0)),
                        );
                        let peak = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                        let total: f32 = logits.iter().map(|v| (v - peak).exp()).sum();
                        let background = logits.first().map_or(1.0, |v| (v - peak).exp() / total);
                        probabilities.push(1.0 - background);
                    }
                }
                probabilities
            },
        };

        let raw: Vec<u8> = foreground
            .iter()
            .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect();
        let mask = GrayImage::from_raw(out_width as u32, out_height as u32, raw)
            .ok_or_else(|| BgRemovalError::internal("Mask buffer size mismatch"))?;

        if mask.dimensions() == (width, height) {
            Ok(mask)
        } else {
            Ok(image::imageops::resize(
                &mask,
                width,
                height,
                FilterType::Lanczos3,
            ))
        }
    }
}
