//! Alpha matting refinement of a coarse segmentation mask
//!
//! The mask is split into a trimap: eroded certain foreground, eroded certain background,
//! and an unknown band in between. The unknown band is recomputed with a guided filter
//! that uses the grayscale image as guide, which makes mask edges follow image edges.
//! Box sums are taken from integral images so every pass is linear in the pixel count.

use crate::config::AlphaMattingConfig;
use image::{GrayImage, Luma, RgbImage};

const TRIMAP_FOREGROUND: u8 = 255;
const TRIMAP_BACKGROUND: u8 = 0;
const TRIMAP_UNKNOWN: u8 = 128;

/// Regularization of the guided filter; larger values smooth more across edges
const GUIDED_FILTER_EPS: f64 = 1e-3;
const MIN_FILTER_RADIUS: usize = 4;

/// Build a trimap from `mask`: 255 certain foreground, 0 certain background, 128 unknown
#[must_use]
pub fn build_trimap(mask: &GrayImage, config: &AlphaMattingConfig) -> GrayImage {
    let (width, height) = mask.dimensions();
    let (w, h) = (width as usize, height as usize);

    let foreground: Vec<bool> = mask
        .pixels()
        .map(|p| p.0[0] > config.foreground_threshold)
        .collect();
    let background: Vec<bool> = mask
        .pixels()
        .map(|p| p.0[0] < config.background_threshold)
        .collect();

    let radius = (config.erode_size / 2) as usize;
    let foreground = erode(&foreground, w, h, radius);
    let background = erode(&background, w, h, radius);

    let mut trimap = GrayImage::from_pixel(width, height, Luma([TRIMAP_UNKNOWN]));
    for (index, pixel) in trimap.pixels_mut().enumerate() {
        if foreground.get(index).copied().unwrap_or(false) {
            *pixel = Luma([TRIMAP_FOREGROUND]);
        } else if background.get(index).copied().unwrap_or(false) {
            *pixel = Luma([TRIMAP_BACKGROUND]);
        }
    }
    trimap
}

/// Refine `mask` against `image` and return the new alpha matte
///
/// `image` and `mask` must have the same dimensions; otherwise the mask is returned as is.
#[must_use]
pub fn refine_alpha(image: &RgbImage, mask: &GrayImage, config: &AlphaMattingConfig) -> GrayImage {
    if image.dimensions() != mask.dimensions() {
        tracing::warn!("alpha matting skipped: image and mask dimensions differ");
        return mask.clone();
    }

    let (width, height) = mask.dimensions();
    let (w, h) = (width as usize, height as usize);
    let trimap = build_trimap(mask, config);

    if trimap.pixels().all(|p| p.0[0] != TRIMAP_UNKNOWN) {
        return trimap;
    }

    let guide: Vec<f64> = image
        .pixels()
        .map(|p| {
            let [r, g, b] = p.0;
            (0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b)) / 255.0
        })
        .collect();
    let coarse: Vec<f64> = mask.pixels().map(|p| f64::from(p.0[0]) / 255.0).collect();

    let radius = (config.erode_size as usize).max(MIN_FILTER_RADIUS);
    let refined = guided_filter(&guide, &coarse, w, h, radius, GUIDED_FILTER_EPS);

    let mut alpha = trimap;
    for (index, pixel) in alpha.pixels_mut().enumerate() {
        if pixel.0[0] == TRIMAP_UNKNOWN {
            let value = refined.get(index).copied().unwrap_or(0.0);
            *pixel = Luma([(value.clamp(0.0, 1.0) * 255.0).round() as u8]);
        }
    }
    alpha
}

/// Binary erosion with a square window of side `2 * radius + 1`, borders treated as unset
fn erode(set: &[bool], width: usize, height: usize, radius: usize) -> Vec<bool> {
    if radius == 0 {
        return set.to_vec();
    }
    let values: Vec<f64> = set.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect();
    let integral = IntegralImage::new(&values, width, height);
    let full = ((2 * radius + 1) * (2 * radius + 1)) as f64;

    (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .map(|(x, y)| {
            let window_inside = x >= radius
                && y >= radius
                && x + radius < width
                && y + radius < height;
            window_inside && (integral.window_sum(x, y, radius).0 - full).abs() < 0.5
        })
        .collect()
}

/// Edge-preserving filter of `input` steered by `guide`
fn guided_filter(
    guide: &[f64],
    input: &[f64],
    width: usize,
    height: usize,
    radius: usize,
    eps: f64,
) -> Vec<f64> {
    let mean = |values: &[f64]| box_mean(values, width, height, radius);

    let guide_sq: Vec<f64> = guide.iter().map(|v| v * v).collect();
    let guide_input: Vec<f64> = guide.iter().zip(input).map(|(g, p)| g * p).collect();

    let mean_guide = mean(guide);
    let mean_input = mean(input);
    let corr_guide = mean(&guide_sq);
    let corr_guide_input = mean(&guide_input);

    let mut a = Vec::with_capacity(guide.len());
    let mut b = Vec::with_capacity(guide.len());
    for i in 0..guide.len() {
        let mg = mean_guide.get(i).copied().unwrap_or(0.0);
        let mp = mean_input.get(i).copied().unwrap_or(0.0);
        let variance = corr_guide.get(i).copied().unwrap_or(0.0) - mg * mg;
        let covariance = corr_guide_input.get(i).copied().unwrap_or(0.0) - mg * mp;
        let ai = covariance / (variance + eps);
        a.push(ai);
        b.push(mp - ai * mg);
    }

    let mean_a = mean(&a);
    let mean_b = mean(&b);

    guide
        .iter()
        .enumerate()
        .map(|(i, g)| {
            mean_a.get(i).copied().unwrap_or(0.0) * g + mean_b.get(i).copied().unwrap_or(0.0)
        })
        .collect()
}

/// Mean over a square window clipped to the image
fn box_mean(values: &[f64], width: usize, height: usize, radius: usize) -> Vec<f64> {
    let integral = IntegralImage::new(values, width, height);
    (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .map(|(x, y)| {
            let (sum, count) = integral.window_sum(x, y, radius);
            if count == 0 {
                0.0
            } else {
                sum / count as f64
            }
        })
        .collect()
}

/// Summed-area table with a zero row and column prepended
struct IntegralImage {
    sums: Vec<f64>,
    width: usize,
    height: usize,
}

impl IntegralImage {
    fn new(values: &[f64], width: usize, height: usize) -> Self {
        let stride = width + 1;
        let mut sums = vec![0.0; stride * (height + 1)];
        for y in 0..height {
            let mut row_sum = 0.0;
            for x in 0..width {
                row_sum += values.get(y * width + x).copied().unwrap_or(0.0);
                let above = sums.get(y * stride + x + 1).copied().unwrap_or(0.0);
                if let Some(slot) = sums.get_mut((y + 1) * stride + x + 1) {
                    *slot = above + row_sum;
                }
            }
        }
        Self {
            sums,
            width,
            height,
        }
    }

    fn at(&self, x: usize, y: usize) -> f64 {
        self.sums
            .get(y * (self.width + 1) + x)
            .copied()
            .unwrap_or(0.0)
    }

    /// Sum and pixel count of the window centered on (x, y), clipped to the image
    fn window_sum(&self, x: usize, y: usize, radius: usize) -> (f64, usize) {
        let x0 = x.saturating_sub(radius);
        let y0 = y.saturating_sub(radius);
        let x1 = (x + radius + 1).min(self.width);
        let y1 = (y + radius + 1).min(self.height);
        let sum = self.at(x1, y1) - self.at(x0, y1) - self.at(x1, y0) + self.at(x0, y0);
        (sum, (x1 - x0) * (y1 - y0))
    }
}
