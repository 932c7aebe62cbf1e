//! Output format handling service
//!
//! Keeps container encoding separate from mask computation.

use crate::{
    config::OutputFormat,
    error::{BgRemovalError, Result},
};
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage, RgbaImage};
use std::io::Cursor;

/// Service for compositing and encoding removal results
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Combine `image` and `alpha` into an RGBA cutout
    ///
    /// Fully transparent pixels have their color cleared.
    ///
    /// # Errors
    /// - `image` and `alpha` dimensions differ
    pub fn compose_cutout(image: &RgbImage, alpha: &GrayImage) -> Result<RgbaImage> {
        if image.dimensions() != alpha.dimensions() {
            return Err(BgRemovalError::internal(format!(
                "Mask dimensions {:?} do not match image dimensions {:?}",
                alpha.dimensions(),
                image.dimensions()
            )));
        }

        let (width, height) = image.dimensions();
        let mut cutout = RgbaImage::new(width, height);
        for ((rgb, a), out) in image
            .pixels()
            .zip(alpha.pixels())
            .zip(cutout.pixels_mut())
        {
            let [r, g, b] = rgb.0;
            let value = a.0[0];
            out.0 = if value == 0 { [0, 0, 0, 0] } else { [r, g, b, value] };
        }
        Ok(cutout)
    }

    /// Encode `image` into the container selected by `format`
    ///
    /// # Errors
    /// - Encoder failure, or WebP requested without the `webp-support` feature
    pub fn encode(image: &DynamicImage, format: OutputFormat) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        image
            .write_to(&mut buffer, Self::image_format(format))
            .map_err(|e| {
                BgRemovalError::internal(format!("Failed to encode {} output: {e}", format))
            })?;
        Ok(buffer.into_inner())
    }

    fn image_format(format: OutputFormat) -> ImageFormat {
        match format {
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::WebP => ImageFormat::WebP,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    #[test]
    fn test_compose_cutout_uses_mask_as_alpha() {
        let image = RgbImage::from_pixel(2, 1, Rgb([10, 20, 30]));
        let alpha = GrayImage::from_raw(2, 1, vec![0, 200]).unwrap();

        let cutout = OutputFormatHandler::compose_cutout(&image, &alpha).unwrap();
        assert_eq!(cutout.get_pixel(0, 0).0, [0, 0, 0, 0]);
        assert_eq!(cutout.get_pixel(1, 0).0, [10, 20, 30, 200]);
    }

    #[test]
    fn test_compose_cutout_rejects_mismatch() {
        let image = RgbImage::new(2, 2);
        let alpha = GrayImage::new(3, 2);
        assert!(OutputFormatHandler::compose_cutout(&image, &alpha).is_err());
    }

    #[test]
    fn test_png_round_trip_keeps_alpha() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 3, image::Rgba([1, 2, 3, 4])));
        let bytes = OutputFormatHandler::encode(&image, OutputFormat::Png).unwrap();

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert!(decoded.color().has_alpha());
        assert_eq!(decoded.to_rgba8().get_pixel(1, 1).0, [1, 2, 3, 4]);
    }

    #[test]
    fn test_mask_encodes_single_channel() {
        let mask = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([9])));
        let bytes = OutputFormatHandler::encode(&mask, OutputFormat::Png).unwrap();

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.color(), image::ColorType::L8);
    }

    #[cfg(feature = "webp-support")]
    #[test]
    fn test_webp_output_is_webp() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, image::Rgba([9, 9, 9, 128])));
        let bytes = OutputFormatHandler::encode(&image, OutputFormat::WebP).unwrap();

        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::WebP);
        assert!(image::load_from_memory(&bytes).unwrap().color().has_alpha());
    }
}
