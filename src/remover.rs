//! Bytes-in, bytes-out background removal against one session
//!
//! Decoding, tensor preparation, inference, mask extraction, optional matting and
//! encoding all happen here. Callers decide where the bytes come from and where they go.

use crate::{
    config::RemovalOptions,
    error::Result,
    services::OutputFormatHandler,
    session::Session,
    utils::{matting, ImagePreprocessor},
};
use image::DynamicImage;
use tracing::{instrument, span, Level};

/// Remove the background from an encoded image
///
/// With `only_mask` the result is a single-channel mask; otherwise it is an RGBA cutout.
/// Alpha matting is skipped when a mask is requested.
///
/// # Errors
/// - `InvalidImage` when `input_bytes` does not decode
/// - `Inference` when the session fails or returns an unusable tensor
/// - Encoder failures
#[instrument(
    skip(input_bytes, session, options),
    fields(
        model = %session.model(),
        input_bytes = input_bytes.len(),
        only_mask = options.only_mask,
        alpha_matting = options.alpha_matting
    )
)]
pub fn remove(input_bytes: &[u8], session: &Session, options: &RemovalOptions) -> Result<Vec<u8>> {
    let image = image::load_from_memory(input_bytes)?;
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    let info = session.model().info();

    let input_tensor = {
        let _span = span!(Level::DEBUG, "preprocessing", width, height).entered();
        ImagePreprocessor::preprocess_for_inference(&rgb, &info)
    };

    let output_tensor = {
        let _span = span!(Level::INFO, "inference", backend = session.backend_name()).entered();
        session.run(&input_tensor)?
    };

    let mask = {
        let _span = span!(Level::DEBUG, "postprocessing").entered();
        ImagePreprocessor::postprocess_mask(&output_tensor, &info, width, height)?
    };

    if options.only_mask {
        if options.alpha_matting {
            tracing::debug!("alpha matting skipped for mask-only output");
        }
        return OutputFormatHandler::encode(&DynamicImage::ImageLuma8(mask), options.output_format);
    }

    let alpha = if options.alpha_matting {
        let _span = span!(Level::DEBUG, "alpha_matting").entered();
        matting::refine_alpha(&rgb, &mask, &options.matting)
    } else {
        mask
    };

    let cutout = {
        let _span = span!(Level::DEBUG, "compositing").entered();
        OutputFormatHandler::compose_cutout(&rgb, &alpha)?
    };
    OutputFormatHandler::encode(&DynamicImage::ImageRgba8(cutout), options.output_format)
}
