//! recolor-pipeline: Pure colorization and filter pipeline (sans-IO).
//!
//! Turns a photograph into one colorized image per model through:
//! decode -> L* extraction (native + 256x256) -> model inference ->
//! a*/b* upsampling -> Lab to RGB reconstruction.
//!
//! A separate set of stateless filters derives stylistic variants of any
//! image: brighten, sharpen, false color, and tone equalization.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! images and byte slices. Persistence lives in `recolor-store`.

pub mod codec;
pub mod colorize;
pub mod filter;
pub mod lab;
pub mod types;

pub use codec::{INFERENCE_SIZE, Luminance, extract_luminance, reconstruct};
pub use colorize::{ColorizeOutcome, Colorizer, InferenceError, ModelSet, colorize};
pub use filter::{FilterSpec, apply_filter};
pub use types::{
    ChannelOrder, ChrominancePrediction, Dimensions, Image, LuminanceFrame, PipelineError, Plane,
    RgbImage,
};

/// Decode `image_bytes` and colorize them with every model in `models`.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is unrecognized.
/// Returns [`PipelineError::EmptyImage`] if the image has zero area.
pub fn process(image_bytes: &[u8], models: &ModelSet) -> Result<ColorizeOutcome, PipelineError> {
    let source = Image::decode(image_bytes)?;
    colorize(&source, models)
}
