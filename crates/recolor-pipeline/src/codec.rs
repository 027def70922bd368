//! Channel codec: split an image into L* planes and rebuild a color
//! image from L* plus predicted a*/b*.
//!
//! Colorization models see lightness at a fixed [`INFERENCE_SIZE`]
//! square. The native-resolution lightness plane is kept alongside it so
//! the reconstructed image always has the source's exact size; only the
//! predicted chrominance is resampled.

use image::imageops::{self, FilterType};
use image::Luma;

use crate::lab::{self, Lab};
use crate::types::{
    ChannelOrder, ChrominancePrediction, Image, LuminanceFrame, PipelineError, Plane, RgbImage,
};

/// Side length of the square lightness frame fed to models.
pub const INFERENCE_SIZE: u32 = 256;

/// Lightness range of L*.
const L_RANGE: (f32, f32) = (0.0, 100.0);

/// Range used to carry a*/b* through the resampler.
const AB_RANGE: (f32, f32) = (-128.0, 128.0);

/// Lightness planes extracted from one source image.
///
/// Both frames come from the same conversion, so they are registered
/// pixel-for-pixel up to the resize.
#[derive(Debug, Clone, PartialEq)]
pub struct Luminance {
    /// L* at the source's resolution.
    pub native: LuminanceFrame,
    /// L* resized to `INFERENCE_SIZE` x `INFERENCE_SIZE`.
    pub inference: LuminanceFrame,
}

/// Convert `image` to L* at native resolution and at [`INFERENCE_SIZE`].
///
/// The inference frame is a bilinear resize of the native L* plane.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyImage`] if the image has zero area.
pub fn extract_luminance(image: &Image) -> Result<Luminance, PipelineError> {
    image.ensure_not_empty()?;

    let rgb = image.to_rgb();
    let native = Plane::from_fn(rgb.width(), rgb.height(), |x, y| {
        Luma([lab::srgb_to_lab(*rgb.get_pixel(x, y)).l])
    });
    let inference = resample(&native, INFERENCE_SIZE, INFERENCE_SIZE, L_RANGE);

    Ok(Luminance {
        native: LuminanceFrame::new(native),
        inference: LuminanceFrame::new(inference),
    })
}

/// Rebuild a color image from native L* and predicted a*/b*.
///
/// The chrominance planes are bilinearly upsampled to the native frame's
/// size, merged with the native L*, and converted to RGB. The output
/// always has exactly the native frame's dimensions.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyImage`] if either input has zero area.
pub fn reconstruct(
    native: &LuminanceFrame,
    chrominance: &ChrominancePrediction,
) -> Result<Image, PipelineError> {
    let dimensions = native.dimensions();
    if dimensions.is_empty() {
        return Err(PipelineError::EmptyImage { dimensions });
    }
    let predicted = chrominance.dimensions();
    if predicted.is_empty() {
        return Err(PipelineError::EmptyImage {
            dimensions: predicted,
        });
    }

    let a = resample(chrominance.a(), dimensions.width, dimensions.height, AB_RANGE);
    let b = resample(chrominance.b(), dimensions.width, dimensions.height, AB_RANGE);
    let l = native.plane();

    let pixels = RgbImage::from_fn(dimensions.width, dimensions.height, |x, y| {
        lab::lab_to_srgb(Lab::new(
            l.get_pixel(x, y).0[0],
            a.get_pixel(x, y).0[0],
            b.get_pixel(x, y).0[0],
        ))
    });

    Ok(Image::from_rgb(pixels))
}

/// Convert an RGB image to per-pixel Lab.
pub(crate) fn to_lab(image: &Image) -> Vec<Lab> {
    let rgb = image.to_rgb();
    rgb.pixels().map(|p| lab::srgb_to_lab(*p)).collect()
}

/// Convert per-pixel Lab back to an image in `order`.
pub(crate) fn from_lab(width: u32, height: u32, lab: &[Lab], order: ChannelOrder) -> Image {
    let mut pixels = RgbImage::new(width, height);
    for (pixel, &value) in pixels.pixels_mut().zip(lab) {
        *pixel = lab::lab_to_srgb(value);
    }
    Image::from_rgb(pixels).into_order(order)
}

/// Bilinear resize of a float plane holding values in `range`.
///
/// `image` clamps float samples to `[0, 1]` while resampling, so the
/// plane is mapped into the unit interval and back.
fn resample(plane: &Plane, width: u32, height: u32, range: (f32, f32)) -> Plane {
    if plane.dimensions() == (width, height) {
        return plane.clone();
    }

    let (lo, hi) = range;
    let span = hi - lo;
    let mut unit = plane.clone();
    for pixel in unit.pixels_mut() {
        pixel.0[0] = ((pixel.0[0] - lo) / span).clamp(0.0, 1.0);
    }

    let mut resized = imageops::resize(&unit, width, height, FilterType::Triangle);
    for pixel in resized.pixels_mut() {
        pixel.0[0] = pixel.0[0].mul_add(span, lo);
    }
    resized
}
