//! sRGB <-> CIE L*a*b* conversion (D65 white point).
//!
//! L* is in `0.0..=100.0`; a* and b* are roughly `-128.0..=128.0`.
//! Conversion back to sRGB clamps out-of-gamut results to `0..=255`.

use image::Rgb;
use palette::white_point::D65;
use palette::{FromColor, IntoColor, LinSrgb, Srgb};

/// A single L*a*b* color: `l` is lightness, `a` the green-red axis,
/// `b` the blue-yellow axis.
pub type Lab = palette::Lab<D65, f32>;

/// Convert an 8-bit sRGB pixel to Lab.
#[must_use]
pub fn srgb_to_lab(pixel: Rgb<u8>) -> Lab {
    let [r, g, b] = pixel.0;
    let linear: LinSrgb<f32> = Srgb::new(r, g, b).into_format::<f32>().into_linear();
    Lab::from_color(linear)
}

/// Convert Lab to an 8-bit sRGB pixel, clamping out-of-gamut values.
#[must_use]
pub fn lab_to_srgb(lab: Lab) -> Rgb<u8> {
    let linear: LinSrgb<f32> = lab.into_color();
    let srgb = Srgb::<f32>::from_linear(linear);
    Rgb([srgb.red, srgb.green, srgb.blue].map(to_u8))
}

#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_u8(c: f32) -> u8 {
    // NaN clamps to NaN and casts to 0.
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}
