//! Stylistic filters applied to an already-produced image.
//!
//! Every filter is a pure function of its input: same image in, same
//! image out, no hidden state. Output dimensions always match the input
//! and the input's channel order is preserved.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use image::{GrayImage, Luma, Rgb};
use imageproc::filter::filter_clamped;
use imageproc::kernel::Kernel;
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::lab::{self, Lab};
use crate::types::{ChannelOrder, Image, PipelineError, RgbImage};

/// Gain applied by [`FilterSpec::Brighten`].
pub const BRIGHTEN_ALPHA: f32 = 1.2;

/// Offset applied by [`FilterSpec::Brighten`].
pub const BRIGHTEN_BETA: f32 = 30.0;

/// 3x3 kernel applied by [`FilterSpec::Sharpen`], row-major.
pub const SHARPEN_KERNEL: [i32; 9] = [0, -1, 0, -1, 5, -1, 0, -1, 0];

/// How far tone equalization may move a pixel's a*/b*, measured after
/// conversion back to 8-bit sRGB.
pub const CHROMA_TOLERANCE: f32 = 1.0;

/// The closed set of supported filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterSpec {
    /// Linear gain and offset: `clamp(1.2 * v + 30, 0, 255)` per channel.
    Brighten,
    /// 3x3 sharpening convolution with replicated borders.
    Sharpen,
    /// Map intensity onto a jet (blue-cyan-yellow-red) color ramp.
    FalseColor,
    /// Histogram-equalize L* while keeping each pixel's a*/b*.
    ToneEqualize,
}

impl FilterSpec {
    /// All filters, in a stable order.
    pub const ALL: [Self; 4] = [
        Self::Brighten,
        Self::Sharpen,
        Self::FalseColor,
        Self::ToneEqualize,
    ];

    /// Canonical name, also used as the artifact stage tag.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Brighten => "brighten",
            Self::Sharpen => "sharpen",
            Self::FalseColor => "false-color",
            Self::ToneEqualize => "tone-equalize",
        }
    }

    /// Older names accepted for compatibility with existing clients.
    #[must_use]
    pub const fn legacy_name(self) -> &'static str {
        match self {
            Self::Brighten => "light",
            Self::Sharpen => "effect",
            Self::FalseColor => "magic",
            Self::ToneEqualize => "color_toning",
        }
    }

    /// Apply this filter to `image`.
    #[must_use = "returns the filtered image"]
    pub fn apply(self, image: &Image) -> Image {
        match self {
            Self::Brighten => brighten(image),
            Self::Sharpen => sharpen(image),
            Self::FalseColor => false_color(image),
            Self::ToneEqualize => tone_equalize(image),
        }
    }
}

impl fmt::Display for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FilterSpec {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|spec| {
                s.eq_ignore_ascii_case(spec.name())
                    || s.eq_ignore_ascii_case(spec.legacy_name())
                    || s.replace('_', "-").eq_ignore_ascii_case(spec.name())
                    || s.eq_ignore_ascii_case(&spec.name().replace('-', ""))
            })
            .ok_or_else(|| PipelineError::UnknownFilter(s.to_owned()))
    }
}

/// Apply the filter named `name` to `image`.
///
/// # Errors
///
/// Returns [`PipelineError::UnknownFilter`] if `name` is not a
/// supported filter.
pub fn apply_filter(image: &Image, name: &str) -> Result<Image, PipelineError> {
    let spec: FilterSpec = name.parse()?;
    Ok(spec.apply(image))
}

/// `saturate(round(|alpha * v + beta|))` on every channel.
#[must_use = "returns the brightened image"]
pub fn brighten(image: &Image) -> Image {
    let lut: [u8; 256] = std::array::from_fn(|v| {
        #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
        let scaled = BRIGHTEN_ALPHA.mul_add(v as f32, BRIGHTEN_BETA).abs().round();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let out = scaled.min(255.0) as u8;
        out
    });

    map_channels(image, |v| lut[usize::from(v)])
}

/// Convolve each channel with [`SHARPEN_KERNEL`].
///
/// Pixels outside the image take the value of the nearest edge pixel
/// (replicate border), so edges are sharpened without a dark frame.
#[must_use = "returns the sharpened image"]
pub fn sharpen(image: &Image) -> Image {
    let src = image.pixels();
    if src.width() == 0 || src.height() == 0 {
        return image.clone();
    }
    let out: RgbImage = filter_clamped(src, Kernel::new(&SHARPEN_KERNEL, 3, 3));
    tagged(out, image.order())
}

/// 256-entry jet ramp: dark blue, blue, cyan, yellow, red, dark red.
static JET: LazyLock<[Rgb<u8>; 256]> = LazyLock::new(|| {
    std::array::from_fn(|i| {
        #[allow(clippy::cast_precision_loss)]
        let t = i as f32 / 255.0;
        let ramp = |center: f32| {
            let v = 4.0f32.mul_add(-t, center).abs();
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let out = ((1.5 - v).clamp(0.0, 1.0) * 255.0).round() as u8;
            out
        };
        Rgb([ramp(3.0), ramp(2.0), ramp(1.0)])
    })
});

/// Replace every pixel with the jet color of its intensity.
///
/// Intensity is the Rec. 601 luma of the pixel.
#[must_use = "returns the false-color image"]
pub fn false_color(image: &Image) -> Image {
    let gray = intensity(image);
    let out = RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        JET[usize::from(gray.get_pixel(x, y).0[0])]
    });
    Image::from_rgb(out).into_order(image.order())
}

/// Equalize the L* histogram, keeping each pixel's a*/b*.
///
/// Where the equalized lightness would push a color out of the sRGB
/// gamut, that pixel's L* moves only as far as its a*/b* survive the
/// conversion back to 8-bit within [`CHROMA_TOLERANCE`].
#[must_use = "returns the tone-equalized image"]
pub fn tone_equalize(image: &Image) -> Image {
    let (w, h) = (image.width(), image.height());
    if w == 0 || h == 0 {
        return image.clone();
    }

    let mut lab = codec::to_lab(image);
    equalize_lightness(&mut lab, w, h);
    codec::from_lab(w, h, &lab, image.order())
}

/// Histogram-equalize the L* of `lab` in place.
///
/// L* is quantized to 8 bits for the histogram; a* and b* are not
/// written.
fn equalize_lightness(lab: &mut [Lab], width: u32, height: u32) {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let quantized: Vec<u8> = lab
        .iter()
        .map(|p| (p.l * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8)
        .collect();
    let Some(lightness) = GrayImage::from_raw(width, height, quantized) else {
        return;
    };

    let equalized = imageproc::contrast::equalize_histogram(&lightness);
    for (p, &Luma([l])) in lab.iter_mut().zip(equalized.pixels()) {
        p.l = settle_lightness(*p, f32::from(l) * 100.0 / 255.0);
    }
}

/// The L* closest to `target` (between `original.l` and `target`) at
/// which `original`'s a*/b* still round-trip through 8-bit sRGB.
fn settle_lightness(original: Lab, target: f32) -> f32 {
    let fits = |l: f32| {
        let back = lab::srgb_to_lab(lab::lab_to_srgb(Lab::new(l, original.a, original.b)));
        (back.a - original.a).abs() <= CHROMA_TOLERANCE
            && (back.b - original.b).abs() <= CHROMA_TOLERANCE
    };
    if fits(target) {
        return target;
    }

    // `original` came from an 8-bit pixel, so its own L* fits.
    let (mut ok, mut bad) = (original.l, target);
    for _ in 0..16 {
        let mid = (ok + bad) / 2.0;
        if fits(mid) {
            ok = mid;
        } else {
            bad = mid;
        }
    }
    ok
}

/// Rec. 601 luma of each pixel, respecting the channel order.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn intensity(image: &Image) -> GrayImage {
    let rgb = image.to_rgb();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let luma = 0.299f32.mul_add(
            f32::from(r),
            0.587f32.mul_add(f32::from(g), 0.114 * f32::from(b)),
        );
        Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}

/// Apply `f` to every channel value. Channel order is irrelevant.
fn map_channels(image: &Image, f: impl Fn(u8) -> u8) -> Image {
    let mut pixels = image.pixels().clone();
    for v in pixels.iter_mut() {
        *v = f(*v);
    }
    tagged(pixels, image.order())
}

/// Wrap `pixels` that are already stored in `order`.
const fn tagged(pixels: RgbImage, order: ChannelOrder) -> Image {
    match order {
        ChannelOrder::Rgb => Image::from_rgb(pixels),
        ChannelOrder::Bgr => Image::from_bgr(pixels),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{Dimensions, rgb};

    fn uniform(v: [u8; 3]) -> Image {
        Image::from_rgb(RgbImage::from_pixel(6, 4, Rgb(v)))
    }

    fn varied(width: u32, height: u32) -> Image {
        Image::from_rgb(RgbImage::from_fn(width, height, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            let v = ((x * 7 + y * 13) % 200) as u8;
            rgb(v + 20, v / 2 + 40, 180 - v / 2)
        }))
    }

    // ─────── parsing ────────────────────────────────────────────

    #[test]
    fn parses_canonical_names() {
        for spec in FilterSpec::ALL {
            assert_eq!(spec.name().parse::<FilterSpec>().unwrap(), spec);
        }
    }

    #[test]
    fn parses_legacy_and_variant_spellings() {
        assert_eq!("light".parse::<FilterSpec>().unwrap(), FilterSpec::Brighten);
        assert_eq!("effect".parse::<FilterSpec>().unwrap(), FilterSpec::Sharpen);
        assert_eq!("magic".parse::<FilterSpec>().unwrap(), FilterSpec::FalseColor);
        assert_eq!(
            "color_toning".parse::<FilterSpec>().unwrap(),
            FilterSpec::ToneEqualize
        );
        assert_eq!("falseColor".parse::<FilterSpec>().unwrap(), FilterSpec::FalseColor);
        assert_eq!(
            "tone_equalize".parse::<FilterSpec>().unwrap(),
            FilterSpec::ToneEqualize
        );
    }

    #[test]
    fn unknown_name_is_rejected() {
        let result = apply_filter(&uniform([1, 2, 3]), "vignette");
        assert!(matches!(result, Err(PipelineError::UnknownFilter(name)) if name == "vignette"));
    }

    #[test]
    fn serde_uses_canonical_names() {
        let json = serde_json::to_string(&FilterSpec::ToneEqualize).unwrap();
        assert_eq!(json, "\"tone-equalize\"");
        let back: FilterSpec = serde_json::from_str("\"false-color\"").unwrap();
        assert_eq!(back, FilterSpec::FalseColor);
    }

    // ─────── dimensions and order ───────────────────────────────

    #[test]
    fn every_filter_preserves_dimensions_and_order() {
        let image = varied(17, 9).into_order(ChannelOrder::Bgr);
        for spec in FilterSpec::ALL {
            let out = spec.apply(&image);
            assert_eq!(out.dimensions(), Dimensions::new(17, 9), "{spec}");
            assert_eq!(out.order(), ChannelOrder::Bgr, "{spec}");
        }
    }

    #[test]
    fn filters_are_deterministic() {
        let image = varied(12, 12);
        for spec in FilterSpec::ALL {
            assert_eq!(spec.apply(&image), spec.apply(&image), "{spec}");
        }
    }

    // ─────── brighten ───────────────────────────────────────────

    #[test]
    fn brighten_applies_gain_and_offset() {
        let out = brighten(&uniform([0, 100, 200]));
        assert_eq!(out.pixels().get_pixel(0, 0).0, [30, 150, 255]);
    }

    #[test]
    fn brighten_raises_mean_intensity() {
        let image = varied(20, 20);
        assert!(brighten(&image).mean_intensity() > image.mean_intensity());
    }

    // ─────── sharpen ────────────────────────────────────────────

    #[test]
    fn sharpen_leaves_uniform_image_unchanged() {
        // Replicated borders mean edge pixels see a uniform neighborhood.
        let image = uniform([90, 120, 33]);
        assert_eq!(sharpen(&image), image);
    }

    #[test]
    fn sharpen_increases_edge_contrast() {
        let image = Image::from_rgb(RgbImage::from_fn(10, 3, |x, _| {
            if x < 5 { rgb(100, 100, 100) } else { rgb(150, 150, 150) }
        }));
        let out = sharpen(&image);
        // Dark side of the edge gets darker, bright side brighter.
        assert_eq!(out.pixels().get_pixel(4, 1).0[0], 50);
        assert_eq!(out.pixels().get_pixel(5, 1).0[0], 200);
        // Away from the edge, nothing changes.
        assert_eq!(out.pixels().get_pixel(1, 1).0[0], 100);
        assert_eq!(out.pixels().get_pixel(8, 1).0[0], 150);
    }

    #[test]
    fn sharpen_replicates_border() {
        // Single bright pixel in the corner: with replication the corner
        // sees itself as its out-of-bounds neighbors.
        let image = Image::from_rgb(RgbImage::from_fn(3, 3, |x, y| {
            if x == 0 && y == 0 { rgb(100, 100, 100) } else { rgb(0, 0, 0) }
        }));
        let out = sharpen(&image);
        // 5*100 - (up=100) - (left=100) - (right=0) - (down=0) = 300 -> 255
        assert_eq!(out.pixels().get_pixel(0, 0).0[0], 255);
    }

    // ─────── false color ────────────────────────────────────────

    #[test]
    fn jet_endpoints() {
        assert_eq!(JET[0].0, [0, 0, 128]);
        assert_eq!(JET[255].0, [128, 0, 0]);
        let mid = JET[128].0;
        assert_eq!(mid[1], 255, "mid-ramp should be fully green, got {mid:?}");
    }

    #[test]
    fn false_color_maps_black_and_white() {
        let black = false_color(&uniform([0, 0, 0]));
        let white = false_color(&uniform([255, 255, 255]));
        assert_eq!(black.pixels().get_pixel(0, 0).0, [0, 0, 128]);
        assert_eq!(white.pixels().get_pixel(0, 0).0, [128, 0, 0]);
    }

    #[test]
    fn false_color_respects_bgr_input() {
        let rgb_image = uniform([0, 0, 0]);
        let bgr_image = rgb_image.clone().into_order(ChannelOrder::Bgr);
        let out = false_color(&bgr_image);
        assert_eq!(out.order(), ChannelOrder::Bgr);
        assert_eq!(out.into_rgb(), false_color(&rgb_image).into_rgb());
    }

    // ─────── tone equalize ──────────────────────────────────────

    #[test]
    fn tone_equalize_keeps_gray_neutral() {
        let image = Image::from_rgb(RgbImage::from_fn(16, 16, |x, y| {
            let v = u8::try_from(60 + x * 2 + y).unwrap();
            rgb(v, v, v)
        }));
        let out = tone_equalize(&image);
        for pixel in out.pixels().pixels() {
            let [r, g, b] = pixel.0;
            assert!(r.abs_diff(g) <= 1 && g.abs_diff(b) <= 1, "{:?}", pixel.0);
        }
    }

    #[test]
    fn tone_equalize_stretches_narrow_histogram() {
        let image = Image::from_rgb(RgbImage::from_fn(16, 16, |x, _| {
            let v = u8::try_from(100 + x).unwrap();
            rgb(v, v, v)
        }));
        let out = tone_equalize(&image);
        let lo = out.pixels().pixels().map(|p| p.0[0]).min().unwrap();
        let hi = out.pixels().pixels().map(|p| p.0[0]).max().unwrap();
        assert!(hi - lo > 100, "expected stretched range, got {lo}..{hi}");
    }

    #[test]
    fn tone_equalize_keeps_dimensions() {
        let image = varied(23, 11);
        assert_eq!(tone_equalize(&image).dimensions(), image.dimensions());
    }

    #[test]
    fn tone_equalize_keeps_chroma_within_input_range() {
        // Saturated red ramp: equalizing pushes the bright end toward
        // L* = 100, where sRGB cannot hold that much red.
        let image = Image::from_rgb(RgbImage::from_fn(32, 8, |x, _| {
            rgb(u8::try_from(120 + x * 3).unwrap(), 10, 10)
        }));
        let out = apply_filter(&image, "tone-equalize").unwrap();
        assert_eq!(out.dimensions(), Dimensions::new(32, 8));

        let chroma_range = |image: &Image| {
            image.pixels().pixels().map(|p| lab::srgb_to_lab(*p)).fold(
                [f32::INFINITY, f32::NEG_INFINITY, f32::INFINITY, f32::NEG_INFINITY],
                |[a_lo, a_hi, b_lo, b_hi], p| {
                    [a_lo.min(p.a), a_hi.max(p.a), b_lo.min(p.b), b_hi.max(p.b)]
                },
            )
        };
        let [a_lo, a_hi, b_lo, b_hi] = chroma_range(&image);
        let [out_a_lo, out_a_hi, out_b_lo, out_b_hi] = chroma_range(&out);
        let slack = 1.5;
        assert!(out_a_lo >= a_lo - slack, "a* {out_a_lo} below {a_lo}");
        assert!(out_a_hi <= a_hi + slack, "a* {out_a_hi} above {a_hi}");
        assert!(out_b_lo >= b_lo - slack, "b* {out_b_lo} below {b_lo}");
        assert!(out_b_hi <= b_hi + slack, "b* {out_b_hi} above {b_hi}");

        // Lightness still spreads out.
        let lightness = |image: &Image| {
            image.pixels().pixels().map(|p| lab::srgb_to_lab(*p).l).fold(
                (f32::INFINITY, f32::NEG_INFINITY),
                |(lo, hi), l| (lo.min(l), hi.max(l)),
            )
        };
        let (lo, hi) = lightness(&image);
        let (out_lo, out_hi) = lightness(&out);
        assert!(out_hi - out_lo > hi - lo, "{out_lo}..{out_hi} vs {lo}..{hi}");
    }

    #[test]
    fn settled_lightness_is_target_when_in_gamut() {
        let gray = lab::srgb_to_lab(rgb(90, 90, 90));
        assert!((settle_lightness(gray, 80.0) - 80.0).abs() < f32::EPSILON);

        let red = lab::srgb_to_lab(rgb(213, 10, 10));
        let settled = settle_lightness(red, 100.0);
        assert!(settled >= red.l && settled < 100.0, "settled at {settled}");
    }

    #[test]
    fn equalize_lightness_leaves_chrominance_untouched() {
        let image = varied(16, 16);
        let original = codec::to_lab(&image);
        let mut lab = original.clone();
        equalize_lightness(&mut lab, 16, 16);

        let range = |values: &mut dyn Iterator<Item = f32>| {
            values.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            })
        };
        let (a_lo, a_hi) = range(&mut original.iter().map(|p| p.a));
        let (b_lo, b_hi) = range(&mut original.iter().map(|p| p.b));
        for (before, after) in original.iter().zip(&lab) {
            assert!((a_lo..=a_hi).contains(&after.a));
            assert!((b_lo..=b_hi).contains(&after.b));
            assert_eq!(before.a.to_bits(), after.a.to_bits());
            assert_eq!(before.b.to_bits(), after.b.to_bits());
        }
        assert!(original.iter().zip(&lab).any(|(before, after)| before.l.to_bits() != after.l.to_bits()));
    }
}
