//! Shared types for the recolor pipeline.

use image::{ImageBuffer, Luma, Rgb};
use serde::{Deserialize, Serialize};

/// Re-export `RgbImage` so downstream crates can build and inspect
/// pixel buffers without depending on `image` directly.
pub use image::RgbImage;

/// Single-channel floating point raster used for Lab planes.
pub type Plane = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create a new dimensions value.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns `true` if either axis is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Byte order of the three channels stored in an [`Image`] buffer.
///
/// Decoders and encoders in this workspace speak RGB. BGR buffers come
/// from producers that follow the OpenCV convention; they must be
/// converted with [`Image::into_order`] before any color math.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelOrder {
    /// Red, green, blue.
    #[default]
    Rgb,
    /// Blue, green, red.
    Bgr,
}

/// A 3-channel, 8-bit raster tagged with its channel order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    order: ChannelOrder,
    pixels: RgbImage,
}

impl Image {
    /// Wrap a buffer whose pixels are stored as R, G, B.
    #[must_use]
    pub const fn from_rgb(pixels: RgbImage) -> Self {
        Self {
            order: ChannelOrder::Rgb,
            pixels,
        }
    }

    /// Wrap a buffer whose pixels are stored as B, G, R.
    #[must_use]
    pub const fn from_bgr(pixels: RgbImage) -> Self {
        Self {
            order: ChannelOrder::Bgr,
            pixels,
        }
    }

    /// Decode encoded image bytes (PNG, JPEG, BMP, WebP) into an RGB image.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
    /// Returns [`PipelineError::ImageDecode`] if the format is
    /// unrecognized or the data is corrupt.
    /// Returns [`PipelineError::EmptyImage`] if the decoded image has
    /// zero area.
    pub fn decode(bytes: &[u8]) -> Result<Self, PipelineError> {
        if bytes.is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let image = Self::from_rgb(image::load_from_memory(bytes)?.to_rgb8());
        image.ensure_not_empty()?;
        Ok(image)
    }

    /// The channel order of the underlying buffer.
    #[must_use]
    pub const fn order(&self) -> ChannelOrder {
        self.order
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Width and height.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width(), self.height())
    }

    /// The raw buffer, in [`order`](Self::order).
    #[must_use]
    pub const fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    /// Convert the buffer to `order`, swapping the first and third
    /// channel of every pixel when the orders differ.
    #[must_use]
    pub fn into_order(mut self, order: ChannelOrder) -> Self {
        if self.order != order {
            for pixel in self.pixels.pixels_mut() {
                pixel.0.swap(0, 2);
            }
            self.order = order;
        }
        self
    }

    /// Consume the image and return its pixels in RGB order.
    #[must_use]
    pub fn into_rgb(self) -> RgbImage {
        self.into_order(ChannelOrder::Rgb).pixels
    }

    /// Copy the pixels out in RGB order.
    #[must_use]
    pub fn to_rgb(&self) -> RgbImage {
        self.clone().into_rgb()
    }

    /// Mean of all channel values across all pixels, in `0.0..=255.0`.
    ///
    /// Channel order does not affect the result. Returns `0.0` for an
    /// empty image.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_intensity(&self) -> f64 {
        let raw = self.pixels.as_raw();
        if raw.is_empty() {
            return 0.0;
        }
        let sum: u64 = raw.iter().map(|&v| u64::from(v)).sum();
        sum as f64 / raw.len() as f64
    }

    /// Fail with [`PipelineError::EmptyImage`] if either axis is zero.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyImage`] for a zero-area image.
    pub fn ensure_not_empty(&self) -> Result<(), PipelineError> {
        let dimensions = self.dimensions();
        if dimensions.is_empty() {
            return Err(PipelineError::EmptyImage { dimensions });
        }
        Ok(())
    }
}

impl From<RgbImage> for Image {
    fn from(pixels: RgbImage) -> Self {
        Self::from_rgb(pixels)
    }
}

/// The CIE L* channel of an image, in `0.0..=100.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct LuminanceFrame(Plane);

impl LuminanceFrame {
    /// Wrap an L* plane.
    #[must_use]
    pub const fn new(plane: Plane) -> Self {
        Self(plane)
    }

    /// Width and height.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.0.width(), self.0.height())
    }

    /// The underlying plane.
    #[must_use]
    pub const fn plane(&self) -> &Plane {
        &self.0
    }

    /// L* values in row-major order.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        self.0.as_raw()
    }
}

/// Predicted a*/b* channels returned by a colorization model.
#[derive(Debug, Clone, PartialEq)]
pub struct ChrominancePrediction {
    a: Plane,
    b: Plane,
}

impl ChrominancePrediction {
    /// Build a prediction from row-major a*/b* values.
    ///
    /// Returns `None` if either vector does not hold exactly
    /// `width * height` values.
    #[must_use]
    pub fn from_raw(width: u32, height: u32, a: Vec<f32>, b: Vec<f32>) -> Option<Self> {
        let a = Plane::from_raw(width, height, a)?;
        let b = Plane::from_raw(width, height, b)?;
        Some(Self { a, b })
    }

    /// A neutral (colorless) prediction of the given size.
    #[must_use]
    pub fn neutral(width: u32, height: u32) -> Self {
        Self {
            a: Plane::new(width, height),
            b: Plane::new(width, height),
        }
    }

    /// Width and height shared by both planes.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.a.width(), self.a.height())
    }

    /// The a* (green-red) plane.
    #[must_use]
    pub const fn a(&self) -> &Plane {
        &self.a
    }

    /// The b* (blue-yellow) plane.
    #[must_use]
    pub const fn b(&self) -> &Plane {
        &self.b
    }
}

/// Errors that can occur in the colorization and filter pipelines.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image data is empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The image decoded but has no pixels.
    #[error("image has zero area ({dimensions})")]
    EmptyImage {
        /// The offending dimensions.
        dimensions: Dimensions,
    },

    /// The requested filter is not one of the supported filters.
    #[error("unknown filter {0:?}")]
    UnknownFilter(String),

    /// A colorization model failed or broke its input/output contract.
    #[error("model {model} failed: {message}")]
    Inference {
        /// Name of the model that failed.
        model: String,
        /// What went wrong.
        message: String,
    },
}

/// Convenience for building a single RGB pixel in tests and filters.
#[must_use]
pub const fn rgb(r: u8, g: u8, b: u8) -> Rgb<u8> {
    Rgb([r, g, b])
}
