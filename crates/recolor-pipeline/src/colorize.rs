//! Colorization: run every configured model over one shared lightness
//! extraction and rebuild a full-resolution image per model.
//!
//! Models are plugged in through the [`Colorizer`] trait. A [`ModelSet`]
//! is built once at startup and shared read-only between requests.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::codec::{self, INFERENCE_SIZE};
use crate::types::{ChrominancePrediction, Dimensions, Image, LuminanceFrame, PipelineError};

/// Error reported by a [`Colorizer`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct InferenceError {
    message: String,
}

impl InferenceError {
    /// Create an error with a human-readable message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A colorization model.
///
/// Receives L* at exactly `INFERENCE_SIZE` x `INFERENCE_SIZE` and
/// returns predicted a*/b* at the same size. Implementations hold their
/// weights immutably; `predict` may be called from several threads.
///
/// Any `Fn(&LuminanceFrame) -> Result<ChrominancePrediction, InferenceError>`
/// closure is a `Colorizer`.
pub trait Colorizer: Send + Sync {
    /// Predict a*/b* for the given lightness frame.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError`] if the model cannot produce a prediction.
    fn predict(&self, frame: &LuminanceFrame) -> Result<ChrominancePrediction, InferenceError>;
}

impl<F> Colorizer for F
where
    F: Fn(&LuminanceFrame) -> Result<ChrominancePrediction, InferenceError> + Send + Sync,
{
    fn predict(&self, frame: &LuminanceFrame) -> Result<ChrominancePrediction, InferenceError> {
        self(frame)
    }
}

/// Named, immutable collection of loaded models.
///
/// Cloning is cheap: models are reference counted and never mutated.
#[derive(Clone, Default)]
pub struct ModelSet {
    models: BTreeMap<String, Arc<dyn Colorizer>>,
}

impl ModelSet {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a model under `name`, replacing any model already registered
    /// under that name.
    #[must_use]
    pub fn with_model(mut self, name: impl Into<String>, model: impl Colorizer + 'static) -> Self {
        self.models.insert(name.into(), Arc::new(model));
        self
    }

    /// Add an already shared model under `name`.
    pub fn insert(&mut self, name: impl Into<String>, model: Arc<dyn Colorizer>) {
        self.models.insert(name.into(), model);
    }

    /// Whether a model is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Model names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    /// Number of models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Returns `true` if no models are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl fmt::Debug for ModelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Result of colorizing one source image with every model.
///
/// A failing model does not prevent the others from producing output.
#[derive(Debug, Default)]
pub struct ColorizeOutcome {
    /// Full-resolution colorized image per model name.
    pub images: BTreeMap<String, Image>,
    /// Error per model name, for models that failed.
    pub failures: BTreeMap<String, PipelineError>,
}

impl ColorizeOutcome {
    /// Returns `true` if every model produced an image.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Colorize `source` with every model in `models`.
///
/// L* is extracted once and shared by all models, so every output has
/// identical lightness. Each output has the source's dimensions.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyImage`] if the source has zero area.
/// Per-model failures are reported in [`ColorizeOutcome::failures`]
/// rather than as an error.
pub fn colorize(source: &Image, models: &ModelSet) -> Result<ColorizeOutcome, PipelineError> {
    let luminance = codec::extract_luminance(source)?;
    tracing::debug!(
        dimensions = %source.dimensions(),
        models = models.len(),
        "extracted luminance"
    );

    let mut outcome = ColorizeOutcome::default();
    for (name, model) in &models.models {
        match run_model(name, model.as_ref(), &luminance) {
            Ok(image) => {
                outcome.images.insert(name.clone(), image);
            }
            Err(err) => {
                tracing::warn!(model = %name, error = %err, "colorization failed");
                outcome.failures.insert(name.clone(), err);
            }
        }
    }
    Ok(outcome)
}

/// Run one model and rebuild its output at native resolution.
fn run_model(
    name: &str,
    model: &dyn Colorizer,
    luminance: &codec::Luminance,
) -> Result<Image, PipelineError> {
    let prediction = model
        .predict(&luminance.inference)
        .map_err(|err| PipelineError::Inference {
            model: name.to_owned(),
            message: err.message,
        })?;

    let expected = Dimensions::new(INFERENCE_SIZE, INFERENCE_SIZE);
    let actual = prediction.dimensions();
    if actual != expected {
        return Err(PipelineError::Inference {
            model: name.to_owned(),
            message: format!("predicted chrominance is {actual}, expected {expected}"),
        });
    }

    codec::reconstruct(&luminance.native, &prediction)
}
