//! Startup model loading.
//!
//! Every configured model is loaded exactly once, before any request is
//! served. The resulting [`ModelSet`] is immutable and shared by all
//! requests. Any loading problem aborts startup.

#[cfg(feature = "onnx")]
mod onnx;

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use recolor_pipeline::{Colorizer, ModelSet};
use recolor_store::{StageTag, StoreError};

use crate::config::ModelSpec;

#[cfg(feature = "onnx")]
pub use onnx::OnnxColorizer;

/// Errors that prevent the service from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The configuration lists no models.
    #[error("no colorization models configured")]
    NoModels,

    /// A model name cannot be used as an artifact stage tag.
    #[error("invalid model name {name:?}: {source}")]
    InvalidModelName {
        name: String,
        #[source]
        source: StoreError,
    },

    /// Two models share a name.
    #[error("model {name:?} is configured more than once")]
    DuplicateModel { name: String },

    /// A model file does not exist.
    #[error("model {name:?}: file not found at {path}")]
    ModelMissing { name: String, path: PathBuf },

    /// The binary was built without a model runtime.
    #[error("cannot load model {name:?}: ONNX support not compiled in (enable the `onnx` feature)")]
    RuntimeUnavailable { name: String },

    /// The model runtime rejected a model file.
    #[error("failed to load model {name:?} from {path}: {message}")]
    ModelLoad {
        name: String,
        path: PathBuf,
        message: String,
    },

    /// The upload or artifact directory could not be set up.
    #[error("failed to open artifact store: {0}")]
    Store(#[from] StoreError),
}

type Loader = dyn Fn(&ModelSpec) -> Result<Arc<dyn Colorizer>, StartupError> + Send + Sync;

/// Turns [`ModelSpec`]s into a validated, immutable [`ModelSet`].
///
/// The default registry loads ONNX files (with the `onnx` feature).
/// [`with_loader`](Self::with_loader) substitutes another model source.
pub struct ModelRegistry {
    loader: Box<Loader>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry").finish_non_exhaustive()
    }
}

impl ModelRegistry {
    /// A registry that loads model files with the compiled-in runtime.
    #[must_use]
    pub fn new() -> Self {
        Self {
            loader: Box::new(load_model_file),
        }
    }

    /// A registry that loads models with `loader`.
    ///
    /// Names and file existence are still validated before `loader` runs.
    #[must_use]
    pub fn with_loader<F>(loader: F) -> Self
    where
        F: Fn(&ModelSpec) -> Result<Arc<dyn Colorizer>, StartupError> + Send + Sync + 'static,
    {
        Self {
            loader: Box::new(loader),
        }
    }

    /// Validate and load every model in `specs`.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError`] if `specs` is empty, a name is invalid or
    /// repeated, a file is missing, or a model fails to load.
    pub fn load(&self, specs: &[ModelSpec]) -> Result<ModelSet, StartupError> {
        if specs.is_empty() {
            return Err(StartupError::NoModels);
        }

        let mut seen = BTreeSet::new();
        for spec in specs {
            StageTag::new(spec.name.as_str()).map_err(|source| StartupError::InvalidModelName {
                name: spec.name.clone(),
                source,
            })?;
            if !seen.insert(spec.name.as_str()) {
                return Err(StartupError::DuplicateModel {
                    name: spec.name.clone(),
                });
            }
            if !spec.path.is_file() {
                return Err(StartupError::ModelMissing {
                    name: spec.name.clone(),
                    path: spec.path.clone(),
                });
            }
        }

        let mut models = ModelSet::new();
        for spec in specs {
            let model = (self.loader)(spec)?;
            tracing::info!(model = %spec.name, path = %spec.path.display(), "loaded model");
            models.insert(spec.name.clone(), model);
        }
        Ok(models)
    }
}

#[cfg(feature = "onnx")]
fn load_model_file(spec: &ModelSpec) -> Result<Arc<dyn Colorizer>, StartupError> {
    let model = OnnxColorizer::load(spec)?;
    Ok(Arc::new(model))
}

#[cfg(not(feature = "onnx"))]
fn load_model_file(spec: &ModelSpec) -> Result<Arc<dyn Colorizer>, StartupError> {
    Err(StartupError::RuntimeUnavailable {
        name: spec.name.clone(),
    })
}
