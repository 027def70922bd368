//! Request handling: upload → colorize → persist, and
//! artifact → filter → persist.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use recolor_pipeline::{Dimensions, FilterSpec, ModelSet, colorize};
use recolor_store::{ArtifactId, ArtifactStore, StageTag};
use serde::{Deserialize, Serialize};

use crate::config::ServiceConfig;
use crate::error::{Failure, ServiceError};
use crate::models::{ModelRegistry, StartupError};

/// One persisted artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Name of the artifact inside the artifact directory.
    pub id: ArtifactId,
    /// Location on disk.
    pub path: PathBuf,
}

/// Outcome of colorizing one upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReport {
    /// Name the upload was stored under.
    pub source: String,
    /// Location of the raw upload.
    pub upload_path: PathBuf,
    /// Size of the source image; every artifact has this size.
    pub dimensions: Dimensions,
    /// Colorized artifact per model name.
    pub artifacts: BTreeMap<String, ArtifactRecord>,
    /// Failure per model name, for models that produced nothing.
    pub failures: BTreeMap<String, Failure>,
}

impl UploadReport {
    /// Returns `true` if every model produced an artifact.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Outcome of filtering one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterReport {
    /// The artifact that was filtered.
    pub source: ArtifactId,
    /// The filter that was applied.
    pub filter: FilterSpec,
    /// The new artifact.
    pub artifact: ArtifactRecord,
    /// Size of the new artifact, equal to the source's.
    pub dimensions: Dimensions,
}

/// The colorization service: an artifact store plus the models loaded
/// at startup.
///
/// `Service` holds no mutable state; it can be shared by reference
/// across threads serving concurrent requests.
#[derive(Debug, Clone)]
pub struct Service {
    store: ArtifactStore,
    models: ModelSet,
}

impl Service {
    /// Assemble a service from an opened store and loaded models.
    #[must_use]
    pub const fn new(store: ArtifactStore, models: ModelSet) -> Self {
        Self { store, models }
    }

    /// Load every configured model with `registry`, then open the store.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Startup`] if any model fails to load or
    /// the directories cannot be created.
    pub fn start(config: &ServiceConfig, registry: &ModelRegistry) -> Result<Self, ServiceError> {
        let models = registry.load(&config.models)?;
        let store = ArtifactStore::open(&config.upload_dir, &config.artifact_dir)
            .map_err(StartupError::from)?;
        tracing::info!(
            models = models.len(),
            upload_dir = %config.upload_dir.display(),
            artifact_dir = %config.artifact_dir.display(),
            "service ready"
        );
        Ok(Self::new(store, models))
    }

    /// The artifact store.
    #[must_use]
    pub const fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// The loaded models.
    #[must_use]
    pub const fn models(&self) -> &ModelSet {
        &self.models
    }

    /// Store an upload and colorize it with every model.
    ///
    /// The raw bytes are written to the upload directory unchanged and
    /// the stored copy is decoded. Each model's output is persisted as
    /// `{base}_{model}.png`. A failing model is reported in
    /// [`UploadReport::failures`] and does not affect the others.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] with kind `InvalidImage` if `filename` has
    /// no file name or the bytes are not an image, or `PersistFailure` if
    /// the upload or a colorized image cannot be written.
    pub fn process_upload(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> Result<UploadReport, ServiceError> {
        let start = Instant::now();
        let source = self
            .store
            .save_upload(filename, bytes)
            .map_err(ServiceError::upload)?;
        let upload_path = self.store.upload_dir().join(&source);
        let image = self.store.load_upload(&source)?;
        tracing::debug!(
            source = %source,
            dimensions = %image.dimensions(),
            elapsed_ms = start.elapsed().as_millis(),
            "decoded upload"
        );

        let colorize_start = Instant::now();
        let outcome = colorize(&image, &self.models)?;
        tracing::debug!(
            elapsed_ms = colorize_start.elapsed().as_millis(),
            "colorized"
        );

        let mut artifacts = BTreeMap::new();
        for (model, colorized) in &outcome.images {
            let stage = StageTag::new(model.as_str())?;
            let id = self.store.put(&stage, &source, colorized)?;
            let path = self.store.path_of(&id);
            tracing::info!(model = %model, artifact = %id, "colorized artifact stored");
            artifacts.insert(model.clone(), ArtifactRecord { id, path });
        }

        let failures = outcome
            .failures
            .iter()
            .map(|(model, err)| (model.clone(), Failure::from(err)))
            .collect();

        tracing::debug!(elapsed_ms = start.elapsed().as_millis(), "upload processed");
        Ok(UploadReport {
            source,
            upload_path,
            dimensions: image.dimensions(),
            artifacts,
            failures,
        })
    }

    /// Apply the filter named `filter` to the artifact referenced by
    /// `artifact` and persist the result.
    ///
    /// `artifact` is resolved by its final path component. The filter name
    /// is checked before anything is read or written.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] with kind `UnknownFilter` for an unknown
    /// filter name, `NotFound` if the artifact does not exist,
    /// `InvalidImage` if it cannot be decoded, or `PersistFailure` if
    /// the result cannot be written.
    pub fn apply_filter(&self, artifact: &str, filter: &str) -> Result<FilterReport, ServiceError> {
        let start = Instant::now();
        let spec: FilterSpec = filter.parse()?;
        let source = ArtifactId::parse(artifact)?;
        let image = self.store.get(&source)?;

        let filtered = spec.apply(&image);
        let id = self
            .store
            .put(&StageTag::from(spec), source.as_str(), &filtered)?;
        let path = self.store.path_of(&id);
        tracing::info!(
            filter = %spec,
            source = %source,
            artifact = %id,
            elapsed_ms = start.elapsed().as_millis(),
            "filtered artifact stored"
        );

        Ok(FilterReport {
            source,
            filter: spec,
            artifact: ArtifactRecord { id, path },
            dimensions: filtered.dimensions(),
        })
    }
}
