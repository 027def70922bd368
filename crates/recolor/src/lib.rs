//! recolor: colorize grayscale photographs and derive filtered variants.
//!
//! [`Service`] ties the sans-IO pipeline (`recolor-pipeline`) to the
//! filesystem artifact store (`recolor-store`):
//!
//! - [`Service::process_upload`] stores an upload, colorizes it with
//!   every model loaded at startup, and persists one artifact per model.
//! - [`Service::apply_filter`] applies a named filter to an existing
//!   artifact and persists the result as a new artifact.
//!
//! Failures carry an [`ErrorKind`] so a front-end can tell client errors
//! from server errors.

pub mod config;
pub mod error;
pub mod models;
pub mod service;

pub use config::{ModelSpec, ServiceConfig};
pub use error::{ErrorKind, Failure, ServiceError};
pub use models::{ModelRegistry, StartupError};
pub use service::{ArtifactRecord, FilterReport, Service, UploadReport};

pub use recolor_pipeline::{FilterSpec, ModelSet};
