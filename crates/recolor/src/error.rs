//! Failure taxonomy for the service boundary.

use std::fmt;

use recolor_pipeline::PipelineError;
use recolor_store::StoreError;
use serde::{Deserialize, Serialize};

use crate::models::StartupError;

/// Category of a failure, independent of where it was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The input could not be decoded or has no pixels.
    InvalidImage,
    /// A referenced upload or artifact does not exist.
    NotFound,
    /// The requested filter is not one of the known filters.
    UnknownFilter,
    /// A colorization model failed.
    InferenceFailure,
    /// An artifact could not be written or verified.
    PersistFailure,
    /// Models or directories could not be set up. Fatal.
    StartupFailure,
}

impl ErrorKind {
    /// Whether the caller is at fault (bad input) rather than the service.
    #[must_use]
    pub const fn is_client_error(self) -> bool {
        matches!(self, Self::InvalidImage | Self::NotFound | Self::UnknownFilter)
    }

    /// Classify a pipeline error.
    #[must_use]
    pub const fn of_pipeline(err: &PipelineError) -> Self {
        match err {
            PipelineError::ImageDecode(_)
            | PipelineError::EmptyInput
            | PipelineError::EmptyImage { .. } => Self::InvalidImage,
            PipelineError::UnknownFilter(_) => Self::UnknownFilter,
            PipelineError::Inference { .. } => Self::InferenceFailure,
        }
    }

    /// Classify a store error raised while resolving an artifact.
    ///
    /// A name that cannot be an artifact refers to nothing, so it is
    /// reported as [`ErrorKind::NotFound`]. Upload names are classified
    /// separately, see [`ServiceError::InvalidUpload`].
    #[must_use]
    pub const fn of_store(err: &StoreError) -> Self {
        match err {
            StoreError::InvalidName { .. } | StoreError::NotFound { .. } => Self::NotFound,
            StoreError::Decode { .. } => Self::InvalidImage,
            StoreError::Encode(_)
            | StoreError::Persist { .. }
            | StoreError::Unverified { .. }
            | StoreError::Io { .. } => Self::PersistFailure,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InvalidImage => "invalid image",
            Self::NotFound => "not found",
            Self::UnknownFilter => "unknown filter",
            Self::InferenceFailure => "inference failure",
            Self::PersistFailure => "persist failure",
            Self::StartupFailure => "startup failure",
        };
        f.write_str(s)
    }
}

/// Errors returned by [`Service`](crate::Service) operations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Decoding, colorizing, or filtering failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Reading or writing the artifact store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The upload's file name cannot be stored.
    #[error("invalid upload: {0}")]
    InvalidUpload(#[source] StoreError),

    /// The service could not be started.
    #[error(transparent)]
    Startup(#[from] StartupError),
}

impl ServiceError {
    /// Wrap an error from storing an upload, treating a bad file name as
    /// bad input rather than a missing artifact.
    #[must_use]
    pub fn upload(err: StoreError) -> Self {
        match err {
            StoreError::InvalidName { .. } => Self::InvalidUpload(err),
            other => Self::Store(other),
        }
    }

    /// The taxonomy category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Pipeline(err) => ErrorKind::of_pipeline(err),
            Self::Store(err) => ErrorKind::of_store(err),
            Self::InvalidUpload(_) => ErrorKind::InvalidImage,
            Self::Startup(_) => ErrorKind::StartupFailure,
        }
    }

    /// Structured form of this error for reporting to a caller.
    #[must_use]
    pub fn to_failure(&self) -> Failure {
        Failure {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// A failure surfaced to the caller: what kind, and what happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Taxonomy category.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
}

impl From<&PipelineError> for Failure {
    fn from(err: &PipelineError) -> Self {
        Self {
            kind: ErrorKind::of_pipeline(err),
            message: err.to_string(),
        }
    }
}

impl From<&ServiceError> for Failure {
    fn from(err: &ServiceError) -> Self {
        err.to_failure()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
