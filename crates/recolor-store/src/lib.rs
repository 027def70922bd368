//! recolor-store: filesystem persistence for recolor.
//!
//! Keeps raw uploads and the PNG artifacts derived from them. Artifact
//! names are deterministic (see [`naming`]); writes are atomic and
//! verified before an artifact is reported as stored.

pub mod naming;
mod store;

use std::path::PathBuf;

use recolor_pipeline::PipelineError;

pub use naming::{ARTIFACT_EXTENSION, ArtifactId, StageTag};
pub use store::ArtifactStore;

/// Errors from artifact store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A name could not be used as a file name.
    #[error("invalid name {name:?}: {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// No upload or artifact with this name exists.
    #[error("not found: {name}")]
    NotFound {
        /// The name that was looked up.
        name: String,
    },

    /// A stored file could not be decoded as an image.
    #[error("failed to decode {name}: {source}")]
    Decode {
        /// Name of the stored file.
        name: String,
        /// Why decoding failed.
        #[source]
        source: PipelineError,
    },

    /// PNG encoding failed.
    #[error("failed to encode PNG: {0}")]
    Encode(#[source] image::ImageError),

    /// Writing a file into place failed.
    #[error("failed to persist {path}: {source}")]
    Persist {
        /// Destination of the write.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A file was written but does not have the expected size.
    #[error("{path} holds {found} bytes after write, expected {expected}")]
    Unverified {
        /// The file that was written.
        path: PathBuf,
        /// Number of bytes written.
        expected: u64,
        /// Size of the file on disk afterwards.
        found: u64,
    },

    /// Any other filesystem failure.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The file or directory being accessed.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// The pipeline error behind a [`StoreError::Decode`].
    #[must_use]
    pub const fn pipeline_error(&self) -> Option<&PipelineError> {
        match self {
            Self::Decode { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Returns `true` for failures to write an artifact to disk.
    #[must_use]
    pub const fn is_persist_failure(&self) -> bool {
        matches!(
            self,
            Self::Encode(_) | Self::Persist { .. } | Self::Unverified { .. }
        )
    }
}

/// Convenience alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;
