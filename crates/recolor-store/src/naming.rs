//! Deterministic artifact names.
//!
//! An artifact is named `{base}_{stage}.png`, where `base` is the source
//! file name up to its first `.` and `stage` says why the artifact
//! exists (a model name or a filter name). Names are not unique across
//! uploads: two sources with the same base name and stage map to the
//! same artifact, and the later write replaces the earlier one.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::StoreError;

/// File extension of every artifact.
pub const ARTIFACT_EXTENSION: &str = "png";

/// Why an artifact was produced: a model name or a filter name.
///
/// Restricted to ASCII letters, digits, `-`, and `_` so it can be
/// embedded in a file name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StageTag(String);

impl StageTag {
    /// Validate and wrap a stage tag.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] if `tag` is empty or contains
    /// anything other than ASCII alphanumerics, `-`, or `_`.
    pub fn new(tag: impl Into<String>) -> Result<Self, StoreError> {
        let tag = tag.into();
        if tag.is_empty() {
            return Err(StoreError::InvalidName {
                name: tag,
                reason: "stage tag is empty",
            });
        }
        if !tag
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(StoreError::InvalidName {
                name: tag,
                reason: "stage tag may only contain ASCII letters, digits, '-' and '_'",
            });
        }
        Ok(Self(tag))
    }

    /// The tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for StageTag {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for StageTag {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StageTag> for String {
    fn from(tag: StageTag) -> Self {
        tag.0
    }
}

impl From<recolor_pipeline::FilterSpec> for StageTag {
    fn from(spec: recolor_pipeline::FilterSpec) -> Self {
        // Filter names are lowercase ASCII with '-', always valid tags.
        Self(spec.name().to_owned())
    }
}

/// The file name of a stored artifact, e.g. `photo_eccv16.png`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Derive the artifact name for `source_name` at `stage`.
    ///
    /// Only the final path component of `source_name` is used, cut at its
    /// first `.`: `uploads/photo.final.jpg` at stage `sharpen` becomes
    /// `photo_sharpen.png`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] if `source_name` has no usable
    /// base name.
    pub fn derive(source_name: &str, stage: &StageTag) -> Result<Self, StoreError> {
        let base = base_name(source_name)?;
        Ok(Self(format!("{base}_{stage}.{ARTIFACT_EXTENSION}")))
    }

    /// Resolve a client-supplied artifact reference.
    ///
    /// Accepts a bare name (`photo_eccv16.png`) or anything ending in one
    /// (`static/photo_eccv16.png`, a URL path); only the final component
    /// is kept.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] if the final component is empty,
    /// a relative directory marker, or not a `.png` file name.
    pub fn parse(reference: &str) -> Result<Self, StoreError> {
        let name = final_component(reference);
        if name.is_empty() || name == "." || name == ".." {
            return Err(StoreError::InvalidName {
                name: reference.to_owned(),
                reason: "artifact reference has no file name",
            });
        }
        let has_extension = name.rsplit_once('.').is_some_and(|(stem, ext)| {
            !stem.is_empty() && ext.eq_ignore_ascii_case(ARTIFACT_EXTENSION)
        });
        if !has_extension {
            return Err(StoreError::InvalidName {
                name: reference.to_owned(),
                reason: "artifact names end in .png",
            });
        }
        Ok(Self(name.to_owned()))
    }

    /// The artifact file name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ArtifactId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ArtifactId {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ArtifactId> for String {
    fn from(id: ArtifactId) -> Self {
        id.0
    }
}

/// The last `/`- or `\`-separated component of `name`.
pub(crate) fn final_component(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name).trim()
}

/// The final component of `source_name`, cut at its first `.`.
fn base_name(source_name: &str) -> Result<&str, StoreError> {
    let file = final_component(source_name);
    let base = file.split('.').next().unwrap_or_default();
    if base.is_empty() {
        return Err(StoreError::InvalidName {
            name: source_name.to_owned(),
            reason: "source name has no base name",
        });
    }
    Ok(base)
}
