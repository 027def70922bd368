//! Service configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default directory for raw uploads.
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Default directory for derived artifacts.
pub const DEFAULT_ARTIFACT_DIR: &str = "static";

/// Where the service keeps its files and which models it loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Directory receiving raw uploads unchanged.
    pub upload_dir: PathBuf,
    /// Directory receiving colorized and filtered artifacts.
    pub artifact_dir: PathBuf,
    /// Colorization models, loaded once at startup.
    pub models: Vec<ModelSpec>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            models: Vec::new(),
        }
    }
}

impl ServiceConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if `json` is malformed.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// A named colorization model and the file it is loaded from.
///
/// The name becomes the stage tag of the model's artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Model name; also the stage tag of its artifacts.
    pub name: String,
    /// Model file, read once at startup.
    pub path: PathBuf,
}

impl ModelSpec {
    /// A model called `name` loaded from `path`.
    #[must_use]
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.path.display())
    }
}

/// Parses `NAME=PATH`.
impl FromStr for ModelSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, path) = s
            .split_once('=')
            .ok_or_else(|| format!("model must be 'NAME=PATH', got: '{s}'"))?;
        let name = name.trim();
        let path = path.trim();
        if name.is_empty() {
            return Err(format!("model name is empty in '{s}'"));
        }
        if path.is_empty() {
            return Err(format!("model path is empty in '{s}'"));
        }
        Ok(Self::new(name, path))
    }
}
