//! Engine configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{OozeError, Result};
use crate::predicate::DEFAULT_SEPARATOR;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OozeConfig {
    /// Hierarchy separator used by `inside` and path construction
    pub separator: char,
    /// Fail `attach` when a source holds two records of one type with the same key
    pub reject_duplicate_keys: bool,
}

impl Default for OozeConfig {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR,
            reject_duplicate_keys: true,
        }
    }
}

impl OozeConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| OozeError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| OozeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }
}
