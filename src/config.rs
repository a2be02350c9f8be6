//! Scene configuration, constructed once by the host and passed to the scene

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Connect ports of differing types through a registered converter
    pub allow_type_conversion: bool,
    /// Allow both ends of a connection on the same node
    pub allow_self_connections: bool,
    /// Longest synchronous propagation chain before it is cut off
    pub max_propagation_depth: usize,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            allow_type_conversion: true,
            allow_self_connections: false,
            max_propagation_depth: 256,
        }
    }
}

impl SceneConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        debug!("Loaded scene config from {}", path.as_ref().display());
        Self::from_json_str(&text)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// `~/.nodeflow/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".nodeflow").join("config.json"))
    }

    /// Reads the default config file if present, otherwise defaults
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path().filter(|p| p.exists()) else {
            return Self::default();
        };
        Self::load(&path).unwrap_or_else(|e| {
            warn!("Ignoring unreadable config {}: {}", path.display(), e);
            Self::default()
        })
    }
}
