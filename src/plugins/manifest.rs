//! `plugin.yaml` parsing.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DpError, Result};

/// Manifest file expected in every plugin directory.
pub const MANIFEST_FILE: &str = "plugin.yaml";

/// A `module:factory` reference into the plugin catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryPoint {
    pub module: String,
    pub factory: String,
}

impl FromStr for EntryPoint {
    type Err = DpError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || DpError::InvalidEntryPoint {
            entry_point: s.to_string(),
        };
        let (module, factory) = s.trim().split_once(':').ok_or_else(invalid)?;
        if module.is_empty() || factory.is_empty() || factory.contains(':') {
            return Err(invalid());
        }
        Ok(Self {
            module: module.to_string(),
            factory: factory.to_string(),
        })
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.factory)
    }
}

/// A panel contributed by a plugin.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PanelSpec {
    #[serde(default)]
    id: Option<String>,
    pub name: String,
    /// Relative to the plugin directory.
    pub path: PathBuf,
    #[serde(default = "default_mount")]
    pub mount: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub icon_pressed: Option<String>,
    #[serde(default)]
    pub params: Map<String, Value>,
}

fn default_mount() -> String {
    "root".to_string()
}

impl PanelSpec {
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }
}

/// Binds a bus topic to a named plugin handler.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EventHookSpec {
    #[serde(alias = "event")]
    pub topic: String,
    pub handler: String,
    #[serde(default)]
    pub once: bool,
}

/// Parsed `plugin.yaml`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PluginMetadata {
    pub name: String,
    pub entry_point: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub panels: Vec<PanelSpec>,
    #[serde(default)]
    pub events: Vec<EventHookSpec>,
    #[serde(default)]
    pub config: Map<String, Value>,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

impl PluginMetadata {
    /// Read and validate `<dir>/plugin.yaml`.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let text = std::fs::read_to_string(&path).map_err(|e| DpError::PluginManifest {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::parse(&text, &path)
    }

    /// Parse manifest text; `origin` only labels errors.
    pub fn parse(text: &str, origin: &Path) -> Result<Self> {
        let metadata: Self = serde_yaml::from_str(text).map_err(|e| DpError::PluginManifest {
            path: origin.display().to_string(),
            reason: e.to_string(),
        })?;
        if metadata.name.trim().is_empty() {
            return Err(DpError::PluginManifest {
                path: origin.display().to_string(),
                reason: "name must not be empty".to_string(),
            });
        }
        metadata.entry_point()?;
        Ok(metadata)
    }

    pub fn entry_point(&self) -> Result<EntryPoint> {
        self.entry_point.parse()
    }
}
