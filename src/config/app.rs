//! The application config file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::path::{PathResolver, default_config_path};
use crate::comm::{DEFAULT_COMMAND_HOST, DEFAULT_COMMAND_PORT};
use crate::device::DeckSelector;
use crate::error::{DpError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Seconds between visible clock ticks; 0 disables them.
    pub clock_tick_interval: f64,
    pub hidden_clock_tick_interval: f64,
    /// Root panel directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            clock_tick_interval: 2.0,
            hidden_clock_tick_interval: 1.0,
            root: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDeckSettings {
    #[serde(default = "default_brightness")]
    pub brightness: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
}

const fn default_brightness() -> u8 {
    30
}

impl Default for StreamDeckSettings {
    fn default() -> Self {
        Self {
            brightness: default_brightness(),
            device_index: Some(0),
            serial_number: None,
        }
    }
}

impl StreamDeckSettings {
    pub fn selector(&self) -> DeckSelector {
        DeckSelector {
            serial: self.serial_number.clone(),
            index: self.device_index,
        }
    }
}

/// Where the asset manager looks for user files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icons_directory: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fonts_directory: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sounds_directory: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_font: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    pub enabled: bool,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            directory: None,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandSettings {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            host: DEFAULT_COMMAND_HOST.to_string(),
            port: DEFAULT_COMMAND_PORT,
        }
    }
}

/// Parsed `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralSettings,
    pub streamdeck: StreamDeckSettings,
    pub assets: AssetSettings,
    pub plugins: PluginSettings,
    pub commands: CommandSettings,
    #[serde(skip)]
    source: Option<PathBuf>,
}

impl AppConfig {
    /// Parse config text without resolving paths.
    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| DpError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file and resolve its paths against its directory.
    #[instrument]
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(DpError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&text)?;
        config.resolve_paths(&PathResolver::new(path))?;
        config.source = Some(path.to_path_buf());
        info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Load `explicit`, else the default file when it exists, else defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let path = default_config_path()?;
        if path.is_file() {
            Self::load(&path)
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    fn resolve_paths(&mut self, resolver: &PathResolver) -> Result<()> {
        resolver.resolve_in_place(&mut self.general.root)?;
        resolver.resolve_in_place(&mut self.assets.icons_directory)?;
        resolver.resolve_in_place(&mut self.assets.fonts_directory)?;
        resolver.resolve_in_place(&mut self.assets.sounds_directory)?;
        resolver.resolve_in_place(&mut self.plugins.directory)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.streamdeck.brightness > 100 {
            return Err(DpError::ConfigInvalid(format!(
                "streamdeck.brightness must be between 0 and 100, got {}",
                self.streamdeck.brightness
            )));
        }
        for (key, value) in [
            ("general.clock_tick_interval", self.general.clock_tick_interval),
            ("general.hidden_clock_tick_interval", self.general.hidden_clock_tick_interval),
        ] {
            seconds(key, value)?;
        }
        Ok(())
    }

    /// The deck selector; fails when neither index nor serial is configured.
    pub fn require_selector(&self) -> Result<DeckSelector> {
        let selector = self.streamdeck.selector();
        if selector.is_empty() {
            return Err(DpError::ConfigInvalid(
                "At least one of streamdeck.device_index or streamdeck.serial_number must be set"
                    .to_string(),
            ));
        }
        Ok(selector)
    }

    pub fn clock_tick_interval(&self) -> Result<Duration> {
        seconds("general.clock_tick_interval", self.general.clock_tick_interval)
    }

    pub fn hidden_clock_tick_interval(&self) -> Result<Duration> {
        seconds("general.hidden_clock_tick_interval", self.general.hidden_clock_tick_interval)
    }

    /// File this config came from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

/// A non-negative number of seconds that fits in a `Duration`.
fn seconds(key: &str, value: f64) -> Result<Duration> {
    if value < 0.0 {
        return Err(DpError::ConfigInvalid(format!(
            "{key} must be a non-negative number of seconds, got {value}"
        )));
    }
    Duration::try_from_secs_f64(value)
        .map_err(|e| DpError::ConfigInvalid(format!("{key} = {value} is not a usable interval: {e}")))
}
