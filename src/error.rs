//! Error types for DeckPilot.

use thiserror::Error;

/// Primary error type for DeckPilot operations.
#[derive(Error, Debug)]
pub enum DpError {
    // Device errors
    #[error("No Stream Deck devices found")]
    NoDevicesFound,

    #[error("Device not found: {serial}")]
    DeviceNotFound { serial: String },

    #[error("Device index {index} out of range: {count} device(s) available")]
    DeviceIndexOutOfRange { index: usize, count: usize },

    #[error("No device selected: provide either --index or --serial")]
    NoDeviceSelector,

    #[error("Failed to open device '{serial}': {reason}")]
    DeviceOpenFailed { serial: String, reason: String },

    #[error("Device communication error: {0}")]
    DeviceCommunication(String),

    #[error("Device '{serial}' is closed")]
    DeviceClosed { serial: String },

    #[error("Invalid key index {index}: device has {max} keys")]
    InvalidKeyIndex { index: usize, max: u8 },

    #[error("Invalid brightness value {value}: must be 0-100")]
    InvalidBrightness { value: i64 },

    // Simulator errors
    #[error("Simulator configuration error: {0}")]
    SimulatorConfig(String),

    // Rendering and asset errors
    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    #[error("Image file not found: {path}")]
    ImageNotFound { path: String },

    #[error("Failed to load font '{name}': {reason}")]
    FontLoad { name: String, reason: String },

    #[error("Invalid color '{0}': expected 6 hex digits (e.g. ff0000)")]
    InvalidColor(String),

    // Panel errors
    #[error("Failed to load panel '{panel}': {reason}")]
    PanelLoad { panel: String, reason: String },

    #[error("Panel '{panel}' already contains an item named '{name}'")]
    DuplicateItem { panel: String, name: String },

    #[error("Panel not found: {path}")]
    PanelNotFound { path: String },

    #[error("Deck with {capacity} keys is too small for paging (need at least 3)")]
    LayoutTooSmall { capacity: usize },

    // Plugin errors
    #[error("Invalid plugin manifest {path}: {reason}")]
    PluginManifest { path: String, reason: String },

    #[error("Invalid entry point '{entry_point}': expected 'module:factory'")]
    InvalidEntryPoint { entry_point: String },

    #[error("Unknown plugin entry point '{entry_point}'")]
    UnknownEntryPoint { entry_point: String },

    #[error("Plugin '{plugin}' failed: {reason}")]
    Plugin { plugin: String, reason: String },

    // Configuration errors
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("Configuration parse error: {0}")]
    ConfigParse(String),

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Configuration key not found: {key}")]
    ConfigKeyNotFound { key: String },

    #[error("Cannot set '{key}': {reason}")]
    ConfigValue { key: String, reason: String },

    // External command errors
    #[error("Invalid command message: {0}")]
    CommandMessage(String),

    #[error("Command server failed on {addr}: {reason}")]
    CommandServer { addr: String, reason: String },

    #[error("Could not reach DeckPilot at {addr}: {reason}")]
    CommandConnect { addr: String, reason: String },

    // Logging errors
    #[error("Invalid log filter '{spec}': {reason}")]
    InvalidLogFilter { spec: String, reason: String },

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl DpError {
    /// Returns true if the error is recoverable by the user.
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NoDevicesFound
                | Self::DeviceNotFound { .. }
                | Self::DeviceIndexOutOfRange { .. }
                | Self::NoDeviceSelector
                | Self::InvalidKeyIndex { .. }
                | Self::InvalidBrightness { .. }
                | Self::ImageNotFound { .. }
                | Self::InvalidColor(_)
                | Self::SimulatorConfig(_)
                | Self::PanelNotFound { .. }
                | Self::ConfigNotFound { .. }
                | Self::ConfigInvalid(_)
                | Self::ConfigKeyNotFound { .. }
                | Self::ConfigValue { .. }
                | Self::CommandConnect { .. }
                | Self::InvalidLogFilter { .. }
        )
    }

    /// Returns true for failures that a reconnect attempt may fix.
    pub const fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::NoDevicesFound | Self::DeviceOpenFailed { .. } | Self::DeviceCommunication(_)
        )
    }

    /// Returns a suggestion for how to fix the error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::NoDevicesFound => {
                Some("Ensure the Stream Deck is connected via USB, or pass --use-simulator")
            }
            Self::NoDeviceSelector => Some("Provide either --index or --serial"),
            Self::DeviceIndexOutOfRange { .. } => Some("Run: deckpilot devices"),
            Self::InvalidBrightness { .. } => Some("Use a value between 0 and 100"),
            Self::ConfigNotFound { .. } => {
                Some("Create the file or pass --config <PATH>")
            }
            Self::ConfigKeyNotFound { .. } => Some("Run: deckpilot config"),
            Self::CommandConnect { .. } => Some("Start DeckPilot first: deckpilot start"),
            Self::InvalidLogFilter { .. } => {
                Some("Use field=regex pairs, e.g. type=INFO|WARNING,source=panel")
            }
            Self::LayoutTooSmall { .. } => Some("Use a deck with at least 3 keys"),
            _ => None,
        }
    }
}

/// Convenience type alias for Results using DpError.
pub type Result<T> = std::result::Result<T, DpError>;

/// Extension trait for adding context to errors.
pub trait ResultExt<T> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| DpError::Other(format!("{}: {e}", f().into())))
    }
}
