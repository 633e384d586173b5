//! Output mode abstraction for robot and human output.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::cli::Cli;
use crate::comm::ExternalCommandMessage;
use crate::device::DeviceInfo;
use crate::error::DpError;
use crate::panel::PanelTree;
use crate::plugins::PluginReport;

pub mod human;
pub mod robot;

pub use human::HumanOutput;
pub use robot::RobotOutput;

/// One key image written by `preview`.
#[derive(Debug, Clone, Serialize)]
pub struct PreviewKey {
    pub key: u8,
    pub path: PathBuf,
    /// PNG bytes, base64 encoded, when `--inline` was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub png_base64: Option<String>,
}

/// Summary of a `preview` run.
#[derive(Debug, Clone, Serialize)]
pub struct PreviewReport {
    pub model: String,
    pub panel: String,
    pub page: usize,
    pub pages: usize,
    pub directory: PathBuf,
    pub keys: Vec<PreviewKey>,
}

/// Build metadata shown by `version`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VersionInfo {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rustc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl VersionInfo {
    /// Values baked in by the build script.
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            git_sha: option_env!("VERGEN_GIT_SHA").map(str::to_string),
            build_time: option_env!("VERGEN_BUILD_TIMESTAMP").map(str::to_string),
            rustc: option_env!("VERGEN_RUSTC_SEMVER").map(str::to_string),
            target: option_env!("VERGEN_CARGO_TARGET_TRIPLE").map(str::to_string),
        }
    }
}

/// JSON formatting options for robot mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotFormat {
    /// Pretty-printed JSON (default for --robot).
    Json,
    /// Single-line JSON (--format=json-compact).
    JsonCompact,
}

/// Determines how command output is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Robot(RobotFormat),
    Human { color: bool },
}

impl OutputMode {
    pub const fn from_cli(cli: &Cli) -> Self {
        if cli.use_json() {
            let format = if cli.use_compact_json() {
                RobotFormat::JsonCompact
            } else {
                RobotFormat::Json
            };
            Self::Robot(format)
        } else {
            Self::Human { color: !cli.no_color }
        }
    }

    pub const fn is_robot(&self) -> bool {
        matches!(self, Self::Robot(_))
    }

    pub fn into_output(self) -> Box<dyn Output> {
        match self {
            Self::Robot(format) => Box::new(RobotOutput::new(format)),
            Self::Human { color } => Box::new(HumanOutput::new(color)),
        }
    }
}

/// Trait for all output operations.
///
/// Commands call these methods without knowing the output mode.
pub trait Output {
    fn success(&self, message: &str);
    fn error(&self, error: &DpError);
    fn warning(&self, message: &str);
    fn info(&self, message: &str);

    fn device_list(&self, devices: &[DeviceInfo]);
    fn device_info(&self, info: &DeviceInfo);

    fn plugin_report(&self, directory: &Path, report: &PluginReport);
    fn panel_tree(&self, tree: &PanelTree);

    fn config_dump(&self, path: &Path, table: &toml::Table);
    fn config_value(&self, key: &str, value: &toml::Value);
    fn config_updated(&self, key: &str, value: &toml::Value, path: &Path);

    /// Reply received from a running instance.
    fn command_response(&self, reply: &ExternalCommandMessage);
    fn preview_written(&self, report: &PreviewReport);

    fn version_info(&self, info: &VersionInfo);
    /// Shown when no command is given.
    fn quick_start(&self);
}

/// Commands listed by the quick-start screen.
pub const QUICK_START: &[(&str, &str)] = &[
    ("deckpilot start --use-simulator", "Run the panel tree on a simulated deck"),
    ("deckpilot devices", "List connected decks"),
    ("deckpilot tree --root config/root", "Show the panel structure"),
    ("deckpilot preview --out previews", "Render the root page to PNG files"),
    ("deckpilot plugins", "List plugins and their load status"),
    ("deckpilot shell echo", "Ping a running instance"),
    ("deckpilot config get streamdeck.brightness", "Read a config value"),
];
