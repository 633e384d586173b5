//! Robot mode JSON output implementation.

use std::path::Path;

use serde::Serialize;
use serde_json::json;
use tracing::{debug, instrument, trace, warn};

use super::{Output, PreviewReport, QUICK_START, RobotFormat, VersionInfo};
use crate::comm::ExternalCommandMessage;
use crate::device::DeviceInfo;
use crate::error::DpError;
use crate::panel::PanelTree;
use crate::plugins::PluginReport;

/// JSON output implementation for agents and scripting.
pub struct RobotOutput {
    format: RobotFormat,
}

impl RobotOutput {
    #[instrument]
    pub fn new(format: RobotFormat) -> Self {
        debug!(?format, "Creating RobotOutput");
        Self { format }
    }

    /// Serialize according to the selected format.
    pub fn render<T: Serialize + ?Sized>(&self, data: &T) -> serde_json::Result<String> {
        match self.format {
            RobotFormat::Json => serde_json::to_string_pretty(data),
            RobotFormat::JsonCompact => serde_json::to_string(data),
        }
    }

    #[instrument(skip(self, data), fields(format = ?self.format))]
    fn output_json<T: Serialize + ?Sized>(&self, data: &T) {
        match self.render(data) {
            Ok(json) => {
                trace!(json_len = json.len(), "JSON serialized");
                println!("{json}");
            }
            Err(e) => warn!(error = %e, "Failed to serialize output"),
        }
    }

    /// Errors always go to stderr as pretty JSON.
    fn output_json_stderr<T: Serialize>(&self, data: &T) {
        match serde_json::to_string_pretty(data) {
            Ok(json) => eprintln!("{json}"),
            Err(e) => warn!(error = %e, "Failed to serialize error"),
        }
    }
}

/// Robot representation of an error.
pub fn error_json(error: &DpError) -> serde_json::Value {
    json!({
        "error": true,
        "message": error.to_string(),
        "suggestion": error.suggestion(),
        "recoverable": error.is_user_recoverable(),
    })
}

impl Output for RobotOutput {
    fn success(&self, message: &str) {
        self.output_json(&json!({ "success": true, "message": message }));
    }

    #[instrument(skip(self))]
    fn error(&self, error: &DpError) {
        debug!(error = %error, "Robot: error");
        self.output_json_stderr(&error_json(error));
    }

    fn warning(&self, message: &str) {
        self.output_json(&json!({ "warning": true, "message": message }));
    }

    fn info(&self, message: &str) {
        self.output_json(&json!({ "info": true, "message": message }));
    }

    #[instrument(skip(self, devices), fields(count = devices.len()))]
    fn device_list(&self, devices: &[DeviceInfo]) {
        self.output_json(devices);
    }

    #[instrument(skip(self, info), fields(serial = %info.serial))]
    fn device_info(&self, info: &DeviceInfo) {
        self.output_json(info);
    }

    fn plugin_report(&self, directory: &Path, report: &PluginReport) {
        self.output_json(&json!({
            "directory": directory,
            "loaded": report.loaded,
            "failed": report.failed,
            "skipped": report.skipped,
        }));
    }

    fn panel_tree(&self, tree: &PanelTree) {
        self.output_json(tree);
    }

    fn config_dump(&self, path: &Path, table: &toml::Table) {
        self.output_json(&json!({ "path": path, "config": table }));
    }

    fn config_value(&self, key: &str, value: &toml::Value) {
        self.output_json(&json!({ "key": key, "value": value }));
    }

    fn config_updated(&self, key: &str, value: &toml::Value, path: &Path) {
        self.output_json(&json!({
            "key": key,
            "value": value,
            "path": path,
            "ok": true,
        }));
    }

    fn command_response(&self, reply: &ExternalCommandMessage) {
        self.output_json(&reply.to_value());
    }

    fn preview_written(&self, report: &PreviewReport) {
        self.output_json(report);
    }

    fn version_info(&self, info: &VersionInfo) {
        self.output_json(info);
    }

    fn quick_start(&self) {
        let commands: Vec<_> = QUICK_START
            .iter()
            .map(|(command, description)| json!({ "command": command, "description": description }))
            .collect();
        self.output_json(&json!({
            "name": "deckpilot",
            "version": env!("CARGO_PKG_VERSION"),
            "commands": commands,
        }));
    }
}
