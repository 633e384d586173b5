//! Human-friendly output implementation using console.

use std::fmt::Display;
use std::path::Path;

use console::Term;
use tracing::{debug, instrument, trace};

use super::{Output, PreviewReport, QUICK_START, VersionInfo};
use crate::comm::ExternalCommandMessage;
use crate::device::DeviceInfo;
use crate::error::DpError;
use crate::panel::PanelTree;
use crate::plugins::PluginReport;
use crate::theme::DpTheme;

/// Styled terminal output implementation for human users.
pub struct HumanOutput {
    out: Term,
    err: Term,
    theme: DpTheme,
}

impl HumanOutput {
    #[instrument]
    pub fn new(color: bool) -> Self {
        debug!("Creating HumanOutput");
        if !color {
            console::set_colors_enabled(false);
            console::set_colors_enabled_stderr(false);
        }
        Self {
            out: Term::stdout(),
            err: Term::stderr(),
            theme: DpTheme::default(),
        }
    }

    fn line(&self, text: impl Display) {
        let _ = self.out.write_line(&text.to_string());
    }

    fn field(&self, label: &str, value: impl Display) {
        self.line(format_args!(
            "  {} {}",
            self.theme.label.apply_to(format!("{label:<12}")),
            self.theme.value.apply_to(value)
        ));
    }

    fn tree_node(&self, tree: &PanelTree, prefix: &str, last: bool, root: bool) {
        let (branch, child_prefix) = if root {
            (String::new(), String::new())
        } else if last {
            (format!("{prefix}└── "), format!("{prefix}    "))
        } else {
            (format!("{prefix}├── "), format!("{prefix}│   "))
        };
        let marker = if tree.active { " *" } else { "" };
        self.line(format_args!(
            "{branch}{}{} {}",
            self.theme.panel.apply_to(&tree.name),
            self.theme.success.apply_to(marker),
            self.theme
                .muted
                .apply_to(format!("(page {}/{})", tree.current_page + 1, tree.pages))
        ));

        let total = tree.items.len();
        let mut children = tree.children.iter();
        for (i, item) in tree.items.iter().enumerate() {
            let last_item = i + 1 == total;
            if item.kind == "panel" {
                if let Some(child) = children.next() {
                    self.tree_node(child, &child_prefix, last_item, false);
                    continue;
                }
            }
            let connector = if last_item { "└── " } else { "├── " };
            let class = item
                .class
                .as_deref()
                .map(|c| format!(" [{c}]"))
                .unwrap_or_default();
            self.line(format_args!(
                "{child_prefix}{connector}{}{}",
                self.theme.button.apply_to(&item.name),
                self.theme.muted.apply_to(class)
            ));
        }
    }
}

impl Output for HumanOutput {
    fn success(&self, message: &str) {
        self.line(format_args!("{} {message}", self.theme.success.apply_to("[OK]")));
    }

    #[instrument(skip(self))]
    fn error(&self, error: &DpError) {
        debug!(
            error = %error,
            recoverable = error.is_user_recoverable(),
            "Outputting error"
        );
        let _ = self.err.write_line(&format!(
            "{} {}",
            self.theme.error.apply_to("[ERR]"),
            self.theme.value.apply_to(error)
        ));
        if let Some(suggestion) = error.suggestion() {
            trace!(suggestion, "Adding suggestion");
            let _ = self.err.write_line(&format!(
                "      {} {}",
                self.theme.label.apply_to("hint:"),
                self.theme.muted.apply_to(suggestion)
            ));
        }
    }

    fn warning(&self, message: &str) {
        self.line(format_args!("{} {message}", self.theme.warning.apply_to("[WARN]")));
    }

    fn info(&self, message: &str) {
        self.line(format_args!("{} {message}", self.theme.accent.apply_to("[INFO]")));
    }

    #[instrument(skip(self, devices), fields(device_count = devices.len()))]
    fn device_list(&self, devices: &[DeviceInfo]) {
        if devices.is_empty() {
            self.warning("No Stream Deck devices found");
            return;
        }
        self.line(self.theme.header.apply_to("Connected decks"));
        for (idx, device) in devices.iter().enumerate() {
            self.line(format_args!(
                "  {} {} {} {}",
                self.theme.key_index.apply_to(format!("[{idx}]")),
                self.theme.value.apply_to(&device.product_name),
                self.theme.device_serial.apply_to(&device.serial),
                self.theme.muted.apply_to(format!(
                    "{} keys, {}x{}",
                    device.key_count, device.cols, device.rows
                ))
            ));
        }
    }

    #[instrument(skip(self, info), fields(serial = %info.serial))]
    fn device_info(&self, info: &DeviceInfo) {
        self.line(self.theme.header.apply_to(&info.product_name));
        self.field("Id", &info.id);
        self.field("Serial", &info.serial);
        self.field("Model", &info.kind);
        self.field("Firmware", &info.firmware_version);
        self.field(
            "Keys",
            format_args!("{} ({}x{})", info.key_count, info.cols, info.rows),
        );
        self.field(
            "Key image",
            format_args!("{}x{}", info.key_width, info.key_height),
        );
        self.field(
            "USB",
            format_args!("{:04x}:{:04x}", info.vendor_id, info.product_id),
        );
        self.field("Connected", info.connected);
    }

    #[instrument(skip(self, report))]
    fn plugin_report(&self, directory: &Path, report: &PluginReport) {
        self.line(format_args!(
            "{} {}",
            self.theme.header.apply_to("Plugins"),
            self.theme.muted.apply_to(directory.display())
        ));
        if report.is_empty() {
            self.info("No plugins found");
            return;
        }
        for plugin in &report.loaded {
            let panels = if plugin.panels.is_empty() {
                String::new()
            } else {
                format!(" panels: {}", plugin.panels.join(", "))
            };
            self.line(format_args!(
                "  {} {} {}{}",
                self.theme.success.apply_to("loaded "),
                self.theme.value.apply_to(&plugin.name),
                self.theme.muted.apply_to(format!("v{}", plugin.version)),
                self.theme.muted.apply_to(panels)
            ));
        }
        for failed in &report.failed {
            let name = failed
                .name
                .clone()
                .unwrap_or_else(|| failed.directory.display().to_string());
            self.line(format_args!(
                "  {} {} {}",
                self.theme.error.apply_to("failed "),
                self.theme.value.apply_to(name),
                self.theme.muted.apply_to(&failed.reason)
            ));
        }
        for skipped in &report.skipped {
            self.line(format_args!(
                "  {} {}",
                self.theme.warning.apply_to("skipped"),
                self.theme.muted.apply_to(skipped.display())
            ));
        }
    }

    fn panel_tree(&self, tree: &PanelTree) {
        self.tree_node(tree, "", true, true);
    }

    fn config_dump(&self, path: &Path, table: &toml::Table) {
        self.line(format_args!(
            "{} {}",
            self.theme.header.apply_to("Configuration file:"),
            path.display()
        ));
        match toml::to_string_pretty(table) {
            Ok(text) => self.line(text.trim_end()),
            Err(e) => self.warning(&format!("Cannot render configuration: {e}")),
        }
    }

    fn config_value(&self, key: &str, value: &toml::Value) {
        match value {
            toml::Value::Table(table) => match toml::to_string_pretty(table) {
                Ok(text) => self.line(text.trim_end()),
                Err(_) => self.line(value),
            },
            toml::Value::String(s) => self.line(s),
            other => self.line(other),
        }
        trace!(key, "Printed config value");
    }

    fn config_updated(&self, key: &str, value: &toml::Value, path: &Path) {
        self.success(&format!(
            "Updated {} = {value} in {}",
            self.theme.value.apply_to(key),
            path.display()
        ));
    }

    fn command_response(&self, reply: &ExternalCommandMessage) {
        match reply {
            ExternalCommandMessage::Pong { message, echo } => match echo {
                Some(echo) => self.success(&format!("{message} ({echo})")),
                None => self.success(message),
            },
            ExternalCommandMessage::PushAck {
                key,
                duration,
                success: true,
                ..
            } => self.success(&format!("Pushed key {key} for {duration}s")),
            ExternalCommandMessage::PushAck { key, error, .. } => self.warning(&format!(
                "Push of key {key} refused: {}",
                error.as_deref().unwrap_or("unknown error")
            )),
            ExternalCommandMessage::Error { message } => self.warning(message),
            other => self.info(&other.to_json()),
        }
    }

    fn preview_written(&self, report: &PreviewReport) {
        self.success(&format!(
            "Rendered {} keys of {} page {}/{} ({}) to {}",
            report.keys.len(),
            report.panel,
            report.page + 1,
            report.pages,
            report.model,
            report.directory.display()
        ));
    }

    fn version_info(&self, info: &VersionInfo) {
        self.line(self.theme.header.apply_to("deckpilot"));
        self.field("Version", &info.version);
        if let Some(sha) = &info.git_sha {
            let dirty = matches!(option_env!("VERGEN_GIT_DIRTY"), Some("true"));
            let suffix = if dirty { " (dirty)" } else { "" };
            self.field("Git SHA", format_args!("{sha}{suffix}"));
        }
        if let Some(time) = &info.build_time {
            self.field("Built", time);
        }
        if let Some(rustc) = &info.rustc {
            self.field("Rust", rustc);
        }
        if let Some(target) = &info.target {
            self.field("Target", target);
        }
    }

    fn quick_start(&self) {
        self.line(format_args!(
            "{} {}",
            self.theme.header.apply_to("DeckPilot"),
            self.theme.muted.apply_to("Stream Deck automation")
        ));
        self.line("");
        for (command, description) in QUICK_START {
            self.line(format_args!(
                "  {:<46} {}",
                self.theme.accent.apply_to(command),
                self.theme.muted.apply_to(description)
            ));
        }
        self.line("");
        self.line(self.theme.label.apply_to("Run `deckpilot --help` for every option."));
    }
}
