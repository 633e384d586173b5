//! Theme system for human-mode output.

use console::Style;

/// Visual theme for DeckPilot human-mode output.
///
/// Centralizes colors and styles for consistent rendering.
#[derive(Debug, Clone)]
pub struct DpTheme {
    pub accent: Style,
    pub success: Style,
    pub error: Style,
    pub warning: Style,
    pub muted: Style,

    pub header: Style,
    pub label: Style,
    pub value: Style,
    pub key_index: Style,
    pub device_serial: Style,
    pub panel: Style,
    pub button: Style,
}

impl Default for DpTheme {
    fn default() -> Self {
        Self {
            accent: Style::new().color256(33).bold(),
            success: Style::new().green().bold(),
            error: Style::new().red().bold(),
            warning: Style::new().color256(214).bold(),
            muted: Style::new().color256(244),
            header: Style::new().color256(33).bold().underlined(),
            label: Style::new().dim(),
            value: Style::new().bold(),
            key_index: Style::new().color256(214).bold(),
            device_serial: Style::new().color256(244).italic(),
            panel: Style::new().cyan().bold(),
            button: Style::new(),
        }
    }
}
