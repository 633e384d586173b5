//! Environment variables that stand in for global flags.

use serde_json::json;

use crate::common::cli::CliRunner;
use crate::common::fixtures::Workspace;

#[test]
fn format_from_environment() {
    let result = CliRunner::new()
        .with_env("DECKPILOT_FORMAT", "json")
        .run(&["devices", "--use-simulator"]);
    result.assert_success().assert_json_array_len("", 4);

    let compact = CliRunner::new()
        .with_env("DECKPILOT_FORMAT", "json-compact")
        .run(&["devices", "--use-simulator"]);
    compact.assert_success();
    assert_eq!(compact.stdout.trim_end().lines().count(), 1);
}

#[test]
fn format_flag_beats_environment() {
    CliRunner::new()
        .with_env("DECKPILOT_FORMAT", "json")
        .run(&["--format", "text", "--no-color", "devices", "--use-simulator"])
        .assert_success()
        .assert_stdout_contains("Connected decks");
}

#[test]
fn config_path_from_environment() {
    let ws = Workspace::new();
    let file = ws.file("elsewhere.toml", "[streamdeck]\nbrightness = 70\n");
    CliRunner::new()
        .with_env("DECKPILOT_CONFIG", &file.to_string_lossy())
        .run_robot(&["config", "get", "streamdeck.brightness"])
        .assert_success()
        .assert_json_field("/value", &json!(70));
}

#[test]
fn serial_from_environment() {
    CliRunner::new()
        .with_env("DECKPILOT_SERIAL", "SIM-XL-001")
        .run_robot(&["show", "--use-simulator"])
        .assert_success()
        .assert_json_field("/key_count", &json!(32));
}

#[test]
fn no_color_from_environment() {
    let result = CliRunner::new()
        .with_env("NO_COLOR", "1")
        .run(&["devices", "--use-simulator"]);
    result.assert_success();
    assert!(!result.stdout.contains('\u{1b}'), "{}", result.stdout);
}
