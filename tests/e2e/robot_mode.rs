//! Robot-mode end-to-end tests.

use serde_json::{Value, json};

use crate::common::cli::CliRunner;
use crate::common::fixtures::Workspace;
use crate::common::init_test_logging;

#[test]
fn robot_quick_start_lists_commands() {
    init_test_logging();
    let result = CliRunner::new().run(&["--robot"]);
    result
        .assert_success()
        .assert_json_field("/name", &json!("deckpilot"));
    let commands = result.json()["commands"].as_array().cloned().unwrap();
    assert!(commands.iter().any(|c| c["command"] == "deckpilot devices"));
}

#[test]
fn robot_simulated_devices() {
    let result = CliRunner::new().run_robot(&["devices", "--use-simulator"]);
    result
        .assert_success()
        .assert_json_array_len("", 4)
        .assert_json_field("/0/serial", &json!("SIM-ORIGINAL-001"))
        .assert_json_field("/1/key_count", &json!(6));
}

#[test]
fn robot_devices_from_simulator_config() {
    let ws = Workspace::new();
    let sim = ws.file(
        "sim.toml",
        "[[devices]]\ntype = \"xl\"\nserial = \"DESK-XL\"\n\n[[devices]]\ntype = \"mini\"\n",
    );
    let sim = sim.to_string_lossy().to_string();
    let result = CliRunner::new().run_robot(&[
        "devices",
        "--use-simulator",
        "--simulator-config",
        &sim,
    ]);
    result
        .assert_success()
        .assert_json_array_len("", 2)
        .assert_json_field("/0/serial", &json!("DESK-XL"))
        .assert_json_field("/0/key_count", &json!(32))
        .assert_json_field("/1/serial", &json!("SIM-MINI-002"));
}

#[test]
fn robot_show_by_serial() {
    CliRunner::new()
        .run_robot(&["show", "--use-simulator", "--serial", "SIM-MINI-001"])
        .assert_success()
        .assert_json_field("/serial", &json!("SIM-MINI-001"))
        .assert_json_field("/key_count", &json!(6));
}

#[test]
fn robot_error_goes_to_stderr_with_suggestion() {
    let result = CliRunner::new().run_robot(&["show", "--use-simulator"]);
    result.assert_exit_code(1);
    assert!(result.stdout.trim().is_empty());
    let error = result.stderr_json();
    assert_eq!(error["error"], Value::Bool(true));
    assert_eq!(error["recoverable"], Value::Bool(true));
    assert_eq!(error["suggestion"], json!("Provide either --index or --serial"));
}

#[test]
fn robot_index_out_of_range() {
    let result = CliRunner::new().run_robot(&["show", "--use-simulator", "--index", "9"]);
    result.assert_exit_code(1);
    let error = result.stderr_json();
    assert!(error["message"].as_str().unwrap().contains("out of range"));
    assert_eq!(error["suggestion"], json!("Run: deckpilot devices"));
}

#[test]
fn robot_version_and_compact_format() {
    let result = CliRunner::new().run(&["--format", "json-compact", "version"]);
    result.assert_success();
    assert_eq!(result.stdout.trim_end().lines().count(), 1);
    assert_eq!(result.json()["version"], json!(env!("CARGO_PKG_VERSION")));
}

#[test]
fn robot_shell_without_instance_fails_cleanly() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .map(|a| a.port())
        .unwrap()
        .to_string();
    let result = CliRunner::new().run_robot(&["shell", "--port", &port, "--timeout", "1", "echo"]);
    result.assert_exit_code(1);
    let error = result.stderr_json();
    assert!(error["message"].as_str().unwrap().contains("Could not reach DeckPilot"));
}

#[test]
fn robot_shell_rejects_unusable_numbers_before_connecting() {
    let runner = CliRunner::new();
    let timeout = runner.run_robot(&["shell", "--port", "1", "--timeout", "1e30", "echo"]);
    timeout.assert_exit_code(1);
    assert!(timeout.stderr_json()["message"].as_str().unwrap().contains("timeout"));

    let push = runner.run_robot(&["shell", "--port", "1", "push", "0", "--duration", "1e20"]);
    push.assert_exit_code(1);
    assert!(push.stderr_json()["message"].as_str().unwrap().contains("at most"));
}

#[test]
fn robot_bad_log_filter_is_rejected() {
    let result = CliRunner::new().run_robot(&["--log-filter", "colour=red", "version"]);
    result.assert_exit_code(2);
    assert!(result.stderr_json()["message"]
        .as_str()
        .unwrap()
        .contains("Invalid log filter"));
}
