//! Human-mode end-to-end tests.

use predicates::prelude::*;

use crate::common::cli::CliRunner;
use crate::common::fixtures::Workspace;

#[test]
fn human_quick_start_mentions_help() {
    CliRunner::new()
        .assert_cmd(&["--no-color"])
        .assert()
        .success()
        .stdout(predicate::str::contains("DeckPilot"))
        .stdout(predicate::str::contains("deckpilot --help"));
}

#[test]
fn human_devices_table() {
    CliRunner::new()
        .assert_cmd(&["--no-color", "devices", "--use-simulator"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Connected decks"))
        .stdout(predicate::str::contains("[1]"))
        .stdout(predicate::str::contains("SIM-MINI-001"))
        .stdout(predicate::str::contains("6 keys, 3x2"));
}

#[test]
fn human_error_has_hint_and_no_ansi() {
    CliRunner::new()
        .assert_cmd(&["--no-color", "show", "--use-simulator"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("[ERR] No device selected"))
        .stderr(predicate::str::contains("hint: Provide either --index or --serial"))
        .stderr(predicate::str::contains("\u{1b}[").not());
}

#[test]
fn human_tree_draws_branches() {
    let ws = Workspace::new();
    let root = ws.sample_tree();
    let root = root.to_string_lossy().to_string();
    CliRunner::new()
        .assert_cmd(&["--no-color", "tree", "--root", &root])
        .assert()
        .success()
        .stdout(predicate::str::contains("root *"))
        .stdout(predicate::str::contains("├── hello [message]"))
        .stdout(predicate::str::contains("apps (page 1/1)"))
        .stdout(predicate::str::contains("└── clock [clock]"));
}

#[test]
fn human_help_lists_commands() {
    CliRunner::new()
        .assert_cmd(&["--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("preview"))
        .stdout(predicate::str::contains("shell"));
}

#[test]
fn completions_for_bash() {
    CliRunner::new()
        .assert_cmd(&["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("deckpilot"));
}
