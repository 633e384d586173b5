//! Commands that work without a deck: tree, preview, plugins and config.

use predicates::prelude::*;
use serde_json::json;

use crate::common::cli::CliRunner;
use crate::common::fixtures::{Item, Workspace, panel_plugin_manifest, write_items};

fn lossy(path: &std::path::Path) -> String {
    path.to_string_lossy().to_string()
}

#[test]
fn tree_reports_structure() {
    let ws = Workspace::new();
    let root = lossy(&ws.sample_tree());
    let result = CliRunner::new().run_robot(&["tree", "--root", &root]);
    result
        .assert_success()
        .assert_json_field("/name", &json!("root"))
        .assert_json_field("/active", &json!(true))
        .assert_json_array_len("/items", 3)
        .assert_json_field("/items/0/class", &json!("message"))
        .assert_json_field("/items/1/kind", &json!("panel"))
        .assert_json_field("/children/0/path", &json!("/apps"))
        .assert_json_array_len("/children/0/items", 2);
}

#[test]
fn tree_paginates_for_the_chosen_model() {
    let ws = Workspace::new();
    let root = lossy(&ws.flat_tree(20));
    CliRunner::new()
        .run_robot(&["tree", "--root", &root, "--model", "mini"])
        .assert_success()
        .assert_json_field("/pages", &json!(5));
    CliRunner::new()
        .run_robot(&["tree", "--root", &root, "--model", "xl"])
        .assert_success()
        .assert_json_field("/pages", &json!(1));
    CliRunner::new()
        .run_robot(&["tree", "--root", &root, "--model", "plus"])
        .assert_success()
        .assert_json_field("/pages", &json!(3));
}

#[test]
fn tree_with_missing_root_fails() {
    let ws = Workspace::new();
    let missing = lossy(&ws.join("nowhere"));
    let result = CliRunner::new().run_robot(&["tree", "--root", &missing]);
    result.assert_exit_code(1);
    assert!(result.stderr_json()["message"]
        .as_str()
        .unwrap()
        .contains("does not exist"));
}

#[test]
fn preview_writes_one_png_per_key() {
    let ws = Workspace::new();
    let root = lossy(&ws.sample_tree());
    let out = ws.join("previews");
    let result = CliRunner::new().run_robot(&["preview", "--root", &root, "--out", &lossy(&out)]);
    result
        .assert_success()
        .assert_json_field("/panel", &json!("/"))
        .assert_json_field("/model", &json!("Stream Deck (Original)"))
        .assert_json_array_len("/keys", 15);
    for key in 0..15 {
        let file = out.join(format!("key-{key}.png"));
        let image = image::open(&file).unwrap_or_else(|e| panic!("{}: {e}", file.display()));
        assert_eq!(image.width(), 72);
    }
    assert!(result.json()["keys"][0].get("png_base64").is_none());
}

#[test]
fn preview_inline_and_sub_panel() {
    let ws = Workspace::new();
    let root = lossy(&ws.sample_tree());
    let out = lossy(&ws.join("apps"));
    let result = CliRunner::new().run_robot(&[
        "preview", "--root", &root, "--panel", "/apps", "--model", "mini", "--out", &out,
        "--inline",
    ]);
    result
        .assert_success()
        .assert_json_field("/panel", &json!("/apps"))
        .assert_json_array_len("/keys", 6);
    let encoded = result.json()["keys"][0]["png_base64"]
        .as_str()
        .map(str::to_string)
        .expect("inline PNG missing");
    use base64::Engine as _;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .unwrap();
    assert_eq!(&bytes[1..4], b"PNG");
}

#[test]
fn preview_rejects_unknown_panel_and_page() {
    let ws = Workspace::new();
    let root = lossy(&ws.sample_tree());
    let out = lossy(&ws.join("out"));
    let runner = CliRunner::new();

    let result = runner.run_robot(&["preview", "--root", &root, "--panel", "/nope", "--out", &out]);
    result.assert_exit_code(1);
    assert!(result.stderr_json()["message"]
        .as_str()
        .unwrap()
        .contains("Panel not found"));

    let result = runner.run_robot(&["preview", "--root", &root, "--page", "3", "--out", &out]);
    result.assert_exit_code(1);
    assert!(result.stderr_json()["message"]
        .as_str()
        .unwrap()
        .contains("panel has 1"));
}

#[test]
fn plugins_lists_loaded_and_failed() {
    let ws = Workspace::new();
    ws.plugin("broken", "name: broken\nentry_point: \"nowhere:Thing\"\n");
    let plugins = ws.plugin("weather", &panel_plugin_manifest("weather", "forecast"));
    write_items(&plugins.join("weather/panel"), &[Item::button("today")]);

    let result = CliRunner::new().run_robot(&["plugins", "--path", &lossy(&plugins)]);
    result
        .assert_success()
        .assert_json_array_len("/loaded", 1)
        .assert_json_field("/loaded/0/name", &json!("weather"))
        .assert_json_field("/loaded/0/panels", &json!(["forecast"]))
        .assert_json_array_len("/failed", 1)
        .assert_json_field("/failed/0/name", &json!("broken"));
}

#[test]
fn plugins_without_directory_is_empty() {
    let ws = Workspace::new();
    let missing = lossy(&ws.join("plugins"));
    CliRunner::new()
        .assert_cmd(&["--no-color", "plugins", "--path", &missing])
        .assert()
        .success()
        .stdout(predicate::str::contains("No plugins found"));
}

#[test]
fn config_without_file_is_not_found() {
    let result = CliRunner::new().run_robot(&["config"]);
    result.assert_exit_code(1);
    let error = result.stderr_json();
    assert!(error["message"]
        .as_str()
        .unwrap()
        .contains("Configuration file not found"));
    assert_eq!(error["suggestion"], json!("Create the file or pass --config <PATH>"));
}

#[test]
fn config_set_then_get_in_default_location() {
    let runner = CliRunner::new();
    let file = runner.default_config_file();
    std::fs::create_dir_all(file.parent().unwrap()).unwrap();
    std::fs::write(&file, "[streamdeck]\nbrightness = 30\n").unwrap();

    runner
        .run_robot(&["config", "set", "streamdeck.brightness", "55"])
        .assert_success()
        .assert_json_field("/value", &json!(55))
        .assert_json_field("/ok", &json!(true));
    runner
        .run_robot(&["config", "get", "streamdeck.brightness"])
        .assert_success()
        .assert_json_field("/value", &json!(55));

    let text = std::fs::read_to_string(&file).unwrap();
    assert!(text.contains("brightness = 55"), "{text}");
}

#[test]
fn config_set_refuses_invalid_values() {
    let ws = Workspace::new();
    let file = ws.file("deck.toml", "[streamdeck]\nbrightness = 30\n");
    let path = lossy(&file);
    let runner = CliRunner::new();

    let result = runner.run_robot(&["--config", &path, "config", "set", "streamdeck.brightness", "250"]);
    result.assert_exit_code(1);
    let result = runner.run_robot(&["--config", &path, "config", "set", "streamdeck.brightness", "bright"]);
    result.assert_exit_code(1);

    assert_eq!(
        std::fs::read_to_string(&file).unwrap(),
        "[streamdeck]\nbrightness = 30\n"
    );
    runner
        .run_robot(&["--config", &path, "config", "get", "streamdeck.missing"])
        .assert_exit_code(1);
}

#[test]
fn config_dump_in_human_mode() {
    let ws = Workspace::new();
    let file = ws.file("deck.toml", "[general]\nname = \"desk\"\n");
    CliRunner::new()
        .assert_cmd(&["--no-color", "--config", &lossy(&file), "config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration file:"))
        .stdout(predicate::str::contains("name = \"desk\""));
}
