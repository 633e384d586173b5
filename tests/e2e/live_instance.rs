//! `deckpilot start` on the simulator, driven through `deckpilot shell`.

use std::process::Child;
use std::thread;
use std::time::Duration;

use serde_json::{Value, json};

use crate::common::cli::{CliResult, CliRunner};
use crate::common::fixtures::Workspace;

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .map(|a| a.port())
        .expect("no free port")
}

/// Kills the instance even when an assertion fails.
struct Instance(Child);

impl Drop for Instance {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

/// Retry `shell echo` until the instance answers.
fn wait_until_up(runner: &CliRunner, port: &str) -> CliResult {
    let mut last = None;
    for _ in 0..100 {
        let result = runner.run_robot(&["shell", "--port", port, "--timeout", "1", "echo", "hi"]);
        if result.success() {
            return result;
        }
        last = Some(result);
        thread::sleep(Duration::from_millis(100));
    }
    panic!("instance never answered: {last:?}");
}

#[test]
fn start_serves_external_commands() {
    let ws = Workspace::new();
    let root = ws.sample_tree();
    let port = free_port();
    let config = ws.file(
        "config.toml",
        &format!(
            "[general]\nclock_tick_interval = 0.2\nhidden_clock_tick_interval = 0.0\n\n\
             [streamdeck]\nbrightness = 45\n\n\
             [commands]\nenabled = true\nhost = \"127.0.0.1\"\nport = {port}\n"
        ),
    );

    let runner = CliRunner::new();
    let _instance = Instance(runner.spawn(&[
        "--config",
        &config.to_string_lossy(),
        "start",
        "--use-simulator",
        "--serial",
        "SIM-MINI-001",
        "--root",
        &root.to_string_lossy(),
        "--no-plugins",
    ]));

    let port = port.to_string();
    let pong = wait_until_up(&runner, &port).json();
    assert_eq!(pong["message_type"], json!(2));
    assert_eq!(pong["message"], json!("PONG"));
    assert_eq!(pong["echo"], json!("hi"));

    let ack = runner
        .run_robot(&["shell", "--port", &port, "push", "1", "--duration", "0.05"])
        .json();
    assert_eq!(ack["message_type"], json!(4));
    assert_eq!(ack["success"], Value::Bool(true));

    let refused = runner.run_robot(&["shell", "--port", &port, "push", "40"]);
    refused.assert_success();
    assert_eq!(refused.json()["success"], Value::Bool(false));
}

#[test]
fn start_without_selector_fails() {
    let ws = Workspace::new();
    let config = ws.file("config.toml", "[streamdeck]\nbrightness = 45\n");
    let result = CliRunner::new().run_robot(&[
        "--config",
        &config.to_string_lossy(),
        "start",
        "--use-simulator",
    ]);
    result.assert_exit_code(1);
    assert_eq!(result.stderr_json()["error"], Value::Bool(true));
}

#[test]
fn start_with_oversized_tick_interval_fails() {
    let ws = Workspace::new();
    let config = ws.file(
        "config.toml",
        "[general]\nclock_tick_interval = 1e30\n[commands]\nenabled = false\n",
    );
    let result = CliRunner::new().run_robot(&[
        "--config",
        &config.to_string_lossy(),
        "start",
        "--use-simulator",
        "--no-plugins",
    ]);
    result.assert_exit_code(1);
    assert!(result.stderr_json()["message"]
        .as_str()
        .unwrap()
        .contains("general.clock_tick_interval"));
}
