//! Runs the compiled `deckpilot` binary.
//!
//! Each [`CliRunner`] owns a scratch config home so the developer's own
//! `~/.config/deckpilot/config.toml` never leaks into a test, and strips the
//! `DECKPILOT_*` variables unless a test sets them with [`CliRunner::with_env`].

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use serde_json::Value;
use tempfile::TempDir;

const SCRUBBED_VARS: [&str; 4] = ["DECKPILOT_FORMAT", "DECKPILOT_CONFIG", "DECKPILOT_SERIAL", "NO_COLOR"];

/// ```ignore
/// CliRunner::new()
///     .run_robot(&["devices", "--use-simulator"])
///     .assert_success()
///     .assert_json_array_len("", 4);
/// ```
pub struct CliRunner {
    home: TempDir,
    extra_env: Vec<(String, String)>,
}

impl Default for CliRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CliRunner {
    pub fn new() -> Self {
        Self {
            home: TempDir::new().expect("Failed to create config home"),
            extra_env: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.extra_env.push((key.to_string(), value.to_string()));
        self
    }

    /// Directory standing in for `$XDG_CONFIG_HOME` and `$HOME`.
    pub fn config_home(&self) -> &Path {
        self.home.path()
    }

    /// The file `deckpilot config` edits when `--config` is not given.
    pub fn default_config_file(&self) -> PathBuf {
        self.home.path().join("deckpilot/config.toml")
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_deckpilot"));
        for var in SCRUBBED_VARS {
            cmd.env_remove(var);
        }
        cmd.args(args)
            .env("XDG_CONFIG_HOME", self.home.path())
            .env("HOME", self.home.path())
            .env("RUST_LOG", "off")
            .envs(self.extra_env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null());
        cmd
    }

    pub fn run(&self, args: &[&str]) -> CliResult {
        let output = self
            .command(args)
            .output()
            .unwrap_or_else(|e| panic!("Failed to execute deckpilot {args:?}: {e}"));
        CliResult {
            args: args.iter().map(ToString::to_string).collect(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }

    /// [`run`](Self::run) with `--robot` in front.
    pub fn run_robot(&self, args: &[&str]) -> CliResult {
        let args: Vec<&str> = std::iter::once("--robot").chain(args.iter().copied()).collect();
        self.run(&args)
    }

    /// Start a long-running command such as `start`; the caller kills it.
    pub fn spawn(&self, args: &[&str]) -> Child {
        self.command(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("Failed to spawn deckpilot")
    }

    /// Same environment, as an `assert_cmd` handle for predicate checks.
    pub fn assert_cmd(&self, args: &[&str]) -> assert_cmd::Command {
        assert_cmd::Command::from_std(self.command(args))
    }
}

/// Captured output of one run.
#[derive(Debug, Clone)]
pub struct CliResult {
    pub args: Vec<String>,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CliResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    fn describe(&self) -> String {
        format!(
            "deckpilot {:?} exited with {}\n--- stdout\n{}\n--- stderr\n{}",
            self.args, self.exit_code, self.stdout, self.stderr
        )
    }

    pub fn assert_success(&self) -> &Self {
        assert!(self.success(), "{}", self.describe());
        self
    }

    pub fn assert_exit_code(&self, expected: i32) -> &Self {
        assert_eq!(self.exit_code, expected, "{}", self.describe());
        self
    }

    pub fn assert_stdout_contains(&self, text: &str) -> &Self {
        assert!(self.stdout.contains(text), "missing {text:?}: {}", self.describe());
        self
    }

    pub fn json(&self) -> Value {
        parse_json(&self.stdout, "stdout")
    }

    /// Robot-mode errors are printed to stderr.
    pub fn stderr_json(&self) -> Value {
        parse_json(&self.stderr, "stderr")
    }

    fn lookup(&self, pointer: &str) -> Value {
        let json = self.json();
        json.pointer(pointer)
            .cloned()
            .unwrap_or_else(|| panic!("{pointer} not found in {json:#}"))
    }

    pub fn assert_json_field(&self, pointer: &str, expected: &Value) -> &Self {
        assert_eq!(&self.lookup(pointer), expected, "at {pointer}");
        self
    }

    pub fn assert_json_array_len(&self, pointer: &str, expected: usize) -> &Self {
        let value = self.lookup(pointer);
        let len = value
            .as_array()
            .unwrap_or_else(|| panic!("{pointer} is not an array: {value}"))
            .len();
        assert_eq!(len, expected, "length of {pointer}");
        self
    }
}

fn parse_json(text: &str, stream: &str) -> Value {
    serde_json::from_str(text.trim())
        .unwrap_or_else(|e| panic!("{stream} is not JSON ({e}):\n{text}"))
}
