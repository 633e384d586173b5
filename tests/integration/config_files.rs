//! Config files on disk: typed loading, dotted-key editing and the default location.

use std::time::Duration;

use deckpilot::config::{AppConfig, ConfigDocument, default_config_path};
use deckpilot::device::DeckSelector;
use deckpilot::error::DpError;

use crate::common::env::with_config_home;
use crate::common::fixtures::Workspace;

const SAMPLE: &str = r#"
# DeckPilot settings
[general]
clock_tick_interval = 0.5
root = "panels/root"

[streamdeck]
brightness = 60
serial_number = "SIM-MINI-001"

[assets]
icons_directory = "icons"

[plugins]
directory = "/opt/deckpilot/plugins"

[commands]
enabled = true
port = 28000

[custom]
note = "kept"
"#;

#[test]
fn test_load_resolves_paths_against_config_dir() {
    let ws = Workspace::new();
    let path = ws.file("conf/config.toml", SAMPLE);
    let config = AppConfig::load(&path).unwrap();
    let base = ws.join("conf").canonicalize().unwrap();

    assert_eq!(config.general.root, Some(base.join("panels/root")));
    assert_eq!(config.assets.icons_directory, Some(base.join("icons")));
    assert_eq!(
        config.plugins.directory.as_deref(),
        Some(std::path::Path::new("/opt/deckpilot/plugins"))
    );
    assert_eq!(config.clock_tick_interval().unwrap(), Duration::from_millis(500));
    assert_eq!(config.hidden_clock_tick_interval().unwrap(), Duration::from_secs(1));
    assert_eq!(config.commands.port, 28000);
    assert_eq!(config.commands.host, "127.0.0.1");
    assert_eq!(config.source(), Some(path.as_path()));

    // A present [streamdeck] section without device_index selects by serial only.
    assert_eq!(config.require_selector().unwrap(), DeckSelector::serial("SIM-MINI-001"));
}

#[test]
fn test_edit_round_trip_keeps_unknown_keys() {
    let ws = Workspace::new();
    let path = ws.file("config.toml", SAMPLE);

    let mut doc = ConfigDocument::load(&path).unwrap();
    assert_eq!(doc.set("streamdeck.brightness", "75").unwrap(), toml::Value::Integer(75));
    assert_eq!(
        doc.set("general.clock_tick_interval", "3").unwrap(),
        toml::Value::Float(3.0)
    );
    doc.set("commands.enabled", "false").unwrap();
    doc.save().unwrap();

    let reread = ConfigDocument::load(&path).unwrap();
    assert_eq!(reread.get("custom.note").unwrap().as_str(), Some("kept"));
    let config = AppConfig::load(&path).unwrap();
    assert_eq!(config.streamdeck.brightness, 75);
    assert!(!config.commands.enabled);
}

#[test]
fn test_edit_that_breaks_validation_is_detectable() {
    let ws = Workspace::new();
    let path = ws.file("config.toml", SAMPLE);
    let mut doc = ConfigDocument::load(&path).unwrap();
    doc.set("streamdeck.brightness", "250").unwrap();

    let err = AppConfig::parse(&doc.to_pretty_string().unwrap()).unwrap_err();
    assert!(matches!(err, DpError::ConfigInvalid(_)), "{err:?}");
}

#[test]
fn test_wrong_types_are_rejected() {
    let ws = Workspace::new();
    let path = ws.file("config.toml", SAMPLE);
    let mut doc = ConfigDocument::load(&path).unwrap();

    assert!(matches!(
        doc.set("streamdeck.brightness", "bright"),
        Err(DpError::ConfigValue { .. })
    ));
    assert!(matches!(doc.set("general", "x"), Err(DpError::ConfigValue { .. })));
    assert!(matches!(
        doc.get("streamdeck.nope"),
        Err(DpError::ConfigKeyNotFound { .. })
    ));
}

#[test]
fn test_default_location_follows_config_home() {
    let ws = Workspace::new();
    let home = ws.path().to_string_lossy().to_string();
    let _env = with_config_home(&home);

    let path = default_config_path().unwrap();
    assert_eq!(path, ws.path().join("deckpilot").join("config.toml"));

    // No file there yet: defaults, including device index 0.
    let config = AppConfig::load_or_default(None).unwrap();
    assert_eq!(config.source(), None);
    assert_eq!(config.require_selector().unwrap(), DeckSelector::index(0));

    ws.file("deckpilot/config.toml", "[streamdeck]\nbrightness = 10\ndevice_index = 2\n");
    let config = AppConfig::load_or_default(None).unwrap();
    assert_eq!(config.streamdeck.brightness, 10);
    assert_eq!(config.require_selector().unwrap(), DeckSelector::index(2));
}

#[test]
fn test_missing_and_invalid_files() {
    let ws = Workspace::new();
    assert!(matches!(
        AppConfig::load(&ws.join("absent.toml")),
        Err(DpError::ConfigNotFound { .. })
    ));
    let bad = ws.file("bad.toml", "[general\n");
    assert!(matches!(AppConfig::load(&bad), Err(DpError::ConfigParse(_))));
    let negative = ws.file("neg.toml", "[general]\nclock_tick_interval = -1.0\n");
    assert!(matches!(AppConfig::load(&negative), Err(DpError::ConfigInvalid(_))));
}
