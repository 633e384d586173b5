//! On-disk fixtures: panel trees, plugin directories and config files.
//!
//! Everything lives in a [`TempDir`] that is removed when the fixture drops.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use deckpilot::comm::EventBus;
use deckpilot::deck::{AssetManager, DeckRenderer};
use deckpilot::device::{DeviceModel, SimulatedDeck};
use deckpilot::panel::{ButtonFactory, PanelRegistry};

/// One `[[items]]` entry of an `items.toml`.
#[derive(Debug, Clone)]
pub struct Item {
    name: String,
    kind: &'static str,
    class: Option<String>,
    path: Option<String>,
    params: Vec<(String, String)>,
}

impl Item {
    pub fn button(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: "button",
            class: None,
            path: None,
            params: Vec::new(),
        }
    }

    pub fn panel(name: &str) -> Self {
        Self {
            kind: "panel",
            ..Self::button(name)
        }
    }

    #[must_use]
    pub fn class(mut self, class: &str) -> Self {
        self.class = Some(class.to_string());
        self
    }

    #[must_use]
    pub fn path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    /// Add a param; `value` is raw TOML (`"text"`, `3`, ...).
    #[must_use]
    pub fn param(mut self, key: &str, value: &str) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    fn to_toml(&self) -> String {
        let mut out = String::from("[[items]]\n");
        let _ = writeln!(out, "name = \"{}\"", self.name);
        let _ = writeln!(out, "type = \"{}\"", self.kind);
        if let Some(class) = &self.class {
            let _ = writeln!(out, "class = \"{class}\"");
        }
        if let Some(path) = &self.path {
            let _ = writeln!(out, "path = \"{path}\"");
        }
        if !self.params.is_empty() {
            let params: Vec<_> = self
                .params
                .iter()
                .map(|(k, v)| format!("{k} = {v}"))
                .collect();
            let _ = writeln!(out, "params = {{ {} }}", params.join(", "));
        }
        out.push('\n');
        out
    }
}

/// Write `items` as `<dir>/items.toml`, creating `dir`.
pub fn write_items(dir: &Path, items: &[Item]) {
    std::fs::create_dir_all(dir).expect("Failed to create panel directory");
    let text: String = items.iter().map(Item::to_toml).collect();
    std::fs::write(dir.join("items.toml"), text).expect("Failed to write items.toml");
}

/// A scratch workspace for panel, plugin and config files.
pub struct Workspace {
    pub dir: TempDir,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Write a panel manifest at `rel` and return its directory.
    pub fn panel(&self, rel: &str, items: &[Item]) -> PathBuf {
        let dir = self.join(rel);
        write_items(&dir, items);
        dir
    }

    /// Root with a few buttons and an `apps` sub-panel holding two buttons.
    pub fn sample_tree(&self) -> PathBuf {
        self.panel(
            "root/apps",
            &[
                Item::button("terminal").param("text", "\"Term\""),
                Item::button("browser"),
            ],
        );
        self.panel(
            "root",
            &[
                Item::button("hello").class("message").param("message", "\"hi\""),
                Item::panel("apps"),
                Item::button("clock").class("clock"),
            ],
        )
    }

    /// Root panel with `count` plain buttons named `b0..`.
    pub fn flat_tree(&self, count: usize) -> PathBuf {
        let items: Vec<_> = (0..count).map(|i| Item::button(&format!("b{i}"))).collect();
        self.panel("root", &items)
    }

    /// Write `plugins/<name>/plugin.yaml`; returns the plugins directory.
    pub fn plugin(&self, name: &str, manifest: &str) -> PathBuf {
        let dir = self.join("plugins").join(name);
        std::fs::create_dir_all(&dir).expect("Failed to create plugin directory");
        std::fs::write(dir.join("plugin.yaml"), manifest).expect("Failed to write plugin.yaml");
        self.join("plugins")
    }

    /// Write a file relative to the workspace and return its path.
    pub fn file(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&path, contents).expect("Failed to write file");
        path
    }
}

/// Manifest of a plugin that mounts one panel under the root.
pub fn panel_plugin_manifest(name: &str, panel: &str) -> String {
    format!(
        "name: {name}\n\
         entry_point: \"deckpilot.plugins:PanelProvider\"\n\
         version: \"1.2.0\"\n\
         panels:\n\
         \x20 - name: {panel}\n\
         \x20   path: panel\n"
    )
}

/// A simulated deck wired to a renderer, ready for a registry.
pub fn simulated_renderer(model: DeviceModel) -> (Arc<SimulatedDeck>, Arc<DeckRenderer>) {
    let deck = Arc::new(SimulatedDeck::new(model, "SIM-TEST-001"));
    deck.open();
    let renderer = Arc::new(DeckRenderer::new(
        deck.clone(),
        Arc::new(AssetManager::default()),
    ));
    (deck, renderer)
}

/// Load `root` onto a simulated deck of `model`.
pub fn load_registry(
    model: DeviceModel,
    root: Option<&Path>,
) -> (Arc<SimulatedDeck>, PanelRegistry, EventBus) {
    let (deck, renderer) = simulated_renderer(model);
    let bus = EventBus::new();
    let registry = PanelRegistry::load(
        root,
        renderer,
        Arc::new(ButtonFactory::with_builtins()),
        bus.clone(),
    )
    .expect("Failed to load panel tree");
    (deck, registry, bus)
}
