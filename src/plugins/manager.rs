//! Plugin discovery and lifecycle.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use super::catalog::{Plugin, PluginCatalog, PluginContext};
use super::manifest::{MANIFEST_FILE, PluginMetadata};
use crate::comm::{Event, EventBus, EventType};
use crate::config::AppConfig;
use crate::error::{DpError, Result};
use crate::panel::{PanelIcons, PanelRegistry};

/// A plugin directory whose manifest parsed.
#[derive(Debug, Clone)]
pub struct Discovered {
    pub directory: PathBuf,
    pub metadata: PluginMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadedPlugin {
    pub name: String,
    pub version: String,
    pub directory: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub panels: Vec<String>,
    pub hooks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedPlugin {
    pub directory: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub reason: String,
}

/// Outcome of a discovery or load pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PluginReport {
    pub loaded: Vec<LoadedPlugin>,
    pub failed: Vec<FailedPlugin>,
    pub skipped: Vec<PathBuf>,
}

impl PluginReport {
    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty() && self.failed.is_empty() && self.skipped.is_empty()
    }
}

struct Instance {
    name: String,
    // Held so plugin state lives as long as its hooks.
    _plugin: Box<dyn Plugin>,
}

/// Finds plugins on disk and wires them into the registry and bus.
pub struct PluginManager {
    catalog: PluginCatalog,
    instances: Vec<Instance>,
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new(PluginCatalog::with_builtins())
    }
}

impl PluginManager {
    pub fn new(catalog: PluginCatalog) -> Self {
        Self {
            catalog,
            instances: Vec::new(),
        }
    }

    pub const fn catalog(&self) -> &PluginCatalog {
        &self.catalog
    }

    /// Names of the loaded plugins in load order.
    pub fn loaded(&self) -> impl Iterator<Item = &str> {
        self.instances.iter().map(|i| i.name.as_str())
    }

    /// Scan `dir` in sorted order and parse every manifest.
    ///
    /// The report lists directories without a manifest as skipped and
    /// unparsable manifests as failed; `loaded` stays empty.
    #[instrument(skip_all, fields(dir = %dir.display()))]
    pub fn discover(dir: &Path) -> (Vec<Discovered>, PluginReport) {
        let mut report = PluginReport::default();
        let mut found = Vec::new();

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Plugin directory unreadable");
                return (found, report);
            }
        };
        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_dir())
            .collect();
        dirs.sort();

        for directory in dirs {
            if !directory.join(MANIFEST_FILE).is_file() {
                warn!(directory = %directory.display(), "Ignoring directory without {MANIFEST_FILE}");
                report.skipped.push(directory);
                continue;
            }
            match PluginMetadata::load(&directory) {
                Ok(metadata) => {
                    debug!(plugin = %metadata.name, "Manifest parsed");
                    found.push(Discovered {
                        directory,
                        metadata,
                    });
                }
                Err(e) => {
                    error!(directory = %directory.display(), error = %e, "Invalid plugin manifest");
                    report.failed.push(FailedPlugin {
                        directory,
                        name: None,
                        reason: e.to_string(),
                    });
                }
            }
        }
        (found, report)
    }

    /// Discover and load every plugin under `dir`.
    #[instrument(skip_all, fields(dir = %dir.display()))]
    pub fn load_all(
        &mut self,
        dir: &Path,
        registry: &mut PanelRegistry,
        bus: &EventBus,
        app_config: &AppConfig,
    ) -> PluginReport {
        let (found, mut report) = Self::discover(dir);
        for Discovered {
            directory,
            metadata,
        } in found
        {
            match self.load(&directory, &metadata, registry, bus, app_config) {
                Ok(loaded) => {
                    info!(plugin = %loaded.name, directory = %directory.display(), "Plugin loaded");
                    report.loaded.push(loaded);
                }
                Err(e) => {
                    error!(plugin = %metadata.name, error = %e, "Plugin failed to load");
                    report.failed.push(FailedPlugin {
                        directory,
                        name: Some(metadata.name),
                        reason: e.to_string(),
                    });
                }
            }
        }
        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            "Plugins processed"
        );
        report
    }

    fn load(
        &mut self,
        directory: &Path,
        metadata: &PluginMetadata,
        registry: &mut PanelRegistry,
        bus: &EventBus,
        app_config: &AppConfig,
    ) -> Result<LoadedPlugin> {
        let mut plugin = self.catalog.instantiate(metadata)?;
        let mut ctx = PluginContext {
            metadata,
            base_path: directory,
            bus,
            registry: &mut *registry,
            app_config,
        };
        if let Err(e) = plugin.register(&mut ctx) {
            let removed = bus.unsubscribe_owner(&metadata.name);
            debug!(plugin = %metadata.name, removed, "Dropped subscriptions of failed plugin");
            return Err(DpError::Plugin {
                plugin: metadata.name.clone(),
                reason: format!("{e:#}"),
            });
        }

        let panels = Self::mount_panels(directory, metadata, registry);
        let hooks = Self::wire_hooks(plugin.as_ref(), metadata, bus);

        self.instances.push(Instance {
            name: metadata.name.clone(),
            _plugin: plugin,
        });
        Ok(LoadedPlugin {
            name: metadata.name.clone(),
            version: metadata.version.clone(),
            directory: directory.to_path_buf(),
            description: metadata.description.clone(),
            panels,
            hooks,
        })
    }

    fn mount_panels(directory: &Path, metadata: &PluginMetadata, registry: &mut PanelRegistry) -> Vec<String> {
        let mut mounted = Vec::new();
        for spec in &metadata.panels {
            let Ok(target) = registry.find(&spec.mount) else {
                warn!(plugin = %metadata.name, panel = spec.id(), mount = %spec.mount, "Mount target not found");
                continue;
            };
            let path = directory.join(&spec.path);
            if !path.is_dir() {
                warn!(plugin = %metadata.name, panel = spec.id(), path = %path.display(), "Panel path missing");
                continue;
            }
            if !spec.params.is_empty() {
                debug!(panel = spec.id(), params = spec.params.len(), "Panel params are not used by plain panels");
            }
            let icons = PanelIcons::new(spec.icon.clone(), spec.icon_pressed.clone());
            match registry.mount_panel(target, &spec.name, &path, icons) {
                Ok(id) => {
                    info!(plugin = %metadata.name, panel = %spec.name, at = %registry.path_of(id), "Panel mounted");
                    mounted.push(spec.name.clone());
                }
                Err(e) => warn!(plugin = %metadata.name, panel = spec.id(), error = %e, "Panel not mounted"),
            }
        }
        mounted
    }

    fn wire_hooks(plugin: &dyn Plugin, metadata: &PluginMetadata, bus: &EventBus) -> usize {
        let mut wired = 0;
        for hook in &metadata.events {
            let Some(handler) = plugin.handler(&hook.handler) else {
                warn!(plugin = %metadata.name, handler = %hook.handler, "Plugin has no such handler");
                continue;
            };
            let topic = match hook.topic.parse::<EventType>() {
                Ok(topic) => topic,
                Err(never) => match never {},
            };
            let callback = move |event: &Event| handler(event);
            if hook.once {
                bus.subscribe_once(Some(metadata.name.as_str()), topic.clone(), callback);
            } else {
                bus.subscribe_as(&metadata.name, topic.clone(), callback);
            }
            debug!(plugin = %metadata.name, %topic, once = hook.once, "Hook wired");
            wired += 1;
        }
        wired
    }

    /// Drop every plugin and its bus subscriptions.
    pub fn unload_all(&mut self, bus: &EventBus) {
        for instance in self.instances.drain(..) {
            let removed = bus.unsubscribe_owner(&instance.name);
            debug!(plugin = %instance.name, removed, "Plugin unloaded");
        }
    }
}
