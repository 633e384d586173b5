//! Compiled-in plugin implementations, looked up by entry point.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use serde_json::Value;
use tracing::{info, warn};

use super::manifest::{EntryPoint, PluginMetadata};
use crate::comm::{Event, EventBus, EventType, SubscriptionId};
use crate::config::AppConfig;
use crate::error::{DpError, Result};
use crate::panel::PanelRegistry;
use crate::panel::buttons::spawn_detached;

/// Module name of the built-in entry points.
pub const BUILTIN_MODULE: &str = "deckpilot.plugins";

/// Callback wired to a bus topic.
pub type HookHandler = Arc<dyn Fn(&Event) + Send + Sync>;

/// What a plugin sees while it registers.
pub struct PluginContext<'a> {
    pub metadata: &'a PluginMetadata,
    pub base_path: &'a Path,
    pub bus: &'a EventBus,
    pub registry: &'a mut PanelRegistry,
    pub app_config: &'a AppConfig,
}

impl PluginContext<'_> {
    /// Subscribe on behalf of the plugin. These subscriptions are removed
    /// when the plugin fails to register or is unloaded.
    pub fn subscribe<F>(&self, topic: EventType, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.bus.subscribe_as(&self.metadata.name, topic, handler)
    }
}

/// A loaded plugin.
pub trait Plugin: Send {
    /// Set up listeners and buttons. Declared panels are mounted afterwards.
    fn register(&mut self, ctx: &mut PluginContext<'_>) -> anyhow::Result<()> {
        let _ = ctx;
        Ok(())
    }

    /// Look up a handler named by an event hook.
    fn handler(&self, name: &str) -> Option<HookHandler> {
        let _ = name;
        None
    }

    fn handler_names(&self) -> Vec<String> {
        Vec::new()
    }
}

pub type PluginBuilder = Arc<dyn Fn(&PluginMetadata) -> anyhow::Result<Box<dyn Plugin>> + Send + Sync>;

/// Entry point to constructor map.
#[derive(Clone)]
pub struct PluginCatalog {
    builders: BTreeMap<EntryPoint, PluginBuilder>,
}

impl fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCatalog")
            .field(
                "entry_points",
                &self.builders.keys().map(ToString::to_string).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Default for PluginCatalog {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl PluginCatalog {
    pub fn empty() -> Self {
        Self {
            builders: BTreeMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut catalog = Self::empty();
        let builtin = |factory: &str| EntryPoint {
            module: BUILTIN_MODULE.to_string(),
            factory: factory.to_string(),
        };
        catalog.register(builtin("PanelProvider"), |_| Ok(Box::new(PanelProvider)));
        catalog.register(builtin("EventLogger"), |metadata| {
            Ok(Box::new(EventLogger {
                plugin: metadata.name.clone(),
            }))
        });
        catalog.register(builtin("CommandRunner"), |metadata| {
            Ok(Box::new(CommandRunner::from_metadata(metadata)?))
        });
        catalog
    }

    pub fn register<F>(&mut self, entry_point: EntryPoint, builder: F)
    where
        F: Fn(&PluginMetadata) -> anyhow::Result<Box<dyn Plugin>> + Send + Sync + 'static,
    {
        self.builders.insert(entry_point, Arc::new(builder));
    }

    pub fn contains(&self, entry_point: &EntryPoint) -> bool {
        self.builders.contains_key(entry_point)
    }

    pub fn entry_points(&self) -> impl Iterator<Item = &EntryPoint> {
        self.builders.keys()
    }

    /// Resolve the manifest's entry point and build the plugin.
    pub fn instantiate(&self, metadata: &PluginMetadata) -> Result<Box<dyn Plugin>> {
        let entry_point = metadata.entry_point()?;
        let builder = self
            .builders
            .get(&entry_point)
            .ok_or_else(|| DpError::UnknownEntryPoint {
                entry_point: entry_point.to_string(),
            })?;
        builder(metadata).map_err(|e| DpError::Plugin {
            plugin: metadata.name.clone(),
            reason: format!("{e:#}"),
        })
    }
}

/// Contributes panels through its manifest and nothing else.
struct PanelProvider;

impl Plugin for PanelProvider {
    fn register(&mut self, ctx: &mut PluginContext<'_>) -> anyhow::Result<()> {
        info!(
            plugin = %ctx.metadata.name,
            panels = ctx.metadata.panels.len(),
            "Panel provider registered"
        );
        Ok(())
    }
}

/// Logs every event it is hooked to.
struct EventLogger {
    plugin: String,
}

impl Plugin for EventLogger {
    fn handler(&self, name: &str) -> Option<HookHandler> {
        if name != "log_event" {
            return None;
        }
        let plugin = self.plugin.clone();
        Some(Arc::new(move |event: &Event| {
            info!(
                plugin = %plugin,
                topic = %event.topic,
                source = event.source.as_deref().unwrap_or("-"),
                data = ?event.data,
                "Event received"
            );
        }))
    }

    fn handler_names(&self) -> Vec<String> {
        vec!["log_event".to_string()]
    }
}

/// One handler per entry of `config.commands`, each spawning its command.
struct CommandRunner {
    plugin: String,
    commands: BTreeMap<String, String>,
}

impl CommandRunner {
    fn from_metadata(metadata: &PluginMetadata) -> anyhow::Result<Self> {
        let Some(table) = metadata.config.get("commands") else {
            bail!("CommandRunner needs a `config.commands` mapping");
        };
        let table = table
            .as_object()
            .context("`config.commands` must be a mapping")?;
        let mut commands = BTreeMap::new();
        for (name, command) in table {
            match command {
                Value::String(command) if !command.trim().is_empty() => {
                    commands.insert(name.clone(), command.clone());
                }
                _ => bail!("command '{name}' must be a non-empty string"),
            }
        }
        Ok(Self {
            plugin: metadata.name.clone(),
            commands,
        })
    }
}

impl Plugin for CommandRunner {
    fn handler(&self, name: &str) -> Option<HookHandler> {
        let command = self.commands.get(name)?.clone();
        let plugin = self.plugin.clone();
        let handler = name.to_string();
        Some(Arc::new(move |event: &Event| match spawn_detached(&command) {
            Ok(pid) => info!(plugin = %plugin, handler = %handler, topic = %event.topic, pid, "Command started"),
            Err(e) => warn!(plugin = %plugin, handler = %handler, error = %format!("{e:#}"), "Command failed"),
        }))
    }

    fn handler_names(&self) -> Vec<String> {
        self.commands.keys().cloned().collect()
    }
}
