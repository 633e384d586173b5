//! Plugins: directories with a `plugin.yaml` that contribute panels and event hooks.

pub mod catalog;
pub mod manager;
pub mod manifest;

pub use catalog::{BUILTIN_MODULE, HookHandler, Plugin, PluginBuilder, PluginCatalog, PluginContext};
pub use manager::{Discovered, FailedPlugin, LoadedPlugin, PluginManager, PluginReport};
pub use manifest::{EntryPoint, EventHookSpec, MANIFEST_FILE, PanelSpec, PluginMetadata};
