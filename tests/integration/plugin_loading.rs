//! Plugins discovered on disk, mounted into the panel tree and hooked to the bus.

use deckpilot::comm::{Event, EventType};
use deckpilot::config::AppConfig;
use deckpilot::device::DeviceModel;
use deckpilot::plugins::PluginManager;

use crate::common::fixtures::{Item, Workspace, load_registry, panel_plugin_manifest, write_items};
use crate::common::init_test_logging;

#[test]
fn test_panel_plugin_mounts_under_root() {
    init_test_logging();
    let ws = Workspace::new();
    let root = ws.flat_tree(2);
    let plugins = ws.plugin("weather", &panel_plugin_manifest("weather", "forecast"));
    write_items(&plugins.join("weather/panel"), &[Item::button("today"), Item::button("tomorrow")]);

    let (_deck, mut registry, bus) = load_registry(DeviceModel::Original, Some(&root));
    let mut manager = PluginManager::default();
    let report = manager.load_all(&plugins, &mut registry, &bus, &AppConfig::default());

    assert!(report.failed.is_empty(), "{:?}", report.failed);
    assert_eq!(report.loaded.len(), 1);
    assert_eq!(report.loaded[0].version, "1.2.0");
    assert_eq!(report.loaded[0].panels, ["forecast"]);
    assert_eq!(manager.loaded().collect::<Vec<_>>(), ["weather"]);

    let forecast = registry.find("/forecast").unwrap();
    let tree = registry.structure();
    assert_eq!(tree.items.last().map(|i| i.kind), Some("panel"));
    assert_eq!(registry.panel(forecast).unwrap().entries().len(), 2);
}

#[test]
fn test_plugins_load_in_directory_order_and_failures_are_isolated() {
    let ws = Workspace::new();
    ws.plugin("a_broken", "name: [not, a, string\n");
    ws.plugin("b_unknown", "name: b\nentry_point: \"elsewhere:Thing\"\n");
    ws.plugin("c_runner", "name: c\nentry_point: \"deckpilot.plugins:CommandRunner\"\n");
    let plugins = ws.plugin("d_logger", "name: d\nentry_point: \"deckpilot.plugins:EventLogger\"\n");
    std::fs::create_dir_all(plugins.join("e_empty")).unwrap();

    let (_deck, mut registry, bus) = load_registry(DeviceModel::Original, None);
    let mut manager = PluginManager::default();
    let report = manager.load_all(&plugins, &mut registry, &bus, &AppConfig::default());

    assert_eq!(report.loaded.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(), ["d"]);
    let failed: Vec<_> = report
        .failed
        .iter()
        .map(|f| f.directory.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(failed, ["a_broken", "b_unknown", "c_runner"]);
    assert!(report.failed[1].reason.contains("elsewhere:Thing"));
    assert!(report.failed[2].reason.contains("config.commands"));
    assert_eq!(report.skipped, [plugins.join("e_empty")]);
}

#[test]
fn test_event_hooks_subscribe_and_unload() {
    let ws = Workspace::new();
    let plugins = ws.plugin(
        "logger",
        "name: logger\n\
         entry_point: \"deckpilot.plugins:EventLogger\"\n\
         events:\n\
         \x20 - topic: panel_activated\n\
         \x20   handler: log_event\n\
         \x20 - event: deploy_now\n\
         \x20   handler: log_event\n\
         \x20   once: true\n\
         \x20 - topic: exit\n\
         \x20   handler: missing_handler\n",
    );

    let (_deck, mut registry, bus) = load_registry(DeviceModel::Original, None);
    let mut manager = PluginManager::default();
    let report = manager.load_all(&plugins, &mut registry, &bus, &AppConfig::default());
    assert_eq!(report.loaded[0].hooks, 2);
    assert_eq!(bus.subscriber_count(&EventType::PanelActivated), 1);

    let custom = EventType::custom("deploy_now");
    assert_eq!(bus.subscriber_count(&custom), 1);
    assert_eq!(bus.publish(&Event::signal(custom.clone())), 1);
    assert_eq!(bus.subscriber_count(&custom), 0, "once hooks fire a single time");

    manager.unload_all(&bus);
    assert_eq!(bus.subscriber_count(&EventType::PanelActivated), 0);
    assert_eq!(manager.loaded().count(), 0);
}

#[test]
fn test_missing_plugin_directory_is_empty_report() {
    let ws = Workspace::new();
    let (_deck, mut registry, bus) = load_registry(DeviceModel::Original, None);
    let report = PluginManager::default().load_all(
        &ws.join("nowhere"),
        &mut registry,
        &bus,
        &AppConfig::default(),
    );
    assert!(report.is_empty());
}
