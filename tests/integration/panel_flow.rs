//! Panel navigation and pagination driven by key transitions.

use std::sync::{Arc, Mutex};

use serde_json::json;

use deckpilot::comm::{Event, EventBus, EventData, EventType};
use deckpilot::device::{DeckDevice, DeviceModel};
use deckpilot::panel::Slot;

use crate::common::fixtures::{Item, Workspace, load_registry};
use crate::common::init_test_logging;

type Seen = Arc<Mutex<Vec<Event>>>;

fn record(bus: &EventBus, topics: &[EventType]) -> Seen {
    let seen: Seen = Arc::default();
    for topic in topics {
        let seen = Arc::clone(&seen);
        bus.subscribe(topic.clone(), move |e| seen.lock().unwrap().push(e.clone()));
    }
    seen
}

fn names(seen: &Seen) -> Vec<String> {
    seen.lock().unwrap().iter().map(|e| e.topic.to_string()).collect()
}

fn tap(registry: &mut deckpilot::panel::PanelRegistry, key: u8) {
    registry.handle_key(key, true);
    registry.handle_key(key, false);
}

#[test]
fn test_enter_sub_panel_and_return() {
    init_test_logging();
    let ws = Workspace::new();
    let root = ws.sample_tree();
    let (_deck, mut registry, bus) = load_registry(DeviceModel::Original, Some(&root));
    registry.render();

    let seen = record(
        &bus,
        &[
            EventType::PanelActivated,
            EventType::PanelDeactivated,
            EventType::PanelRendered,
            EventType::ItemReleased,
        ],
    );

    // Root has no parent slot, so `apps` is on key 1.
    tap(&mut registry, 1);
    assert_eq!(registry.active_panel().name, "apps");
    assert_eq!(registry.active_panel().page().slots[0], Slot::Parent);
    assert_eq!(
        names(&seen),
        [
            "item_released",
            "panel_deactivated",
            "panel_activated",
            "panel_rendered"
        ]
    );

    seen.lock().unwrap().clear();
    tap(&mut registry, 0);
    assert_eq!(registry.active(), registry.root());
    assert_eq!(
        names(&seen),
        ["panel_deactivated", "panel_activated", "panel_rendered"]
    );
}

#[test]
fn test_item_events_carry_panel_and_key() {
    let ws = Workspace::new();
    let root = ws.sample_tree();
    let (_deck, mut registry, bus) = load_registry(DeviceModel::Original, Some(&root));
    registry.render();
    let seen = record(&bus, &[EventType::ItemPressed, EventType::ItemReleased]);

    tap(&mut registry, 0);
    let events = seen.lock().unwrap().clone();
    assert_eq!(events.len(), 2);
    for event in &events {
        assert_eq!(
            event.data,
            EventData::Item {
                panel: "root".to_string(),
                item: "hello".to_string(),
                key: 0,
            }
        );
        assert_eq!(event.source.as_deref(), Some("root"));
    }
}

#[test]
fn test_pagination_on_small_deck() {
    let ws = Workspace::new();
    let root = ws.flat_tree(20);
    let (_deck, mut registry, bus) = load_registry(DeviceModel::Mini, Some(&root));
    registry.render();

    // 6 keys: 5 + 4 + 4 + 4 + 3 entries.
    assert_eq!(registry.active_panel().pages().len(), 5);
    assert_eq!(registry.active_panel().page().slots[5], Slot::NextPage);

    let seen = record(&bus, &[EventType::PanelPageChanged]);
    tap(&mut registry, 5);
    assert_eq!(registry.active_panel().current_page(), 1);
    assert_eq!(
        registry.active_panel().page().slots[..2],
        [Slot::PreviousPage, Slot::Entry(5)]
    );

    tap(&mut registry, 0);
    assert_eq!(registry.active_panel().current_page(), 0);
    let changes: Vec<_> = seen.lock().unwrap().iter().map(|e| e.data.clone()).collect();
    assert_eq!(
        changes,
        [
            EventData::PageChange {
                panel: "root".to_string(),
                old: 0,
                new: 1
            },
            EventData::PageChange {
                panel: "root".to_string(),
                old: 1,
                new: 0
            },
        ]
    );

    // No wrap-around past the last page.
    assert!(registry.set_page(4));
    assert!(!registry.next_page());
    assert_eq!(registry.active_panel().current_page(), 4);
}

#[test]
fn test_render_writes_every_key() {
    let ws = Workspace::new();
    let root = ws.sample_tree();
    let (deck, mut registry, _bus) = load_registry(DeviceModel::Original, Some(&root));
    registry.render();

    for key in 0..deck.key_count() {
        let image = deck.key_image(usize::from(key)).unwrap();
        let image = image.unwrap_or_else(|| panic!("key {key} left blank"));
        assert_eq!(image.width(), deck.info().key_size().0);
    }
}

#[test]
fn test_event_button_publishes_payload() {
    let ws = Workspace::new();
    let root = ws.panel(
        "root",
        &[Item::button("deploy")
            .class("event")
            .param("topic", "\"deploy_now\"")
            .param("payload", "{ target = \"prod\" }")],
    );
    let (_deck, mut registry, bus) = load_registry(DeviceModel::Original, Some(&root));
    registry.render();
    let seen = record(&bus, &[EventType::custom("deploy_now")]);

    tap(&mut registry, 0);
    let events = seen.lock().unwrap().clone();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].source.as_deref(), Some("deploy"));
    assert_eq!(
        events[0].data,
        EventData::Payload {
            value: json!({ "target": "prod" })
        }
    );
}

#[test]
fn test_malformed_items_are_skipped_not_fatal() {
    let ws = Workspace::new();
    let root = ws.panel(
        "root",
        &[
            Item::button("ok"),
            Item::button("ok").class("message"),
            Item::button("bad").class("no_such_class"),
            Item::button("launcher").class("launch"),
            Item::panel("ghost").path("does/not/exist"),
        ],
    );
    let (_deck, registry, _bus) = load_registry(DeviceModel::Original, Some(&root));
    let tree = registry.structure();
    let items: Vec<_> = tree.items.iter().map(|i| (i.name.as_str(), i.class.as_deref())).collect();
    assert_eq!(items, [("ok", Some("button"))]);
}

#[test]
fn test_ticks_only_reach_visible_buttons() {
    let ws = Workspace::new();
    let root = ws.sample_tree();
    let (deck, mut registry, _bus) = load_registry(DeviceModel::Original, Some(&root));
    registry.render();
    deck.clear_operations();

    // The clock on key 2 redraws only if its text changed, so the tick must
    // never touch keys other than 2.
    registry.tick(0, 0);
    registry.internal_tick(0, 0);
    for key in (0..deck.key_count()).filter(|k| *k != 2) {
        assert_eq!(deck.writes_to(key), 0, "key {key} was redrawn by a tick");
    }
}
