//! Event topics and payloads carried by the [`EventBus`](super::EventBus).

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// Topic of an event.
///
/// Built-in topics have fixed snake_case names; anything else is a
/// [`EventType::Custom`] topic, typically raised by buttons or plugins.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    KeyChanged,
    KeyPressed,
    KeyReleased,
    Initialized,
    ClockTick,
    InternalClockTick,
    Exit,
    ItemRendered,
    ItemPressed,
    ItemReleased,
    PanelRendered,
    PanelActivated,
    PanelDeactivated,
    PanelPageChanged,
    PanelNextPage,
    PanelPreviousPage,
    PanelParent,
    Custom(String),
}

impl EventType {
    pub const BUILTIN: [Self; 17] = [
        Self::KeyChanged,
        Self::KeyPressed,
        Self::KeyReleased,
        Self::Initialized,
        Self::ClockTick,
        Self::InternalClockTick,
        Self::Exit,
        Self::ItemRendered,
        Self::ItemPressed,
        Self::ItemReleased,
        Self::PanelRendered,
        Self::PanelActivated,
        Self::PanelDeactivated,
        Self::PanelPageChanged,
        Self::PanelNextPage,
        Self::PanelPreviousPage,
        Self::PanelParent,
    ];

    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            Self::KeyChanged => "key_changed",
            Self::KeyPressed => "key_pressed",
            Self::KeyReleased => "key_released",
            Self::Initialized => "initialized",
            Self::ClockTick => "clock_tick",
            Self::InternalClockTick => "internal_clock_tick",
            Self::Exit => "exit",
            Self::ItemRendered => "item_rendered",
            Self::ItemPressed => "item_pressed",
            Self::ItemReleased => "item_released",
            Self::PanelRendered => "panel_rendered",
            Self::PanelActivated => "panel_activated",
            Self::PanelDeactivated => "panel_deactivated",
            Self::PanelPageChanged => "panel_page_changed",
            Self::PanelNextPage => "panel_next_page",
            Self::PanelPreviousPage => "panel_previous_page",
            Self::PanelParent => "panel_parent",
            Self::Custom(name) => name,
        }
    }
}

impl FromStr for EventType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        if normalized == "periodic" {
            return Ok(Self::ClockTick);
        }
        Ok(Self::BUILTIN
            .iter()
            .find(|t| t.name() == normalized)
            .cloned()
            .unwrap_or_else(|| Self::Custom(s.trim().to_string())))
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for EventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Payload of an event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventData {
    None,
    Key { index: u8, pressed: bool },
    Tick { time_i: u64, time_count: u64 },
    PageChange { panel: String, old: usize, new: usize },
    Panel { panel: String },
    Item { panel: String, item: String, key: u8 },
    Payload { value: serde_json::Value },
}

/// A message on the bus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub topic: EventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub data: EventData,
}

impl Event {
    pub fn new(topic: EventType, data: EventData) -> Self {
        Self {
            topic,
            source: None,
            data,
        }
    }

    /// An event with no payload.
    pub fn signal(topic: EventType) -> Self {
        Self::new(topic, EventData::None)
    }

    pub fn key(topic: EventType, index: u8, pressed: bool) -> Self {
        Self::new(topic, EventData::Key { index, pressed })
    }

    pub fn tick(topic: EventType, time_i: u64, time_count: u64) -> Self {
        Self::new(topic, EventData::Tick { time_i, time_count })
    }

    pub fn payload(topic: EventType, value: serde_json::Value) -> Self {
        Self::new(topic, EventData::Payload { value })
    }

    pub fn from_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Compact JSON form, as written to trace logs.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}
