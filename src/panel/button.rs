//! The [`Button`] trait and the context its hooks receive.

use serde_json::Value;

use crate::comm::{Event, EventBus, EventData, EventType};
use crate::deck::KeyDisplay;

/// Everything a button hook may look at or act on.
pub struct ItemContext<'a> {
    /// Item name inside its panel.
    pub item: &'a str,
    /// Name of the panel holding the item.
    pub panel: &'a str,
    /// Key the item is shown on, `None` when it is not on the visible page.
    pub key: Option<u8>,
    pub bus: &'a EventBus,
    outbox: Vec<Value>,
}

impl<'a> ItemContext<'a> {
    pub fn new(item: &'a str, panel: &'a str, key: Option<u8>, bus: &'a EventBus) -> Self {
        Self {
            item,
            panel,
            key,
            bus,
            outbox: Vec::new(),
        }
    }

    /// Queue data for every item of the same panel.
    ///
    /// Delivered once the running hook returns.
    pub fn dispatch(&mut self, data: Value) {
        self.outbox.push(data);
    }

    /// Publish an event with this item as source.
    pub fn publish(&self, topic: EventType, data: EventData) -> usize {
        self.bus
            .publish(&Event::new(topic, data).from_source(self.item))
    }

    pub(crate) fn take_outbox(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.outbox)
    }
}

/// A leaf of the panel tree bound to a key.
///
/// Every hook has a default so simple buttons only override what they need.
pub trait Button: Send {
    /// Class name the button was created from.
    fn class(&self) -> &str;

    fn on_rendered(&mut self, ctx: &mut ItemContext<'_>) -> KeyDisplay {
        KeyDisplay::icon("button_default").with_text(ctx.item)
    }

    fn on_pressed(&mut self, ctx: &mut ItemContext<'_>) -> anyhow::Result<Option<KeyDisplay>> {
        Ok(Some(KeyDisplay::icon("default_pressed").with_text(ctx.item)))
    }

    fn on_released(&mut self, ctx: &mut ItemContext<'_>) -> anyhow::Result<Option<KeyDisplay>> {
        Ok(Some(self.on_rendered(ctx)))
    }

    /// Clock tick while the button is on the visible page.
    fn on_tick(&mut self, _ctx: &mut ItemContext<'_>, _time_i: u64, _time_count: u64) -> Option<KeyDisplay> {
        None
    }

    /// Hidden tick, delivered to every button of the tree.
    fn on_internal_tick(&mut self, _ctx: &mut ItemContext<'_>, _time_i: u64, _time_count: u64) {}

    /// Data dispatched by an item of the same panel.
    fn on_dispatch(&mut self, _ctx: &mut ItemContext<'_>, _source: &str, _data: &Value) {}
}
