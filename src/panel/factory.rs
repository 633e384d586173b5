//! Maps button class names to constructors.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::button::Button;
use super::buttons::{
    ClockButton, CountdownButton, EventButton, LaunchButton, MessageButton, StaticButton,
    TimerStartButton,
};
use crate::error::{DpError, Result};

/// Everything needed to build one button.
#[derive(Debug, Clone, Default)]
pub struct ButtonSpec {
    pub name: String,
    pub class: String,
    pub params: Map<String, Value>,
    pub icon: Option<String>,
    pub icon_pressed: Option<String>,
}

pub type ButtonBuilder = Arc<dyn Fn(&ButtonSpec) -> anyhow::Result<Box<dyn Button>> + Send + Sync>;

/// Registry of button constructors keyed by class name.
#[derive(Clone)]
pub struct ButtonFactory {
    builders: BTreeMap<String, ButtonBuilder>,
}

impl fmt::Debug for ButtonFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ButtonFactory")
            .field("classes", &self.builders.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for ButtonFactory {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ButtonFactory {
    /// A factory with no classes at all.
    pub fn empty() -> Self {
        Self {
            builders: BTreeMap::new(),
        }
    }

    /// A factory knowing every built-in button kind.
    pub fn with_builtins() -> Self {
        let mut factory = Self::empty();
        for class in ["button", "default"] {
            factory.register(class, |spec| Ok(Box::new(StaticButton::from_spec(spec))));
        }
        for class in ["message", "hello"] {
            factory.register(class, |spec| Ok(Box::new(MessageButton::from_spec(spec))));
        }
        factory.register("launch", |spec| Ok(Box::new(LaunchButton::from_spec(spec)?)));
        factory.register("clock", |spec| Ok(Box::new(ClockButton::from_spec(spec)?)));
        factory.register("countdown", |spec| Ok(Box::new(CountdownButton::from_spec(spec))));
        factory.register("timer_start", |spec| Ok(Box::new(TimerStartButton::from_spec(spec)?)));
        factory.register("event", |spec| Ok(Box::new(EventButton::from_spec(spec)?)));
        factory
    }

    /// Register (or replace) a class.
    pub fn register<F>(&mut self, class: &str, builder: F)
    where
        F: Fn(&ButtonSpec) -> anyhow::Result<Box<dyn Button>> + Send + Sync + 'static,
    {
        self.builders.insert(class.to_string(), Arc::new(builder));
    }

    pub fn contains(&self, class: &str) -> bool {
        self.builders.contains_key(class)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.builders.keys().map(String::as_str)
    }

    /// Build a button; `panel` only labels the error.
    pub fn create(&self, panel: &str, spec: &ButtonSpec) -> Result<Box<dyn Button>> {
        let builder = self.builders.get(&spec.class).ok_or_else(|| DpError::PanelLoad {
            panel: panel.to_string(),
            reason: format!("item '{}': unknown button class '{}'", spec.name, spec.class),
        })?;
        builder(spec).map_err(|e| DpError::PanelLoad {
            panel: panel.to_string(),
            reason: format!("item '{}': {e:#}", spec.name),
        })
    }
}
