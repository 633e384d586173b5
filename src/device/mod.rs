//! Device abstraction layer for Stream Deck devices.
//!
//! This module provides a trait-based abstraction over hardware decks and
//! the headless simulator, so the render loop never knows which it drives.

mod info;
mod real;
pub mod simulator;

pub use info::{DeviceInfo, DeviceModel, ELGATO_VENDOR_ID, KeyEvent, KeyImageFormat, ModelSpec};
pub use real::{HardwareDeck, RetryPolicy, list_hardware, open_hardware, open_hardware_with_retry};
pub use simulator::{SimulatedDeck, SimulatorConfig};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use image::DynamicImage;
use tracing::{debug, instrument};

use crate::error::{DpError, Result};

/// Core device operations trait.
///
/// # Implementation Notes
///
/// - Operations that modify device state flush internally
/// - Key indices are 0-based, left-to-right, top-to-bottom
/// - Images passed to `set_key_image` are already at the key size
pub trait DeckDevice: Send + Sync {
    /// Get device information.
    fn info(&self) -> &DeviceInfo;

    /// Check if the device is still connected.
    fn is_connected(&self) -> bool;

    /// Get device serial number.
    fn serial(&self) -> &str {
        &self.info().serial
    }

    fn key_count(&self) -> u8 {
        self.info().key_count
    }

    /// Set display brightness (0-100).
    fn set_brightness(&self, level: u8) -> Result<()>;

    /// Write a key image.
    fn set_key_image(&self, key: u8, image: &DynamicImage) -> Result<()>;

    /// Clear a single key (set to black).
    fn clear_key(&self, key: u8) -> Result<()>;

    /// Clear all keys (set to black).
    fn clear_all_keys(&self) -> Result<()>;

    /// Reset the device to its power-on state.
    fn reset(&self) -> Result<()>;

    /// Wait up to `timeout` for input.
    ///
    /// Returns the full key state vector when it changed, `None` on timeout.
    fn read_key_states(&self, timeout: Duration) -> Result<Option<Vec<bool>>>;
}

/// Shared handle to an open deck.
pub type SharedDeck = Arc<dyn DeckDevice>;

/// Validate a key index against a device's key count.
pub fn check_key(info: &DeviceInfo, key: usize) -> Result<u8> {
    if key >= usize::from(info.key_count) {
        return Err(DpError::InvalidKeyIndex {
            index: key,
            max: info.key_count,
        });
    }
    u8::try_from(key).map_err(|_| DpError::InvalidKeyIndex {
        index: key,
        max: info.key_count,
    })
}

/// Turns full key state vectors into press/release transitions.
#[derive(Debug, Clone)]
pub struct KeyStateTracker {
    states: Vec<bool>,
}

impl KeyStateTracker {
    pub fn new(key_count: u8) -> Self {
        Self {
            states: vec![false; usize::from(key_count)],
        }
    }

    pub fn states(&self) -> &[bool] {
        &self.states
    }

    /// Record a new state vector and return the keys that changed.
    #[allow(clippy::cast_possible_truncation)] // Key count is always < 256
    pub fn update(&mut self, states: &[bool]) -> Vec<KeyEvent> {
        if states.len() > self.states.len() {
            self.states.resize(states.len(), false);
        }
        let mut events = Vec::new();
        for (key, (&now, before)) in states.iter().zip(self.states.iter_mut()).enumerate() {
            if now != *before {
                *before = now;
                events.push(KeyEvent {
                    key: key as u8,
                    pressed: now,
                });
            }
        }
        events
    }
}

/// Where decks come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeckBackend {
    Hardware,
    /// Headless simulator, optionally described by a TOML file.
    Simulator { config: Option<PathBuf> },
}

impl DeckBackend {
    pub fn from_flags(use_simulator: bool, config: Option<PathBuf>) -> Self {
        if use_simulator {
            Self::Simulator { config }
        } else {
            Self::Hardware
        }
    }
}

/// Which deck to open: serial wins over index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeckSelector {
    pub serial: Option<String>,
    pub index: Option<usize>,
}

impl DeckSelector {
    pub fn serial(serial: impl Into<String>) -> Self {
        Self {
            serial: Some(serial.into()),
            index: None,
        }
    }

    pub const fn index(index: usize) -> Self {
        Self {
            serial: None,
            index: Some(index),
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.serial.is_none() && self.index.is_none()
    }

    /// Fill missing fields from `fallback`.
    pub fn or(self, fallback: Self) -> Self {
        if self.is_empty() { fallback } else { self }
    }

    /// Pick a device position from an enumeration.
    pub fn select(&self, devices: &[DeviceInfo]) -> Result<usize> {
        if devices.is_empty() {
            return Err(DpError::NoDevicesFound);
        }
        if let Some(serial) = &self.serial {
            return devices
                .iter()
                .position(|d| &d.serial == serial)
                .ok_or_else(|| DpError::DeviceNotFound {
                    serial: serial.clone(),
                });
        }
        match self.index {
            Some(index) if index < devices.len() => Ok(index),
            Some(index) => Err(DpError::DeviceIndexOutOfRange {
                index,
                count: devices.len(),
            }),
            None => Err(DpError::NoDeviceSelector),
        }
    }
}

/// Enumerate decks of a backend.
#[instrument]
pub fn list_devices(backend: &DeckBackend) -> Result<Vec<DeviceInfo>> {
    match backend {
        DeckBackend::Hardware => list_hardware(),
        DeckBackend::Simulator { config } => Ok(SimulatorConfig::load_or_default(config.as_deref())?
            .build()
            .iter()
            .map(|deck| deck.info().clone())
            .collect()),
    }
}

/// Open the deck chosen by `selector`.
#[instrument]
pub fn open_deck(backend: &DeckBackend, selector: &DeckSelector) -> Result<SharedDeck> {
    match backend {
        DeckBackend::Hardware => Ok(Arc::new(open_hardware_with_retry(
            selector,
            &RetryPolicy::default(),
        )?)),
        DeckBackend::Simulator { config } => {
            let decks = SimulatorConfig::load_or_default(config.as_deref())?.build();
            let infos: Vec<_> = decks.iter().map(|d| d.info().clone()).collect();
            let position = selector.select(&infos)?;
            let deck = decks
                .into_iter()
                .nth(position)
                .ok_or(DpError::NoDevicesFound)?;
            deck.open();
            debug!(serial = %deck.serial(), "Opened simulated deck");
            Ok(Arc::new(deck))
        }
    }
}
