//! Headless Stream Deck simulator.
//!
//! A [`SimulatedDeck`] behaves like a hardware deck towards the rest of the
//! crate: it stores the last image written to each key, clamps brightness,
//! and produces key state vectors when keys are pressed programmatically.
//! Every operation is recorded so tests can assert on what happened.
//!
//! # Example
//!
//! ```rust,ignore
//! use deckpilot::device::{DeckDevice, DeviceModel, SimulatedDeck};
//!
//! let deck = SimulatedDeck::new(DeviceModel::Original, "SIM-ORIGINAL-001");
//! deck.open();
//! deck.press_key(3)?;
//! assert_eq!(deck.read_key_states(Duration::ZERO)?, Some(states_with_key_3_down));
//! ```

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use image::DynamicImage;
use serde::Deserialize;
use tracing::{debug, trace};

use super::info::{DeviceInfo, DeviceModel, ELGATO_VENDOR_ID, KeyImageFormat};
use super::{DeckDevice, check_key};
use crate::error::{DpError, Result};

const SIMULATOR_PRODUCT_ID: u16 = 0x0060;

/// Recorded operation for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    SetBrightness { level: u8 },
    SetKeyImage { key: u8 },
    ClearKey { key: u8 },
    ClearAllKeys,
    Reset,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process stand-in for a Stream Deck.
pub struct SimulatedDeck {
    info: DeviceInfo,
    open: AtomicBool,
    brightness: AtomicU8,
    key_states: Mutex<Vec<bool>>,
    key_images: Mutex<Vec<Option<DynamicImage>>>,
    pending: Mutex<VecDeque<Vec<bool>>>,
    operation_log: Mutex<Vec<Operation>>,
    error_injection: Mutex<Option<DpError>>,
}

impl SimulatedDeck {
    /// Create a closed simulated deck of the given model.
    #[must_use]
    pub fn new(model: DeviceModel, serial: impl Into<String>) -> Self {
        let serial = serial.into();
        let (cols, rows) = model.layout();
        let (width, height) = model.key_dimensions();
        let key_count = model.key_count();
        debug!(?model, serial = %serial, "Creating simulated deck");

        Self {
            info: DeviceInfo {
                id: format!("simulator-{serial}"),
                product_name: format!("{} (Simulator)", model.display_name()),
                serial,
                firmware_version: "1.0.0".to_string(),
                key_count,
                key_width: width as usize,
                key_height: height as usize,
                rows,
                cols,
                kind: format!("{model:?}"),
                vendor_id: ELGATO_VENDOR_ID,
                product_id: SIMULATOR_PRODUCT_ID,
                visual: model.has_display(),
                connected: true,
                simulated: true,
                image_format: KeyImageFormat {
                    format: "BMP".to_string(),
                    flip: (true, true),
                    rotation: 0,
                },
            },
            open: AtomicBool::new(false),
            brightness: AtomicU8::new(100),
            key_states: Mutex::new(vec![false; usize::from(key_count)]),
            key_images: Mutex::new(vec![None; usize::from(key_count)]),
            pending: Mutex::new(VecDeque::new()),
            operation_log: Mutex::new(Vec::new()),
            error_injection: Mutex::new(None),
        }
    }

    /// Open the deck for input.
    pub fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
    }

    /// Close the deck; reads then report a disconnect.
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        lock(&self.pending).clear();
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    // === Input Simulation ===

    /// Simulate pressing a key. No-op if already pressed.
    pub fn press_key(&self, key: usize) -> Result<()> {
        self.set_key_state(key, true)
    }

    /// Simulate releasing a key. No-op if not pressed.
    pub fn release_key(&self, key: usize) -> Result<()> {
        self.set_key_state(key, false)
    }

    fn set_key_state(&self, key: usize, pressed: bool) -> Result<()> {
        check_key(&self.info, key)?;
        let mut states = lock(&self.key_states);
        if states[key] == pressed {
            return Ok(());
        }
        states[key] = pressed;
        if self.is_open() {
            trace!(key, pressed, "Queueing simulated key change");
            lock(&self.pending).push_back(states.clone());
        }
        Ok(())
    }

    pub fn key_states(&self) -> Vec<bool> {
        lock(&self.key_states).clone()
    }

    // === Inspection ===

    /// Last image written to a key.
    pub fn key_image(&self, key: usize) -> Result<Option<DynamicImage>> {
        check_key(&self.info, key)?;
        Ok(lock(&self.key_images)[key].clone())
    }

    pub fn brightness(&self) -> u8 {
        self.brightness.load(Ordering::SeqCst)
    }

    /// Get all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<Operation> {
        lock(&self.operation_log).clone()
    }

    /// Clear the operation log for fresh assertions.
    pub fn clear_operations(&self) {
        lock(&self.operation_log).clear();
    }

    /// Number of image writes to one key since the log was cleared.
    pub fn writes_to(&self, key: u8) -> usize {
        lock(&self.operation_log)
            .iter()
            .filter(|op| matches!(op, Operation::SetKeyImage { key: k } if *k == key))
            .count()
    }

    /// Inject an error for the next output operation.
    pub fn inject_error(&self, error: DpError) {
        *lock(&self.error_injection) = Some(error);
    }

    fn record_op(&self, op: Operation) {
        trace!(?op, "Recording operation");
        lock(&self.operation_log).push(op);
    }

    fn check_error(&self) -> Result<()> {
        if let Some(error) = lock(&self.error_injection).take() {
            return Err(error);
        }
        Ok(())
    }
}

impl DeckDevice for SimulatedDeck {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn is_connected(&self) -> bool {
        self.is_open()
    }

    fn set_brightness(&self, level: u8) -> Result<()> {
        self.check_error()?;
        self.record_op(Operation::SetBrightness { level });
        self.brightness.store(level.min(100), Ordering::SeqCst);
        Ok(())
    }

    fn set_key_image(&self, key: u8, image: &DynamicImage) -> Result<()> {
        self.check_error()?;
        check_key(&self.info, usize::from(key))?;
        self.record_op(Operation::SetKeyImage { key });
        lock(&self.key_images)[usize::from(key)] = Some(image.clone());
        Ok(())
    }

    fn clear_key(&self, key: u8) -> Result<()> {
        self.check_error()?;
        check_key(&self.info, usize::from(key))?;
        self.record_op(Operation::ClearKey { key });
        lock(&self.key_images)[usize::from(key)] = None;
        Ok(())
    }

    fn clear_all_keys(&self) -> Result<()> {
        self.check_error()?;
        self.record_op(Operation::ClearAllKeys);
        lock(&self.key_images).iter_mut().for_each(|img| *img = None);
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        self.check_error()?;
        self.record_op(Operation::Reset);
        lock(&self.key_images).iter_mut().for_each(|img| *img = None);
        Ok(())
    }

    fn read_key_states(&self, timeout: Duration) -> Result<Option<Vec<bool>>> {
        if !self.is_open() {
            return Err(DpError::DeviceClosed {
                serial: self.info.serial.clone(),
            });
        }
        if let Some(states) = lock(&self.pending).pop_front() {
            return Ok(Some(states));
        }
        if !timeout.is_zero() {
            std::thread::sleep(timeout);
        }
        Ok(lock(&self.pending).pop_front())
    }
}

/// One `[[devices]]` entry of a simulator config.
#[derive(Debug, Clone, Deserialize)]
struct DeviceEntry {
    #[serde(rename = "type")]
    kind: Option<String>,
    serial: Option<String>,
    serial_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSimulatorConfig {
    #[serde(default)]
    devices: Vec<DeviceEntry>,
}

/// Simulated decks to expose, in enumeration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatorConfig {
    pub devices: Vec<(DeviceModel, String)>,
}

impl Default for SimulatorConfig {
    /// One deck of each simulated model.
    fn default() -> Self {
        Self {
            devices: DeviceModel::SIMULATED
                .iter()
                .map(|&model| (model, model.default_serial(1)))
                .collect(),
        }
    }
}

impl SimulatorConfig {
    /// Load `[[devices]]` entries from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DpError::SimulatorConfig(format!(
                "Configuration file '{}' does not exist",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text).map_err(|e| match e {
            DpError::SimulatorConfig(msg) if msg.starts_with("Unable to parse") => {
                DpError::SimulatorConfig(format!("Unable to parse '{}': {msg}", path.display()))
            }
            other => other,
        })
    }

    pub fn parse(text: &str) -> Result<Self> {
        let raw: RawSimulatorConfig = toml::from_str(text)
            .map_err(|e| DpError::SimulatorConfig(format!("Unable to parse: {e}")))?;
        if raw.devices.is_empty() {
            return Err(DpError::SimulatorConfig(
                "Configuration must define at least one device".to_string(),
            ));
        }

        let devices = raw
            .devices
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let index = i + 1;
                let kind = entry.kind.as_deref().ok_or_else(|| {
                    DpError::SimulatorConfig(format!(
                        "Device #{index} missing required 'type' field"
                    ))
                })?;
                let model: DeviceModel = kind.parse()?;
                let serial = entry
                    .serial
                    .clone()
                    .or_else(|| entry.serial_number.clone())
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| {
                        format!("SIM-{}-{index:03}", kind.trim().to_ascii_uppercase())
                    });
                Ok((model, serial))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { devices })
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    /// Instantiate closed decks.
    pub fn build(&self) -> Vec<SimulatedDeck> {
        self.devices
            .iter()
            .map(|(model, serial)| SimulatedDeck::new(*model, serial.clone()))
            .collect()
    }
}
