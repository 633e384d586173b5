//! Hardware Stream Deck implementation.
//!
//! This module wraps the `elgato-streamdeck` crate to provide
//! the concrete device implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use elgato_streamdeck::info::{ImageMirroring, ImageMode, ImageRotation, Kind};
use elgato_streamdeck::{StreamDeck, StreamDeckError, StreamDeckInput};
use hidapi::HidApi;
use image::DynamicImage;
use tracing::{debug, error, info, trace, warn};

use super::info::{DeviceInfo, DeviceModel, ELGATO_VENDOR_ID, KeyImageFormat};
use super::{DeckDevice, DeckSelector, check_key};
use crate::error::{DpError, Result};

/// Hardware Stream Deck wrapper.
pub struct HardwareDeck {
    inner: Mutex<StreamDeck>,
    info: DeviceInfo,
    connected: AtomicBool,
}

fn comm_error(e: &StreamDeckError) -> DpError {
    DpError::DeviceCommunication(e.to_string())
}

impl HardwareDeck {
    fn with_deck<T>(
        &self,
        f: impl FnOnce(&StreamDeck) -> std::result::Result<T, StreamDeckError>,
    ) -> Result<T> {
        let deck = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&deck).map_err(|e| {
            if matches!(e, StreamDeckError::HidError(_)) {
                warn!(serial = %self.info.serial, error = %e, "Deck I/O failed, marking disconnected");
                self.connected.store(false, Ordering::SeqCst);
            }
            comm_error(&e)
        })
    }
}

impl DeckDevice for HardwareDeck {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn set_brightness(&self, level: u8) -> Result<()> {
        if level > 100 {
            return Err(DpError::InvalidBrightness {
                value: i64::from(level),
            });
        }
        self.with_deck(|deck| deck.set_brightness(level))
    }

    fn set_key_image(&self, key: u8, image: &DynamicImage) -> Result<()> {
        check_key(&self.info, usize::from(key))?;
        self.with_deck(|deck| {
            deck.set_button_image(key, image.clone())?;
            deck.flush()
        })
    }

    fn clear_key(&self, key: u8) -> Result<()> {
        check_key(&self.info, usize::from(key))?;
        self.with_deck(|deck| {
            deck.clear_button_image(key)?;
            deck.flush()
        })
    }

    fn clear_all_keys(&self) -> Result<()> {
        self.with_deck(|deck| {
            deck.clear_all_button_images()?;
            deck.flush()
        })
    }

    fn reset(&self) -> Result<()> {
        self.with_deck(StreamDeck::reset)
    }

    fn read_key_states(&self, timeout: Duration) -> Result<Option<Vec<bool>>> {
        match self.with_deck(|deck| deck.read_input(Some(timeout)))? {
            StreamDeckInput::ButtonStateChange(states) => {
                trace!(?states, "Button state change");
                Ok(Some(states))
            }
            _ => Ok(None),
        }
    }
}

fn hid() -> Result<HidApi> {
    elgato_streamdeck::new_hidapi().map_err(|e| DpError::DeviceCommunication(e.to_string()))
}

fn image_format(kind: Kind) -> KeyImageFormat {
    let format = kind.key_image_format();
    KeyImageFormat {
        format: match format.mode {
            ImageMode::BMP => "BMP",
            ImageMode::JPEG => "JPEG",
            _ => "NONE",
        }
        .to_string(),
        flip: match format.mirror {
            ImageMirroring::X => (true, false),
            ImageMirroring::Y => (false, true),
            ImageMirroring::Both => (true, true),
            ImageMirroring::None => (false, false),
        },
        rotation: match format.rotation {
            ImageRotation::Rot0 => 0,
            ImageRotation::Rot90 => 90,
            ImageRotation::Rot180 => 180,
            ImageRotation::Rot270 => 270,
        },
    }
}

fn describe(kind: Kind, serial: String, firmware: String) -> DeviceInfo {
    let size = kind.key_image_format().size;
    DeviceInfo {
        id: format!("hid-{serial}"),
        serial,
        product_name: kind_to_name(kind),
        firmware_version: firmware,
        key_count: kind.key_count(),
        key_width: size.0,
        key_height: size.1,
        rows: kind.row_count(),
        cols: kind.column_count(),
        kind: format!("{kind:?}"),
        vendor_id: ELGATO_VENDOR_ID,
        product_id: kind.product_id(),
        visual: size != (0, 0),
        connected: true,
        simulated: false,
        image_format: image_format(kind),
    }
}

/// List all connected Stream Deck devices.
pub fn list_hardware() -> Result<Vec<DeviceInfo>> {
    let hid = hid()?;
    let devices = elgato_streamdeck::list_devices(&hid);
    debug!(count = devices.len(), "Enumerated HID decks");

    Ok(devices
        .into_iter()
        .map(|(kind, serial)| describe(kind, serial, String::new()))
        .collect())
}

/// Open the hardware deck chosen by `selector`.
///
/// With an empty selector and exactly one deck attached, that deck is used.
pub fn open_hardware(selector: &DeckSelector) -> Result<HardwareDeck> {
    let hid = hid()?;
    let devices = elgato_streamdeck::list_devices(&hid);
    if devices.is_empty() {
        return Err(DpError::NoDevicesFound);
    }

    let position = if selector.is_empty() && devices.len() == 1 {
        0
    } else {
        let infos: Vec<_> = devices
            .iter()
            .map(|(kind, serial)| describe(*kind, serial.clone(), String::new()))
            .collect();
        selector.select(&infos)?
    };
    let (kind, serial) = devices[position].clone();

    let inner = StreamDeck::connect(&hid, kind, &serial).map_err(|e| DpError::DeviceOpenFailed {
        serial: serial.clone(),
        reason: e.to_string(),
    })?;
    let firmware = inner
        .firmware_version()
        .unwrap_or_else(|_| "unknown".to_string());
    info!(serial = %serial, kind = ?kind, firmware = %firmware, "Opened Stream Deck");

    Ok(HardwareDeck {
        inner: Mutex::new(inner),
        info: describe(kind, serial, firmware),
        connected: AtomicBool::new(true),
    })
}

/// How often `open_hardware_with_retry` tries before giving up.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub first_delay: Duration,
    pub backoff: f32,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            first_delay: Duration::from_millis(500),
            backoff: 2.0,
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    fn next_delay(&self, delay: Duration) -> Duration {
        delay.mul_f32(self.backoff).min(self.max_delay)
    }
}

/// [`open_hardware`], retried while the failure looks like a USB hiccup.
///
/// Selector errors such as an unknown serial fail on the first attempt.
pub fn open_hardware_with_retry(selector: &DeckSelector, policy: &RetryPolicy) -> Result<HardwareDeck> {
    let attempts = policy.attempts.max(1);
    let mut delay = policy.first_delay;
    for attempt in 1..attempts {
        match open_hardware(selector) {
            Err(e) if e.is_connection_error() => {
                warn!(attempt, attempts, error = %e, delay_ms = delay.as_millis(), "Deck not ready, retrying");
                std::thread::sleep(delay);
                delay = policy.next_delay(delay);
            }
            other => return other,
        }
    }
    open_hardware(selector).inspect_err(|e| error!(attempts, error = %e, "Giving up on the deck"))
}

/// The model table entry for a hardware kind.
const fn model_of(kind: Kind) -> Option<DeviceModel> {
    Some(match kind {
        Kind::Original => DeviceModel::Original,
        Kind::OriginalV2 => DeviceModel::OriginalV2,
        Kind::Mk2 => DeviceModel::Mk2,
        Kind::Mini => DeviceModel::Mini,
        Kind::MiniMk2 => DeviceModel::MiniMk2,
        Kind::Xl => DeviceModel::Xl,
        Kind::XlV2 => DeviceModel::XlV2,
        Kind::Plus => DeviceModel::Plus,
        Kind::Neo => DeviceModel::Neo,
        Kind::Pedal => DeviceModel::Pedal,
        _ => return None,
    })
}

fn kind_to_name(kind: Kind) -> String {
    model_of(kind)
        .map_or("Unknown Stream Deck", DeviceModel::display_name)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_is_capped() {
        let policy = RetryPolicy::default();
        let delays: Vec<_> = std::iter::successors(Some(policy.first_delay), |d| Some(policy.next_delay(*d)))
            .take(5)
            .collect();
        assert_eq!(delays[1], Duration::from_secs(1));
        assert_eq!(delays[4], Duration::from_secs(5));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(kind_to_name(Kind::Xl), "Stream Deck XL");
        assert_eq!(kind_to_name(Kind::Plus), "Stream Deck +");
        assert_eq!(model_of(Kind::Pedal), Some(DeviceModel::Pedal));
        assert_eq!(describe(Kind::Mini, "M1".into(), String::new()).key_count, 6);
    }
}
