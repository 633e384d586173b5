//! What the rest of the crate knows about a deck: its [`DeviceInfo`] and, for
//! simulated decks, the [`DeviceModel`] it imitates.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::DpError;

pub const ELGATO_VENDOR_ID: u16 = 0x0fd9;

/// Key image encoding expected by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyImageFormat {
    /// BMP, JPEG or NONE
    pub format: String,
    /// Mirroring on (x, y)
    pub flip: (bool, bool),
    /// Degrees
    pub rotation: u16,
}

/// A hardware or simulated deck as reported by `devices` and `show`.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub id: String,
    pub serial: String,
    pub product_name: String,
    pub firmware_version: String,
    pub key_count: u8,
    pub key_width: usize,
    pub key_height: usize,
    pub rows: u8,
    pub cols: u8,
    /// Model name, `Original` or `Xl` for example.
    pub kind: String,
    pub vendor_id: u16,
    pub product_id: u16,
    /// False for decks whose keys have no display.
    pub visual: bool,
    pub connected: bool,
    pub simulated: bool,
    pub image_format: KeyImageFormat,
}

impl DeviceInfo {
    /// Pixel size of a key as `u32`s for the image crate.
    #[allow(clippy::cast_possible_truncation)] // Key dimensions are always small
    pub const fn key_size(&self) -> (u32, u32) {
        (self.key_width as u32, self.key_height as u32)
    }
}

/// Known deck models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceModel {
    Original,
    OriginalV2,
    Mk2,
    Mini,
    MiniMk2,
    Xl,
    XlV2,
    Plus,
    Neo,
    /// Three keys without displays.
    Pedal,
    /// 45 keys on a 15x3 grid; has no hardware counterpart.
    VirtualPad,
}

/// Geometry and naming of one [`DeviceModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    pub cols: u8,
    pub rows: u8,
    /// Zero for keys without a display.
    pub key_px: u32,
    pub name: &'static str,
    /// Name used in simulator configs.
    pub type_name: &'static str,
    /// Tag inside default serials such as `SIM-XL-001`.
    pub serial_tag: &'static str,
}

const fn model(cols: u8, rows: u8, key_px: u32, name: &'static str, type_name: &'static str, serial_tag: &'static str) -> ModelSpec {
    ModelSpec {
        cols,
        rows,
        key_px,
        name,
        type_name,
        serial_tag,
    }
}

const ORIGINAL: ModelSpec = model(5, 3, 72, "Stream Deck (Original)", "original", "ORIGINAL");
const ORIGINAL_V2: ModelSpec = model(5, 3, 72, "Stream Deck (Original V2)", "original_v2", "ORIGINALV2");
const MK2: ModelSpec = model(5, 3, 72, "Stream Deck MK.2", "mk2", "MK2");
const MINI: ModelSpec = model(3, 2, 80, "Stream Deck Mini", "mini", "MINI");
const MINI_MK2: ModelSpec = model(3, 2, 80, "Stream Deck Mini MK.2", "mini_mk2", "MINIMK2");
const XL: ModelSpec = model(8, 4, 96, "Stream Deck XL", "xl", "XL");
const XL_V2: ModelSpec = model(8, 4, 96, "Stream Deck XL V2", "xl_v2", "XLV2");
const PLUS: ModelSpec = model(4, 2, 120, "Stream Deck +", "plus", "PLUS");
const NEO: ModelSpec = model(4, 2, 96, "Stream Deck Neo", "neo", "NEO");
const PEDAL: ModelSpec = model(3, 1, 0, "Stream Deck Pedal", "pedal", "PEDAL");
const VIRTUAL_PAD: ModelSpec = model(15, 3, 72, "Stream Deck Virtual Pad", "virtual_pad", "VPAD");

impl DeviceModel {
    /// Default enumeration order of the simulator.
    pub const SIMULATED: [Self; 4] = [Self::Original, Self::Mini, Self::Xl, Self::VirtualPad];

    pub const ALL: [Self; 11] = [
        Self::Original,
        Self::OriginalV2,
        Self::Mk2,
        Self::Mini,
        Self::MiniMk2,
        Self::Xl,
        Self::XlV2,
        Self::Plus,
        Self::Neo,
        Self::Pedal,
        Self::VirtualPad,
    ];

    pub const fn spec(self) -> &'static ModelSpec {
        match self {
            Self::Original => &ORIGINAL,
            Self::OriginalV2 => &ORIGINAL_V2,
            Self::Mk2 => &MK2,
            Self::Mini => &MINI,
            Self::MiniMk2 => &MINI_MK2,
            Self::Xl => &XL,
            Self::XlV2 => &XL_V2,
            Self::Plus => &PLUS,
            Self::Neo => &NEO,
            Self::Pedal => &PEDAL,
            Self::VirtualPad => &VIRTUAL_PAD,
        }
    }

    pub const fn key_count(self) -> u8 {
        let spec = self.spec();
        spec.cols * spec.rows
    }

    /// Key image size in pixels; keys are square.
    pub const fn key_dimensions(self) -> (u32, u32) {
        (self.spec().key_px, self.spec().key_px)
    }

    /// Whether the keys can show images.
    pub const fn has_display(self) -> bool {
        self.spec().key_px > 0
    }

    /// `(columns, rows)`.
    pub const fn layout(self) -> (u8, u8) {
        (self.spec().cols, self.spec().rows)
    }

    pub const fn display_name(self) -> &'static str {
        self.spec().name
    }

    pub const fn type_name(self) -> &'static str {
        self.spec().type_name
    }

    /// Serial given to the `index`-th simulated deck when none is configured.
    pub fn default_serial(self, index: usize) -> String {
        format!("SIM-{}-{index:03}", self.spec().serial_tag)
    }
}

impl FromStr for DeviceModel {
    type Err = DpError;

    /// Accepts `xl`, `XL` and `streamdeck_xl` alike.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        let bare = wanted.strip_prefix("streamdeck_").unwrap_or(&wanted);
        Self::ALL
            .into_iter()
            .find(|model| model.type_name() == bare)
            .ok_or_else(|| DpError::SimulatorConfig(format!("Unsupported device type '{wanted}'")))
    }
}

impl fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Key press/release transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyEvent {
    pub key: u8,
    pub pressed: bool,
}
