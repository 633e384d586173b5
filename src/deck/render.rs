//! Key composition and device writes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use image::{DynamicImage, Rgb, RgbImage};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, trace};

use super::assets::AssetManager;
use super::image::{BLACK, WHITE, overlay_fit};
use super::text::{Anchor, draw_text};
use crate::device::SharedDeck;
use crate::error::Result;

/// Reference key height the margins and font sizes are expressed in.
const REFERENCE_HEIGHT: f32 = 72.0;
const CAPTION_MARGIN: u32 = 20;

/// What a single key should show.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyDisplay {
    pub text: Option<String>,
    pub label: Option<String>,
    pub icon: Option<String>,
    pub background: Option<Rgb<u8>>,
    pub text_color: Rgb<u8>,
    pub font: Option<String>,
    pub font_size: f32,
}

impl Default for KeyDisplay {
    fn default() -> Self {
        Self {
            text: None,
            label: None,
            icon: None,
            background: None,
            text_color: WHITE,
            font: None,
            font_size: 14.0,
        }
    }
}

impl KeyDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// A key showing only an icon.
    pub fn icon(name: impl Into<String>) -> Self {
        Self::new().with_icon(name)
    }

    /// A key showing large centred text.
    pub fn label(text: impl Into<String>) -> Self {
        Self {
            label: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub const fn with_background(mut self, color: Rgb<u8>) -> Self {
        self.background = Some(color);
        self
    }

    pub const fn with_text_color(mut self, color: Rgb<u8>) -> Self {
        self.text_color = color;
        self
    }

    pub fn with_font(mut self, font: impl Into<String>) -> Self {
        self.font = Some(font.into());
        self
    }
}

/// Composes [`KeyDisplay`]s and writes them to a deck.
///
/// Writes are skipped when a key already shows an identical image.
pub struct DeckRenderer {
    device: SharedDeck,
    assets: Arc<AssetManager>,
    last_written: Mutex<HashMap<u8, [u8; 32]>>,
}

impl DeckRenderer {
    pub fn new(device: SharedDeck, assets: Arc<AssetManager>) -> Self {
        Self {
            device,
            assets,
            last_written: Mutex::new(HashMap::new()),
        }
    }

    pub fn device(&self) -> &SharedDeck {
        &self.device
    }

    pub fn assets(&self) -> &Arc<AssetManager> {
        &self.assets
    }

    pub fn key_count(&self) -> u8 {
        self.device.key_count()
    }

    /// Compose a key image at the device key size.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn compose(&self, display: &KeyDisplay) -> RgbImage {
        let (width, height) = self.device.info().key_size();
        let scale = height as f32 / REFERENCE_HEIGHT;
        let mut canvas = RgbImage::from_pixel(width, height, display.background.unwrap_or(BLACK));

        if let Some(icon) = display.icon.as_deref().and_then(|name| self.assets.icon(name)) {
            let bottom = if display.text.is_some() {
                (CAPTION_MARGIN as f32 * scale).round() as u32
            } else {
                0
            };
            overlay_fit(&mut canvas, &icon, 0, 0, width, height.saturating_sub(bottom));
        }

        let font = display
            .font
            .as_deref()
            .and_then(|name| self.assets.font(name))
            .or_else(|| self.assets.default_font());
        let Some(font) = font else {
            if display.text.is_some() || display.label.is_some() {
                trace!("No font available, skipping text");
            }
            return canvas;
        };

        if let Some(label) = display.label.as_deref() {
            draw_text(&mut canvas, &font, label, height as f32 / 3.0, display.text_color, Anchor::Center);
        }
        if let Some(text) = display.text.as_deref() {
            draw_text(
                &mut canvas,
                &font,
                text,
                display.font_size * scale,
                display.text_color,
                Anchor::Bottom { margin: 5.0 * scale },
            );
        }
        canvas
    }

    /// Render `display` on `key`. Returns false when the key already showed it.
    #[instrument(skip(self, display), fields(serial = %self.device.serial()))]
    pub fn render_key(&self, key: u8, display: &KeyDisplay) -> Result<bool> {
        if !self.device.info().visual {
            trace!("Deck keys have no display");
            return Ok(false);
        }
        let image = self.compose(display);
        let digest: [u8; 32] = Sha256::digest(image.as_raw()).into();

        let mut last = self.last_written.lock().unwrap_or_else(PoisonError::into_inner);
        if last.get(&key) == Some(&digest) {
            trace!("Key unchanged, skipping write");
            return Ok(false);
        }
        self.device.set_key_image(key, &DynamicImage::ImageRgb8(image))?;
        last.insert(key, digest);
        Ok(true)
    }

    /// Show the `empty` icon on every key.
    pub fn clear_deck(&self) -> Result<()> {
        let empty = KeyDisplay::icon("empty");
        for key in 0..self.key_count() {
            self.render_key(key, &empty)?;
        }
        Ok(())
    }

    /// Reset the device and forget what each key shows.
    pub fn reset_deck(&self) -> Result<()> {
        debug!("Resetting deck");
        self.last_written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.device.reset()
    }
}
