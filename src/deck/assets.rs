//! Asset indexes: icons, fonts and sounds.
//!
//! Icons start from the built-in set and are overridden by files found in the
//! configured icons directory. Fonts and user icons are loaded lazily on first
//! use and cached for the lifetime of the manager.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use fontdue::{Font, FontSettings};
use image::DynamicImage;
use tracing::{debug, info, warn};

use super::icons::{BUILTIN_ICONS, builtin};
use super::image::load_image;
use crate::config::AssetSettings;
use crate::error::{DpError, Result};

const ICON_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp"];
const FONT_EXTENSIONS: &[&str] = &["ttf", "otf"];
const SOUND_EXTENSIONS: &[&str] = &["wav", "mp3", "ogg", "flac"];

#[derive(Debug, Clone)]
enum IconSource {
    Builtin(Arc<DynamicImage>),
    File(PathBuf),
}

/// Caches icons, fonts and sounds by name.
pub struct AssetManager {
    icons: BTreeMap<String, IconSource>,
    fonts: BTreeMap<String, PathBuf>,
    sounds: BTreeMap<String, PathBuf>,
    default_font: Option<String>,
    icon_cache: Mutex<HashMap<String, Arc<DynamicImage>>>,
    font_cache: Mutex<HashMap<String, Arc<Font>>>,
}

impl std::fmt::Debug for AssetManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetManager")
            .field("icons", &self.icons.len())
            .field("fonts", &self.fonts.keys().collect::<Vec<_>>())
            .field("sounds", &self.sounds.len())
            .field("default_font", &self.default_font)
            .finish_non_exhaustive()
    }
}

impl Default for AssetManager {
    fn default() -> Self {
        Self::new(&AssetSettings::default())
    }
}

/// Files under `dir` with one of `extensions`, keyed by file stem.
fn index_directory(dir: Option<&Path>, what: &str, extensions: &[&str]) -> BTreeMap<String, PathBuf> {
    let mut found = BTreeMap::new();
    let Some(dir) = dir else {
        return found;
    };
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(directory = %dir.display(), error = %e, "Cannot read {what} directory");
            return found;
        }
    };
    for path in entries.filter_map(|e| e.ok().map(|e| e.path())) {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if what == "icons" && ext == "svg" {
            warn!(file = %path.display(), "SVG icons are not supported, skipping");
            continue;
        }
        if extensions.contains(&ext.as_str()) {
            debug!(name = stem, file = %path.display(), "Indexed {what} asset");
            found.insert(stem.to_string(), path.clone());
        }
    }
    found
}

impl AssetManager {
    /// Build the indexes from the configured directories.
    pub fn new(settings: &AssetSettings) -> Self {
        let mut icons: BTreeMap<String, IconSource> = BUILTIN_ICONS
            .iter()
            .filter_map(|name| builtin(name).map(|img| ((*name).to_string(), IconSource::Builtin(Arc::new(img)))))
            .collect();
        for (name, path) in index_directory(settings.icons_directory.as_deref(), "icons", ICON_EXTENSIONS) {
            icons.insert(name, IconSource::File(path));
        }
        let fonts = index_directory(settings.fonts_directory.as_deref(), "fonts", FONT_EXTENSIONS);
        let sounds = index_directory(settings.sounds_directory.as_deref(), "sounds", SOUND_EXTENSIONS);

        info!(
            icons = icons.len(),
            fonts = fonts.len(),
            sounds = sounds.len(),
            "Assets indexed"
        );
        Self {
            icons,
            fonts,
            sounds,
            default_font: settings.default_font.clone(),
            icon_cache: Mutex::new(HashMap::new()),
            font_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Register an in-memory font under `name`.
    pub fn add_font_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        let font = Font::from_bytes(bytes, FontSettings::default()).map_err(|e| DpError::FontLoad {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        self.fonts.insert(name.to_string(), PathBuf::new());
        self.font_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), Arc::new(font));
        Ok(())
    }

    /// Icon by asset name, or by path to an image file.
    pub fn icon(&self, name: &str) -> Option<Arc<DynamicImage>> {
        let path = match self.icons.get(name) {
            Some(IconSource::Builtin(img)) => return Some(Arc::clone(img)),
            Some(IconSource::File(path)) => path.clone(),
            None => {
                let path = PathBuf::from(name);
                if !path.is_file() {
                    debug!(icon = name, "Unknown icon");
                    return None;
                }
                path
            }
        };

        let mut cache = self.icon_cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(img) = cache.get(name) {
            return Some(Arc::clone(img));
        }
        match load_image(&path) {
            Ok(img) => {
                let img = Arc::new(img);
                cache.insert(name.to_string(), Arc::clone(&img));
                Some(img)
            }
            Err(e) => {
                warn!(icon = name, error = %e, "Failed to load icon");
                None
            }
        }
    }

    pub fn has_icon(&self, name: &str) -> bool {
        self.icons.contains_key(name)
    }

    /// Named font, parsed on first use.
    pub fn font(&self, name: &str) -> Option<Arc<Font>> {
        let mut cache = self.font_cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(font) = cache.get(name) {
            return Some(Arc::clone(font));
        }
        let path = self.fonts.get(name)?;
        let loaded = std::fs::read(path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| Font::from_bytes(bytes, FontSettings::default()).map_err(str::to_string));
        match loaded {
            Ok(font) => {
                let font = Arc::new(font);
                cache.insert(name.to_string(), Arc::clone(&font));
                Some(font)
            }
            Err(reason) => {
                warn!(font = name, error = %reason, "Failed to load font");
                None
            }
        }
    }

    /// Configured default font, else the first indexed font.
    pub fn default_font(&self) -> Option<Arc<Font>> {
        if let Some(name) = &self.default_font {
            if let Some(font) = self.font(name) {
                return Some(font);
            }
            warn!(font = %name, "Default font not found, falling back");
        }
        self.fonts.keys().next().and_then(|name| self.font(name))
    }

    pub fn sound(&self, name: &str) -> Option<&Path> {
        self.sounds.get(name).map(PathBuf::as_path)
    }

    pub fn icon_names(&self) -> impl Iterator<Item = &str> {
        self.icons.keys().map(String::as_str)
    }

    pub fn font_names(&self) -> impl Iterator<Item = &str> {
        self.fonts.keys().map(String::as_str)
    }

    pub fn sound_names(&self) -> impl Iterator<Item = &str> {
        self.sounds.keys().map(String::as_str)
    }
}
