//! Path resolution for the config file.
//!
//! Supports absolute paths, paths relative to the config file, and "~" home
//! directory expansion.

use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

use crate::error::{DpError, Result};

const APP_DIR: &str = "deckpilot";
const CONFIG_FILE: &str = "config.toml";

/// Resolve a path found in a config file.
///
/// Resolution rules:
/// 1. Paths starting with `~`: expanded to home directory
/// 2. Absolute paths: used as-is
/// 3. Relative paths: resolved relative to `config_dir`
pub fn resolve_path(path: &Path, config_dir: &Path) -> Result<PathBuf> {
    trace!(
        path = %path.display(),
        config_dir = %config_dir.display(),
        "Resolving path"
    );

    let path_str = path.to_string_lossy();
    if path_str == "~" || path_str.starts_with("~/") {
        let home = home_dir()?;
        let resolved = match path_str.strip_prefix("~/") {
            Some(rest) if !rest.is_empty() => home.join(rest),
            _ => home,
        };
        debug!(original = %path.display(), resolved = %resolved.display(), "Expanded home directory path");
        return Ok(resolved);
    }

    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(config_dir.join(path))
}

/// The user's home directory.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .ok_or_else(|| DpError::ConfigInvalid("Could not determine home directory".to_string()))
}

/// `~/.config/deckpilot/config.toml`, or the platform equivalent.
pub fn default_config_path() -> Result<PathBuf> {
    let base = match dirs::config_dir() {
        Some(dir) => dir,
        None => home_dir()?.join(".config"),
    };
    Ok(base.join(APP_DIR).join(CONFIG_FILE))
}

/// Resolves paths relative to one config file.
#[derive(Debug, Clone)]
pub struct PathResolver {
    config_dir: PathBuf,
}

impl PathResolver {
    pub fn new(config_path: &Path) -> Self {
        let config_dir = config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let config_dir = config_dir.canonicalize().unwrap_or_else(|_| {
            warn!(config_dir = %config_dir.display(), "Failed to canonicalize config directory");
            config_dir.to_path_buf()
        });
        Self { config_dir }
    }

    pub fn resolve(&self, path: &Path) -> Result<PathBuf> {
        resolve_path(path, &self.config_dir)
    }

    /// Resolve an optional path in place.
    pub fn resolve_in_place(&self, path: &mut Option<PathBuf>) -> Result<()> {
        if let Some(p) = path.as_mut() {
            *p = self.resolve(p)?;
        }
        Ok(())
    }

    pub const fn config_dir(&self) -> &PathBuf {
        &self.config_dir
    }
}
