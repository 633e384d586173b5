//! Dotted-key reads and writes on the raw config document.
//!
//! Edits go through `toml::Table` rather than [`AppConfig`](super::AppConfig)
//! so keys the typed config does not know about survive a round trip.

use std::path::{Path, PathBuf};

use toml::{Table, Value};
use tracing::{debug, info};

use crate::error::{DpError, Result};

/// A config file opened for editing.
#[derive(Debug, Clone)]
pub struct ConfigDocument {
    path: PathBuf,
    table: Table,
}

impl ConfigDocument {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(DpError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }
        let text = std::fs::read_to_string(path)?;
        let table = text
            .parse::<Table>()
            .map_err(|e| DpError::ConfigParse(e.to_string()))?;
        Ok(Self {
            path: path.to_path_buf(),
            table,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub const fn table(&self) -> &Table {
        &self.table
    }

    /// Value at a dotted key such as `streamdeck.brightness`.
    pub fn get(&self, key: &str) -> Result<&Value> {
        let segments = split_key(key)?;
        let not_found = || DpError::ConfigKeyNotFound { key: key.to_string() };
        let (last, parents) = segments.split_last().ok_or_else(not_found)?;
        let mut table = &self.table;
        for segment in parents {
            table = table
                .get(*segment)
                .and_then(Value::as_table)
                .ok_or_else(not_found)?;
        }
        table.get(*last).ok_or_else(not_found)
    }

    /// Set a dotted key from its string form and return the stored value.
    ///
    /// `raw` is coerced to the type of the current value; new keys and
    /// string values store `raw` as is. Missing tables are created.
    pub fn set(&mut self, key: &str, raw: &str) -> Result<Value> {
        let segments = split_key(key)?;
        let value_error = |reason: String| DpError::ConfigValue {
            key: key.to_string(),
            reason,
        };
        let Some((last, parents)) = segments.split_last() else {
            return Err(DpError::ConfigKeyNotFound { key: key.to_string() });
        };

        let mut table = &mut self.table;
        for segment in parents {
            let entry = table
                .entry((*segment).to_string())
                .or_insert_with(|| Value::Table(Table::new()));
            table = entry
                .as_table_mut()
                .ok_or_else(|| value_error(format!("'{segment}' is not a table")))?;
        }

        let value = match table.get(*last) {
            Some(current) => coerce(raw, current).map_err(value_error)?,
            None => Value::String(raw.to_string()),
        };
        debug!(key, value = %value, "Setting config value");
        table.insert((*last).to_string(), value.clone());
        Ok(value)
    }

    pub fn to_pretty_string(&self) -> Result<String> {
        toml::to_string_pretty(&self.table).map_err(|e| DpError::ConfigParse(e.to_string()))
    }

    /// Write the document back to its file.
    pub fn save(&self) -> Result<()> {
        let text = self.to_pretty_string()?;
        std::fs::write(&self.path, text)?;
        info!(path = %self.path.display(), "Configuration saved");
        Ok(())
    }
}

fn split_key(key: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = key
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if segments.is_empty() {
        return Err(DpError::ConfigKeyNotFound { key: key.to_string() });
    }
    Ok(segments)
}

fn coerce(raw: &str, current: &Value) -> std::result::Result<Value, String> {
    match current {
        Value::Boolean(_) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Value::Boolean(true)),
            "false" | "0" | "no" | "off" => Ok(Value::Boolean(false)),
            _ => Err(format!("cannot convert '{raw}' to boolean")),
        },
        Value::Integer(_) => raw
            .trim()
            .parse()
            .map(Value::Integer)
            .map_err(|_| format!("cannot convert '{raw}' to integer")),
        Value::Float(_) => raw
            .trim()
            .parse()
            .map(Value::Float)
            .map_err(|_| format!("cannot convert '{raw}' to float")),
        Value::Datetime(_) => raw
            .trim()
            .parse()
            .map(Value::Datetime)
            .map_err(|_| format!("cannot convert '{raw}' to datetime")),
        Value::Table(_) | Value::Array(_) => {
            Err("editing tables or arrays is not supported".to_string())
        }
        Value::String(_) => Ok(Value::String(raw.to_string())),
    }
}
