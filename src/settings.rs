//! File-backed per-user settings store.
//!
//! Settings live in a flat key/value file owned by the user (YAML mapping by
//! default, JSON object or TOML table by extension). The file is re-read on
//! every lookup, so toggling `sleep_mode_enabled` takes effect on the next
//! `start()` without restarting the daemon.

use nix::unistd::{geteuid, User};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::platform::SettingsStore;

/// File name under the per-user configuration directory.
pub const SETTINGS_FILE_NAME: &str = "settings.yaml";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("unable to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Settings file location for the active user.
///
/// `$XDG_CONFIG_HOME/bgtrim/settings.yaml` when set, otherwise
/// `<home of the effective uid>/.config/bgtrim/settings.yaml`.
pub fn default_settings_path() -> Option<PathBuf> {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(xdg).join("bgtrim").join(SETTINGS_FILE_NAME));
    }
    let home = match User::from_uid(geteuid()) {
        Ok(Some(user)) => user.dir,
        Ok(None) => std::env::var_os("HOME").map(PathBuf::from)?,
        Err(e) => {
            debug!("User lookup failed: {}", e);
            std::env::var_os("HOME").map(PathBuf::from)?
        }
    };
    Some(home.join(".config").join("bgtrim").join(SETTINGS_FILE_NAME))
}

/// Interprets a settings value as a boolean.
///
/// Accepts booleans, integers (only `1` is true) and the strings
/// `true/false`, `1/0`, `on/off`, `yes/no` in any case.
pub fn value_as_bool(value: &serde_json::Value) -> Option<bool> {
    match value {
        serde_json::Value::Bool(b) => Some(*b),
        serde_json::Value::Number(n) => n.as_i64().map(|i| i == 1),
        serde_json::Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "on" | "yes" => Some(true),
            "false" | "0" | "off" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Reads the whole settings file into a map.
pub fn load_settings(path: &Path) -> Result<BTreeMap<String, serde_json::Value>, SettingsError> {
    let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_err = |message: String| SettingsError::Parse {
        path: path.to_path_buf(),
        message,
    };

    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content).map_err(|e| parse_err(e.to_string())),
        Some("toml") => {
            let table: toml::Value =
                toml::from_str(&content).map_err(|e| parse_err(e.to_string()))?;
            serde_json::to_value(table)
                .and_then(serde_json::from_value)
                .map_err(|e| parse_err(e.to_string()))
        }
        _ => serde_yaml::from_str(&content).map_err(|e| parse_err(e.to_string())),
    }
}

/// [`SettingsStore`] backed by a settings file.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: Option<PathBuf>,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Store at the active user's default location.
    pub fn for_current_user() -> Self {
        Self {
            path: default_settings_path(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Raw lookup, distinguishing a missing file from a missing key.
    pub fn lookup(&self, key: &str) -> Result<Option<serde_json::Value>, SettingsError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Ok(load_settings(path)?.remove(key))
    }
}

impl SettingsStore for FileSettingsStore {
    fn get_bool(&self, key: &str) -> bool {
        match self.lookup(key) {
            Ok(Some(value)) => value_as_bool(&value).unwrap_or_else(|| {
                warn!("Setting '{}' has non-boolean value {}, using false", key, value);
                false
            }),
            Ok(None) => false,
            Err(e) => {
                warn!("{}, using false for '{}'", e, key);
                false
            }
        }
    }
}
