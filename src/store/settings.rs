//! Key/value settings.
//!
//! The settings window writes raw string values; [`Settings`] is the typed
//! view the rest of the agent reads. Missing or malformed values fall back
//! to defaults rather than failing.

use super::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Well-known setting keys.
pub mod keys {
    pub const CHAT_API_KEY: &str = "chat_api_key";
    pub const WEATHER_API_KEY: &str = "weather_api_key";
    pub const WEATHER_CITY: &str = "weather_city";
    pub const REMINDER_INTERVAL_MIN: &str = "reminder_interval_min";

    pub const ALL: [&str; 4] = [CHAT_API_KEY, WEATHER_API_KEY, WEATHER_CITY, REMINDER_INTERVAL_MIN];
}

pub const DEFAULT_WEATHER_CITY: &str = "Beijing";
pub const DEFAULT_REMINDER_INTERVAL_MIN: u32 = 60;

/// Interval range offered by the settings UI. The scheduler itself accepts
/// any positive value.
pub const REMINDER_INTERVAL_UI_RANGE: std::ops::RangeInclusive<u32> = 30..=120;

/// Raw key/value settings storage.
pub trait SettingsStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn entries(&self) -> Result<BTreeMap<String, String>, StoreError>;

    /// Pick up changes written by another process.
    fn reload(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

impl SettingsStore for BTreeMap<String, String> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(BTreeMap::get(self, key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn entries(&self) -> Result<BTreeMap<String, String>, StoreError> {
        Ok(self.clone())
    }
}

/// Settings persisted as a flat JSON object.
#[derive(Debug)]
pub struct JsonSettingsStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonSettingsStore {
    /// Open the settings file, starting empty if it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let values = read_values(&path)?;
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::IoError(e.to_string()))?;
        }
        let content = serde_json::to_string_pretty(&self.values)
            .map_err(|e| StoreError::SerializeError(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(|e| StoreError::IoError(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| StoreError::IoError(e.to_string()))
    }
}

fn read_values(path: &Path) -> Result<BTreeMap<String, String>, StoreError> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let content = std::fs::read_to_string(path).map_err(|e| StoreError::IoError(e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| StoreError::ParseError(e.to_string()))
}

impl SettingsStore for JsonSettingsStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value.to_string());
        self.save()
    }

    fn reload(&mut self) -> Result<(), StoreError> {
        self.values = read_values(&self.path)?;
        Ok(())
    }

    fn entries(&self) -> Result<BTreeMap<String, String>, StoreError> {
        Ok(self.values.clone())
    }
}

/// Typed settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Credential for the conversational intent source
    pub chat_api_key: Option<String>,
    /// Credential for the weather source
    pub weather_api_key: Option<String>,
    pub weather_city: String,
    /// Minutes between reminder cycles (always positive)
    pub reminder_interval_min: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chat_api_key: None,
            weather_api_key: None,
            weather_city: DEFAULT_WEATHER_CITY.to_string(),
            reminder_interval_min: DEFAULT_REMINDER_INTERVAL_MIN,
        }
    }
}

impl Settings {
    /// Read settings from a store. Unreadable or invalid values use defaults.
    pub fn load(store: &dyn SettingsStore) -> Self {
        let read = |key: &str| -> Option<String> {
            match store.get(key) {
                Ok(value) => value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()),
                Err(e) => {
                    tracing::warn!("Could not read setting {}: {}", key, e);
                    None
                }
            }
        };

        let reminder_interval_min = match read(keys::REMINDER_INTERVAL_MIN) {
            Some(raw) => parse_interval(&raw).unwrap_or_else(|| {
                tracing::warn!(
                    "Invalid reminder interval '{}', using {} minutes",
                    raw,
                    DEFAULT_REMINDER_INTERVAL_MIN
                );
                DEFAULT_REMINDER_INTERVAL_MIN
            }),
            None => DEFAULT_REMINDER_INTERVAL_MIN,
        };

        Self {
            chat_api_key: read(keys::CHAT_API_KEY),
            weather_api_key: read(keys::WEATHER_API_KEY),
            weather_city: read(keys::WEATHER_CITY)
                .unwrap_or_else(|| DEFAULT_WEATHER_CITY.to_string()),
            reminder_interval_min,
        }
    }

    /// Write every setting back to a store.
    pub fn save(&self, store: &mut dyn SettingsStore) -> Result<(), StoreError> {
        store.set(
            keys::CHAT_API_KEY,
            self.chat_api_key.as_deref().unwrap_or_default(),
        )?;
        store.set(
            keys::WEATHER_API_KEY,
            self.weather_api_key.as_deref().unwrap_or_default(),
        )?;
        store.set(keys::WEATHER_CITY, &self.weather_city)?;
        store.set(
            keys::REMINDER_INTERVAL_MIN,
            &self.reminder_interval_min.to_string(),
        )
    }
}

/// Parse a reminder interval: any positive whole number of minutes.
pub fn parse_interval(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|minutes| *minutes > 0)
}
