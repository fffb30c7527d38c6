//! Configuration for the CloudPet agent.
//!
//! Process-level tunables (timings, paths, timezone). User-facing settings
//! such as API keys and the reminder interval live in the settings store
//! instead, so the settings panel can change them while the pet runs.

use crate::core::{delay_from_std, Cooldown};
use crate::store::{parse_timezone, DailyCutoff};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default port of the local event bridge.
pub const DEFAULT_SERVER_PORT: u16 = 47615;

/// Main configuration for the pet agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path for storing todos, settings, caches and the activity log
    pub data_path: PathBuf,

    /// IANA timezone for the daily cutoff (UTC when unset or unknown)
    pub timezone: Option<String>,

    /// Local time-of-day where a new task "day" begins
    pub cutoff_hour: u32,
    pub cutoff_minute: u32,

    /// No interaction for this long makes the pet sleepy
    #[serde(with = "duration_serde")]
    pub idle_threshold: Duration,

    /// Hover menu reveal delay
    #[serde(with = "duration_ms_serde")]
    pub hover_reveal_delay: Duration,

    /// Hover menu hide delay
    #[serde(with = "duration_ms_serde")]
    pub hover_hide_delay: Duration,

    /// Delay before a hovered panel is shown
    #[serde(with = "duration_ms_serde")]
    pub panel_show_delay: Duration,

    /// Delay before a left panel is hidden
    #[serde(with = "duration_ms_serde")]
    pub panel_hide_delay: Duration,

    /// Cursor poller period
    #[serde(with = "duration_ms_serde")]
    pub cursor_poll_interval: Duration,

    /// How long a speech bubble stays up by default
    #[serde(with = "duration_ms_serde")]
    pub speech_duration: Duration,

    /// Reminder cooldown in minutes; unset means "same as the interval"
    pub reminder_cooldown_min: Option<u32>,

    /// Weather refresh period
    #[serde(with = "duration_serde")]
    pub weather_refresh: Duration,

    /// Timeout for weather and chat requests
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,

    /// OpenAI-compatible chat endpoint
    pub chat_base_url: String,
    pub chat_model: String,

    /// Port of the local event bridge
    pub server_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cloudpet-agent");

        Self {
            data_path: data_dir,
            timezone: None,
            cutoff_hour: 5,
            cutoff_minute: 0,
            idle_threshold: Duration::from_secs(30 * 60),
            hover_reveal_delay: Duration::from_millis(600),
            hover_hide_delay: Duration::from_millis(150),
            panel_show_delay: Duration::from_millis(200),
            panel_hide_delay: Duration::from_millis(500),
            cursor_poll_interval: Duration::from_millis(150),
            speech_duration: Duration::from_millis(5000),
            reminder_cooldown_min: None,
            weather_refresh: Duration::from_secs(60 * 60),
            request_timeout: Duration::from_secs(10),
            chat_base_url: "https://api.deepseek.com".to_string(),
            chat_model: "deepseek-chat".to_string(),
            server_port: DEFAULT_SERVER_PORT,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cloudpet-agent")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    pub fn todos_path(&self) -> PathBuf {
        self.data_path.join("todos.json")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_path.join("settings.json")
    }

    pub fn weather_cache_path(&self) -> PathBuf {
        self.data_path.join("weather_cache.json")
    }

    pub fn activity_path(&self) -> PathBuf {
        self.data_path.join("activity.json")
    }

    /// The daily archive boundary in the configured timezone.
    pub fn cutoff(&self) -> DailyCutoff {
        DailyCutoff::new(
            self.cutoff_hour,
            self.cutoff_minute,
            parse_timezone(self.timezone.as_deref()),
        )
    }

    pub fn cooldown(&self) -> Cooldown {
        Cooldown::from_minutes(self.reminder_cooldown_min)
    }

    /// Timer delays in the form the controller schedules them.
    pub fn timings(&self) -> Timings {
        Timings {
            idle_threshold: delay_from_std(self.idle_threshold),
            hover_reveal: delay_from_std(self.hover_reveal_delay),
            hover_hide: delay_from_std(self.hover_hide_delay),
            panel_show: delay_from_std(self.panel_show_delay),
            panel_hide: delay_from_std(self.panel_hide_delay),
            cursor_poll: delay_from_std(self.cursor_poll_interval),
            speech: delay_from_std(self.speech_duration),
            weather_refresh: delay_from_std(self.weather_refresh),
        }
    }
}

/// Controller timer delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub idle_threshold: chrono::Duration,
    pub hover_reveal: chrono::Duration,
    pub hover_hide: chrono::Duration,
    pub panel_show: chrono::Duration,
    pub panel_hide: chrono::Duration,
    pub cursor_poll: chrono::Duration,
    pub speech: chrono::Duration,
    pub weather_refresh: chrono::Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Config::default().timings()
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration in whole seconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Serde support for Duration in milliseconds.
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.idle_threshold, Duration::from_secs(1800));
        assert_eq!(config.hover_reveal_delay, Duration::from_millis(600));
        assert_eq!(config.panel_hide_delay, Duration::from_millis(500));
        assert_eq!(config.cursor_poll_interval, Duration::from_millis(150));
        assert_eq!(config.cooldown(), Cooldown::FollowInterval);
        assert_eq!(config.cutoff(), DailyCutoff::default());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"panel_show_delay": 350, "reminder_cooldown_min": 90}"#)
                .unwrap();
        assert_eq!(config.panel_show_delay, Duration::from_millis(350));
        assert_eq!(config.cooldown(), Cooldown::Fixed(90));
        assert_eq!(config.idle_threshold, Duration::from_secs(1800));
        assert_eq!(config.server_port, DEFAULT_SERVER_PORT);
    }

    #[test]
    fn test_duration_units_round_trip() {
        let config = Config::default();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["idle_threshold"], 1800);
        assert_eq!(json["hover_hide_delay"], 150);

        let back: Config = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_timings() {
        let timings = Config::default().timings();
        assert_eq!(timings.panel_show, chrono::Duration::milliseconds(200));
        assert_eq!(timings.idle_threshold, chrono::Duration::minutes(30));
    }
}
