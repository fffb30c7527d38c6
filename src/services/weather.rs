//! Weather lookup with a one-hour cache.
//!
//! The pet only cares about three coarse conditions. OpenWeather condition
//! codes are folded into them by [`condition_from_code`]. The last result
//! is cached on disk so a restart inside the hour does not hit the network.

use crate::core::WeatherCondition;
use crate::store::Settings;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How long a cached condition stays fresh.
pub fn cache_ttl() -> Duration {
    Duration::hours(1)
}

/// Code assumed when a response carries none ("few clouds").
pub const DEFAULT_CONDITION_CODE: u32 = 801;

/// Map an OpenWeather condition code to a pet weather condition.
///
/// 800 is clear sky; 2xx thunderstorm, 3xx drizzle and 5xx rain are all
/// rainy; everything else (snow, atmosphere, clouds) is cloudy.
pub fn condition_from_code(code: u32) -> WeatherCondition {
    match code {
        800 => WeatherCondition::Sunny,
        200..=399 | 500..=599 => WeatherCondition::Rainy,
        _ => WeatherCondition::Cloudy,
    }
}

/// One observation from a weather source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub code: u32,
    pub description: String,
}

/// Weather errors.
#[derive(Debug)]
pub enum WeatherError {
    /// No source is available (e.g. built without networking)
    Unavailable(String),
    /// Network/HTTP error
    Network(String),
    /// Server returned an error response
    Server { status: u16, message: String },
    /// Response body could not be decoded
    Parse(String),
}

impl std::fmt::Display for WeatherError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WeatherError::Unavailable(msg) => write!(f, "Weather unavailable: {msg}"),
            WeatherError::Network(msg) => write!(f, "Weather network error: {msg}"),
            WeatherError::Server { status, message } => {
                write!(f, "Weather server error ({status}): {message}")
            }
            WeatherError::Parse(msg) => write!(f, "Weather parse error: {msg}"),
        }
    }
}

impl std::error::Error for WeatherError {}

/// Something that can report the current weather for a city.
pub trait WeatherSource {
    fn fetch(&self, api_key: &str, city: &str) -> Result<Observation, WeatherError>;
}

/// Source used when the crate is built without networking.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableWeather;

impl WeatherSource for UnavailableWeather {
    fn fetch(&self, _api_key: &str, _city: &str) -> Result<Observation, WeatherError> {
        Err(WeatherError::Unavailable(
            "built without the network feature".to_string(),
        ))
    }
}

/// Cached weather result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedWeather {
    pub condition: WeatherCondition,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
}

impl CachedWeather {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now - self.updated_at < cache_ttl()
    }
}

/// Last weather result, optionally mirrored to a JSON file.
#[derive(Debug, Default)]
pub struct WeatherCache {
    path: Option<PathBuf>,
    entry: Option<CachedWeather>,
}

impl WeatherCache {
    /// Cache that lives only in memory.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load a file-backed cache. A missing or unreadable file starts empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entry = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Ignoring corrupt weather cache {:?}: {}", path, e);
                    None
                }
            },
            Err(_) => None,
        };
        Self {
            path: Some(path),
            entry,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self) -> Option<&CachedWeather> {
        self.entry.as_ref()
    }

    /// Store a result. Writing the file is best-effort.
    pub fn put(&mut self, entry: CachedWeather) {
        if let Some(path) = &self.path {
            if let Err(e) = write_cache(path, &entry) {
                tracing::warn!("Failed to write weather cache {:?}: {}", path, e);
            }
        }
        self.entry = Some(entry);
    }
}

fn write_cache(path: &Path, entry: &CachedWeather) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(entry)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, contents)
}

/// Weather lookups with caching and fallbacks. Never fails.
pub struct WeatherService {
    source: Box<dyn WeatherSource + Send>,
    cache: WeatherCache,
}

impl WeatherService {
    pub fn new(source: Box<dyn WeatherSource + Send>, cache: WeatherCache) -> Self {
        Self { source, cache }
    }

    pub fn cache(&self) -> &WeatherCache {
        &self.cache
    }

    /// Current condition.
    ///
    /// Fresh cache wins. Without an API key the answer is cloudy. On a
    /// failed fetch the stale cache is used, else cloudy.
    pub fn current(&mut self, settings: &Settings, now: DateTime<Utc>) -> WeatherCondition {
        if let Some(cached) = self.cache.get() {
            if cached.is_fresh(now) {
                return cached.condition;
            }
        }

        let Some(api_key) = settings.weather_api_key.as_deref() else {
            return WeatherCondition::Cloudy;
        };

        match self.source.fetch(api_key, &settings.weather_city) {
            Ok(observation) => {
                let condition = condition_from_code(observation.code);
                tracing::info!(
                    "Weather in {}: {} (code {})",
                    settings.weather_city,
                    condition,
                    observation.code
                );
                self.cache.put(CachedWeather {
                    condition,
                    updated_at: now,
                    description: observation.description,
                });
                condition
            }
            Err(e) => {
                tracing::warn!("Weather fetch failed: {}", e);
                self.cache
                    .get()
                    .map(|c| c.condition)
                    .unwrap_or(WeatherCondition::Cloudy)
            }
        }
    }
}

#[cfg(feature = "network")]
pub use client::{BlockingOpenWeatherClient, OpenWeatherClient};

#[cfg(feature = "network")]
mod client {
    use super::{Observation, WeatherError, WeatherSource, DEFAULT_CONDITION_CODE};
    use serde::Deserialize;

    const BASE_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

    #[derive(Debug, Deserialize)]
    struct CurrentWeather {
        #[serde(default)]
        weather: Vec<WeatherEntry>,
    }

    #[derive(Debug, Deserialize)]
    struct WeatherEntry {
        id: u32,
        #[serde(default)]
        description: String,
    }

    /// OpenWeather current-weather client.
    pub struct OpenWeatherClient {
        client: reqwest::Client,
        base_url: String,
    }

    impl OpenWeatherClient {
        pub fn new(timeout: std::time::Duration) -> Result<Self, WeatherError> {
            Self::with_base_url(BASE_URL, timeout)
        }

        /// Client against another endpoint (tests, proxies).
        pub fn with_base_url(
            base_url: impl Into<String>,
            timeout: std::time::Duration,
        ) -> Result<Self, WeatherError> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| WeatherError::Network(e.to_string()))?;
            Ok(Self {
                client,
                base_url: base_url.into(),
            })
        }

        /// Fetch the current weather for a city.
        pub async fn fetch(&self, api_key: &str, city: &str) -> Result<Observation, WeatherError> {
            let response = self
                .client
                .get(&self.base_url)
                .query(&[("q", city), ("appid", api_key), ("units", "metric")])
                .send()
                .await
                .map_err(|e| WeatherError::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(WeatherError::Server {
                    status: status.as_u16(),
                    message,
                });
            }

            let body: CurrentWeather = response
                .json()
                .await
                .map_err(|e| WeatherError::Parse(e.to_string()))?;

            Ok(match body.weather.into_iter().next() {
                Some(entry) => Observation {
                    code: entry.id,
                    description: entry.description,
                },
                None => Observation {
                    code: DEFAULT_CONDITION_CODE,
                    description: String::new(),
                },
            })
        }
    }

    /// Blocking OpenWeather client for the synchronous controller loop.
    pub struct BlockingOpenWeatherClient {
        inner: OpenWeatherClient,
        runtime: tokio::runtime::Runtime,
    }

    impl BlockingOpenWeatherClient {
        pub fn new(timeout: std::time::Duration) -> Result<Self, WeatherError> {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| WeatherError::Unavailable(format!("Failed to create runtime: {e}")))?;

            Ok(Self {
                inner: OpenWeatherClient::new(timeout)?,
                runtime,
            })
        }
    }

    impl WeatherSource for BlockingOpenWeatherClient {
        fn fetch(&self, api_key: &str, city: &str) -> Result<Observation, WeatherError> {
            self.runtime.block_on(self.inner.fetch(api_key, city))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    struct FixedSource {
        result: Result<u32, ()>,
        calls: Arc<AtomicUsize>,
    }

    impl WeatherSource for FixedSource {
        fn fetch(&self, _api_key: &str, _city: &str) -> Result<Observation, WeatherError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.result {
                Ok(code) => Ok(Observation {
                    code,
                    description: "test".to_string(),
                }),
                Err(()) => Err(WeatherError::Network("offline".to_string())),
            }
        }
    }

    fn service(result: Result<u32, ()>) -> (WeatherService, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = FixedSource {
            result,
            calls: calls.clone(),
        };
        (
            WeatherService::new(Box::new(source), WeatherCache::in_memory()),
            calls,
        )
    }

    fn keyed_settings() -> Settings {
        Settings {
            weather_api_key: Some("key".to_string()),
            ..Settings::default()
        }
    }

    #[test]
    fn test_condition_from_code() {
        assert_eq!(condition_from_code(800), WeatherCondition::Sunny);
        assert_eq!(condition_from_code(200), WeatherCondition::Rainy);
        assert_eq!(condition_from_code(311), WeatherCondition::Rainy);
        assert_eq!(condition_from_code(399), WeatherCondition::Rainy);
        assert_eq!(condition_from_code(500), WeatherCondition::Rainy);
        assert_eq!(condition_from_code(599), WeatherCondition::Rainy);
        assert_eq!(condition_from_code(600), WeatherCondition::Cloudy);
        assert_eq!(condition_from_code(741), WeatherCondition::Cloudy);
        assert_eq!(condition_from_code(DEFAULT_CONDITION_CODE), WeatherCondition::Cloudy);
    }

    #[test]
    fn test_no_api_key_is_cloudy_without_fetching() {
        let (mut service, calls) = service(Ok(800));
        assert_eq!(
            service.current(&Settings::default(), t0()),
            WeatherCondition::Cloudy
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cache_is_used_within_an_hour() {
        let (mut service, calls) = service(Ok(800));
        let settings = keyed_settings();

        assert_eq!(service.current(&settings, t0()), WeatherCondition::Sunny);
        assert_eq!(
            service.current(&settings, t0() + Duration::minutes(59)),
            WeatherCondition::Sunny
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        service.current(&settings, t0() + Duration::minutes(60));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failure_falls_back_to_stale_cache() {
        let (mut service, _) = service(Err(()));
        service.cache.put(CachedWeather {
            condition: WeatherCondition::Rainy,
            updated_at: t0() - Duration::hours(3),
            description: String::new(),
        });
        assert_eq!(
            service.current(&keyed_settings(), t0()),
            WeatherCondition::Rainy
        );

        let (mut empty, _) = self::service(Err(()));
        assert_eq!(
            empty.current(&keyed_settings(), t0()),
            WeatherCondition::Cloudy
        );
    }

    #[test]
    fn test_file_cache_round_trip() {
        let path = std::env::temp_dir().join(format!("cloudpet-weather-{}.json", uuid::Uuid::new_v4()));
        let mut cache = WeatherCache::load(&path);
        assert!(cache.get().is_none());

        let entry = CachedWeather {
            condition: WeatherCondition::Sunny,
            updated_at: t0(),
            description: "clear sky".to_string(),
        };
        cache.put(entry.clone());

        let reloaded = WeatherCache::load(&path);
        assert_eq!(reloaded.get(), Some(&entry));
        let _ = std::fs::remove_file(&path);
    }
}
