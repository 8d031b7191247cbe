use std::env;
use std::str::FromStr;
use std::time::Duration;

use challenge_core::{DayClock, MAX_HISTORY_WINDOW_DAYS};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub local_store_path: String,
    pub local_store_capacity: usize,
    pub canonical_utc_offset_minutes: i32,
    pub stats_fetch_timeout_ms: u64,
    pub stats_window_days: u32,
    pub history_window_days: Option<u32>,
    pub reward_catalog_path: Option<String>,
    pub model_cache_capacity: usize,
    pub model_base_path: String,
    pub model_default_version: String,
}

fn parsed<T: FromStr>(name: &'static str, default: &str) -> Result<T, ConfigError> {
    let value = env::var(name).unwrap_or_else(|_| default.to_string());
    value
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

fn optional(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn history_window(value: Option<String>) -> Result<Option<u32>, ConfigError> {
    let Some(value) = value else {
        return Ok(None);
    };
    match value.parse::<u32>() {
        Ok(days) if days <= MAX_HISTORY_WINDOW_DAYS => Ok(Some(days)),
        _ => Err(ConfigError::Invalid {
            name: "HISTORY_WINDOW_DAYS",
            value,
        }),
    }
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        let history_window_days = history_window(optional("HISTORY_WINDOW_DAYS"))?;

        let config = Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parsed("PORT", "8080")?,
            local_store_path: env::var("LOCAL_STORE_PATH")
                .unwrap_or_else(|_| "./local_completions.json".to_string()),
            local_store_capacity: parsed("LOCAL_STORE_CAPACITY", "90")?,
            canonical_utc_offset_minutes: parsed("CANONICAL_UTC_OFFSET_MINUTES", "0")?,
            stats_fetch_timeout_ms: parsed("STATS_FETCH_TIMEOUT_MS", "3000")?,
            stats_window_days: parsed("STATS_WINDOW_DAYS", "30")?,
            history_window_days,
            reward_catalog_path: optional("REWARD_CATALOG_PATH"),
            model_cache_capacity: parsed("MODEL_CACHE_CAPACITY", "4")?,
            model_base_path: env::var("MODEL_BASE_PATH").unwrap_or_else(|_| "./models".to_string()),
            model_default_version: env::var("MODEL_DEFAULT_VERSION")
                .unwrap_or_else(|_| "v1".to_string()),
        };

        // Rejected here so the rest of startup can rely on a valid clock.
        config.day_clock()?;
        Ok(config)
    }

    pub fn day_clock(&self) -> Result<DayClock, ConfigError> {
        DayClock::with_offset_minutes(self.canonical_utc_offset_minutes).ok_or_else(|| {
            ConfigError::Invalid {
                name: "CANONICAL_UTC_OFFSET_MINUTES",
                value: self.canonical_utc_offset_minutes.to_string(),
            }
        })
    }

    pub fn stats_fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.stats_fetch_timeout_ms)
    }
}

impl Default for Config {
    /// Built-in defaults, ignoring the environment.
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            local_store_path: "./local_completions.json".to_string(),
            local_store_capacity: 90,
            canonical_utc_offset_minutes: 0,
            stats_fetch_timeout_ms: 3000,
            stats_window_days: 30,
            history_window_days: None,
            reward_catalog_path: None,
            model_cache_capacity: 4,
            model_base_path: "./models".to_string(),
            model_default_version: "v1".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_clock_is_utc() {
        let config = Config::default();
        assert_eq!(config.day_clock().unwrap(), DayClock::utc());
        assert_eq!(config.stats_fetch_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_out_of_range_offset_is_rejected() {
        let config = Config {
            canonical_utc_offset_minutes: 24 * 60,
            ..Config::default()
        };
        assert!(config.day_clock().is_err());
    }

    #[test]
    fn test_history_window_is_bounded() {
        assert_eq!(history_window(None).unwrap(), None);
        assert_eq!(history_window(Some("30".to_string())).unwrap(), Some(30));
        assert_eq!(history_window(Some("366".to_string())).unwrap(), Some(366));
        assert!(history_window(Some("367".to_string())).is_err());
        assert!(history_window(Some("4000000000".to_string())).is_err());
        assert!(history_window(Some("week".to_string())).is_err());
    }
}
