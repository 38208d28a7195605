//! Analytics configuration.
//!
//! Loaded once at startup from an optional JSON file, then overridden from the
//! environment. Every section has defaults, so an empty object `{}` is a valid
//! config. Invalid benchmarks are rejected here rather than at scoring time.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

use crate::analyzers::benchmark::{Benchmark, BenchmarkError};
use crate::analyzers::cache::CachePolicy;

pub const BASE_URL_ENV: &str = "FLEET_API_BASE_URL";
pub const TOKEN_ENV: &str = "FLEET_API_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid benchmark: {0}")]
    Benchmark(#[from] BenchmarkError),
    #[error("cache capacity must be at least 1")]
    CacheCapacity,
    #[error("cache ttl_secs must be between 1 and {max} (got {got})")]
    CacheTtl { got: u64, max: u64 },
    #[error("polling interval `{0}` must be at least 1 second")]
    PollInterval(&'static str),
    #[error("FLEET_API_TOKEN must be set to call the fleet backend")]
    MissingToken,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
        }
    }
}

/// Refresh cadence for the two dashboard views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub fleet_interval_secs: u64,
    pub metrics_interval_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            fleet_interval_secs: 30,
            metrics_interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub api: ApiConfig,
    pub benchmark: Benchmark,
    pub cache: CachePolicy,
    pub polling: PollingConfig,
}

impl AnalyticsConfig {
    /// Loads and validates a config file.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.into(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.into(),
            source,
        })?;
        config.validate()?;
        debug!(path, "Config loaded");
        Ok(config)
    }

    /// Loads `path` if given, otherwise starts from defaults, then applies
    /// environment overrides.
    pub fn resolve(path: Option<&str>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(p) => Self::load(p)?,
            None => Self::default(),
        };
        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Applies `FLEET_API_BASE_URL`. The lookup is injected so tests do not
    /// touch the process environment.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(BASE_URL_ENV).filter(|u| !u.trim().is_empty()) {
            self.api.base_url = url;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.benchmark.validate()?;

        if self.cache.capacity == 0 {
            return Err(ConfigError::CacheCapacity);
        }
        if let Some(ttl) = self.cache.ttl_secs {
            if ttl == 0 || ttl > CachePolicy::MAX_TTL_SECS {
                return Err(ConfigError::CacheTtl {
                    got: ttl,
                    max: CachePolicy::MAX_TTL_SECS,
                });
            }
        }
        if self.polling.fleet_interval_secs == 0 {
            return Err(ConfigError::PollInterval("fleet_interval_secs"));
        }
        if self.polling.metrics_interval_secs == 0 {
            return Err(ConfigError::PollInterval("metrics_interval_secs"));
        }

        Ok(())
    }
}

/// Reads the bearer token for backend calls.
pub fn api_token() -> Result<String, ConfigError> {
    std::env::var(TOKEN_ENV)
        .ok()
        .filter(|t| !t.trim().is_empty())
        .ok_or(ConfigError::MissingToken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    #[test]
    fn test_empty_object_is_default() {
        let config: AnalyticsConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AnalyticsConfig::default());
        assert!(config.validate().is_ok());
        assert_eq!(config.polling.fleet_interval_secs, 30);
        assert_eq!(config.cache.ttl_secs, Some(300));
    }

    #[test]
    fn test_load_from_file() {
        let path = temp_path("fleet_insights_test_config.json");
        fs::write(
            &path,
            r#"{
                "api": { "base_url": "https://fleet.example.org" },
                "benchmark": { "target_fuel_efficiency": 12.5 },
                "cache": { "ttl_secs": null, "capacity": 200 }
            }"#,
        )
        .unwrap();

        let config = AnalyticsConfig::load(&path).unwrap();
        assert_eq!(config.api.base_url, "https://fleet.example.org");
        assert_eq!(config.benchmark.target_fuel_efficiency, 12.5);
        assert_eq!(config.benchmark.target_on_time_pct, 95.0);
        assert_eq!(config.cache.ttl_secs, None);
        assert_eq!(config.cache.capacity, 200);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_rejects_bad_benchmark() {
        let path = temp_path("fleet_insights_test_bad_config.json");
        fs::write(&path, r#"{ "benchmark": { "target_satisfaction": 7 } }"#).unwrap();

        let err = AnalyticsConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Benchmark(BenchmarkError::SatisfactionOutOfScale(_))));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_missing_file() {
        let err = AnalyticsConfig::load(&temp_path("fleet_insights_missing.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = AnalyticsConfig::default();
        config.cache.capacity = 0;
        assert!(matches!(config.validate(), Err(ConfigError::CacheCapacity)));
    }

    #[test]
    fn test_cache_ttl_bounds() {
        let mut config = AnalyticsConfig::default();

        for bad in [0, CachePolicy::MAX_TTL_SECS + 1, u64::MAX] {
            config.cache.ttl_secs = Some(bad);
            assert!(
                matches!(config.validate(), Err(ConfigError::CacheTtl { got, .. }) if got == bad),
                "ttl {bad} accepted"
            );
        }

        config.cache.ttl_secs = Some(CachePolicy::MAX_TTL_SECS);
        assert!(config.validate().is_ok());
        config.cache.ttl_secs = None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_rejects_unrepresentable_ttl() {
        let path = temp_path("fleet_insights_test_ttl_config.json");
        fs::write(&path, r#"{ "cache": { "ttl_secs": 18446744073709551615 } }"#).unwrap();

        let err = AnalyticsConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::CacheTtl { got: u64::MAX, .. }));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_env_override() {
        let config = AnalyticsConfig::default().with_env_overrides(|key| {
            (key == BASE_URL_ENV).then(|| "https://override.example.org".to_string())
        });
        assert_eq!(config.api.base_url, "https://override.example.org");

        let untouched = AnalyticsConfig::default().with_env_overrides(|_| Some("  ".to_string()));
        assert_eq!(untouched.api.base_url, "http://localhost:5000");
    }
}
