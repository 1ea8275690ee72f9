//! Pipeline configuration

use pokelytics_common::{PokelyticsError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Pipeline Configuration Constants
// ============================================================================

/// Default PokeAPI base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://pokeapi.co/api/v2";

/// Default collection holding the primary creature records.
pub const DEFAULT_ENTITY_ENDPOINT: &str = "pokemon";

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default pause between API calls and between ids, in milliseconds.
pub const DEFAULT_API_DELAY_MS: u64 = 500;

/// Default SQLite database file.
pub const DEFAULT_DATABASE_PATH: &str = "db/pokemon_database.db";

/// Default number of ids to process, starting at 1.
pub const DEFAULT_FETCH_COUNT: u32 = 10;

/// Remote API settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    pub entity_endpoint: String,
    pub request_timeout_secs: u64,
    pub delay_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            entity_endpoint: DEFAULT_ENTITY_ENDPOINT.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            delay_ms: DEFAULT_API_DELAY_MS,
        }
    }
}

impl ApiConfig {
    /// URL of the primary record for `id`, e.g. `https://pokeapi.co/api/v2/pokemon/25/`
    pub fn entity_url(&self, id: i64) -> String {
        format!(
            "{}/{}/{}/",
            self.base_url.trim_end_matches('/'),
            self.entity_endpoint.trim_matches('/'),
            id
        )
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Everything one pipeline run needs, passed explicitly to the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineConfig {
    pub api: ApiConfig,
    pub database_path: String,
    pub fetch_count: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            database_path: DEFAULT_DATABASE_PATH.to_string(),
            fetch_count: DEFAULT_FETCH_COUNT,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from `.env`, the environment and defaults.
    ///
    /// Unset or unparsable numeric variables fall back to their defaults.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            api: ApiConfig {
                base_url: env_or("POKELYTICS_API_BASE_URL", defaults.api.base_url),
                entity_endpoint: env_or("POKELYTICS_API_ENDPOINT", defaults.api.entity_endpoint),
                request_timeout_secs: env_parse(
                    "POKELYTICS_API_TIMEOUT_SECS",
                    defaults.api.request_timeout_secs,
                ),
                delay_ms: env_parse("POKELYTICS_API_DELAY_MS", defaults.api.delay_ms),
            },
            database_path: env_or("POKELYTICS_DATABASE_PATH", defaults.database_path),
            fetch_count: env_parse("POKELYTICS_FETCH_COUNT", defaults.fetch_count),
        };

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(PokelyticsError::config("API base URL cannot be empty"));
        }
        url::Url::parse(&self.api.base_url).map_err(|e| {
            PokelyticsError::config(format!("Invalid API base URL '{}': {}", self.api.base_url, e))
        })?;

        if self.api.entity_endpoint.trim_matches('/').is_empty() {
            return Err(PokelyticsError::config("API entity endpoint cannot be empty"));
        }

        if self.api.request_timeout_secs == 0 {
            return Err(PokelyticsError::config("Request timeout must be greater than 0"));
        }

        if self.database_path.trim().is_empty() {
            return Err(PokelyticsError::config("Database path cannot be empty"));
        }

        Ok(())
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api.base_url = base_url.into();
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.api.delay_ms = delay_ms;
        self
    }

    pub fn with_request_timeout(mut self, timeout_secs: u64) -> Self {
        self.api.request_timeout_secs = timeout_secs;
        self
    }

    pub fn with_database_path(mut self, path: impl Into<String>) -> Self {
        self.database_path = path.into();
        self
    }

    pub fn with_fetch_count(mut self, count: u32) -> Self {
        self.fetch_count = count;
        self
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.api.base_url, "https://pokeapi.co/api/v2");
        assert_eq!(config.api.entity_endpoint, "pokemon");
        assert_eq!(config.api.request_timeout_secs, 10);
        assert_eq!(config.api.delay(), Duration::from_millis(500));
        assert_eq!(config.database_path, "db/pokemon_database.db");
        assert_eq!(config.fetch_count, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_entity_url() {
        let api = ApiConfig::default();
        assert_eq!(api.entity_url(25), "https://pokeapi.co/api/v2/pokemon/25/");

        let trailing = ApiConfig {
            base_url: "http://localhost:9000/".to_string(),
            entity_endpoint: "/pokemon/".to_string(),
            ..ApiConfig::default()
        };
        assert_eq!(trailing.entity_url(1), "http://localhost:9000/pokemon/1/");
    }

    #[test]
    fn test_builder_pattern() {
        let config = PipelineConfig::new()
            .with_base_url("http://127.0.0.1:8080")
            .with_delay_ms(0)
            .with_request_timeout(3)
            .with_database_path("/tmp/test.db")
            .with_fetch_count(3);

        assert_eq!(config.api.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.api.delay(), Duration::ZERO);
        assert_eq!(config.api.request_timeout(), Duration::from_secs(3));
        assert_eq!(config.database_path, "/tmp/test.db");
        assert_eq!(config.fetch_count, 3);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(PipelineConfig::new().with_base_url("").validate().is_err());
        assert!(PipelineConfig::new().with_base_url("not a url").validate().is_err());
        assert!(PipelineConfig::new().with_database_path("  ").validate().is_err());
        assert!(PipelineConfig::new().with_request_timeout(0).validate().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides_and_fallbacks() {
        std::env::set_var("POKELYTICS_FETCH_COUNT", "151");
        std::env::set_var("POKELYTICS_API_DELAY_MS", "not-a-number");
        std::env::set_var("POKELYTICS_DATABASE_PATH", "/tmp/dex.db");

        let config = PipelineConfig::from_env().unwrap();

        std::env::remove_var("POKELYTICS_FETCH_COUNT");
        std::env::remove_var("POKELYTICS_API_DELAY_MS");
        std::env::remove_var("POKELYTICS_DATABASE_PATH");

        assert_eq!(config.fetch_count, 151);
        assert_eq!(config.api.delay_ms, DEFAULT_API_DELAY_MS);
        assert_eq!(config.database_path, "/tmp/dex.db");
    }
}
