//! Application configuration loaded from environment variables.

use std::time::Duration;

use consistency::EngineConfig;
use consistency::config::{DEFAULT_CURRENCY, DEFAULT_MAX_ATTEMPTS, DEFAULT_STORE_TIMEOUT};

/// Log output format for the `fmt` layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` - bind address (default: `"0.0.0.0"`)
/// - `PORT` - listen port (default: `3000`)
/// - `RUST_LOG` - tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` - `text` or `json` (default: `text`)
/// - `DATABASE_URL` - PostgreSQL connection string; unset selects the in-memory store
/// - `STORE_TIMEOUT_SECS` - per store call deadline (default: `30`)
/// - `RATING_MAX_ATTEMPTS` - compare-and-set attempts per recomputation (default: `5`)
/// - `PAYMENT_CURRENCY` - currency code sent with charges (default: `"inr"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub store_timeout_secs: u64,
    pub rating_max_attempts: u32,
    pub payment_currency: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .map(|f| LogFormat::parse(&f))
                .unwrap_or_default(),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            store_timeout_secs: lookup("STORE_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.store_timeout_secs),
            rating_max_attempts: lookup("RATING_MAX_ATTEMPTS")
                .and_then(|n| n.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.rating_max_attempts),
            payment_currency: lookup("PAYMENT_CURRENCY")
                .filter(|c| !c.trim().is_empty())
                .unwrap_or(defaults.payment_currency),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Engine settings derived from this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_store_timeout(Duration::from_secs(self.store_timeout_secs))
            .with_max_attempts(self.rating_max_attempts)
            .with_currency(self.payment_currency.clone())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            store_timeout_secs: DEFAULT_STORE_TIMEOUT.as_secs(),
            rating_max_attempts: DEFAULT_MAX_ATTEMPTS,
            payment_currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}
