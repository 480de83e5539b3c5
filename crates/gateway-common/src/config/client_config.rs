//! Client configuration
//!
//! Loads configuration from environment variables (and a `.env` file when
//! present). Unset optional variables fall back to defaults; set but
//! unparsable ones are errors.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Main client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub env: Environment,
    pub gateway: GatewayConfig,
    pub shard: ShardConfig,
    pub rate_limit: RateLimitConfig,
    pub reconnect: ReconnectSettings,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Where and how to connect
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// `ws://` or `wss://` endpoint
    pub url: String,
    pub token: String,
    /// Intent bitmask sent with IDENTIFY
    pub intents: u64,
    /// Upper bound on the wait for HELLO after the socket opens
    pub connect_timeout: Duration,
}

/// Which shard this process runs
#[derive(Debug, Clone, Copy)]
pub struct ShardConfig {
    pub index: u32,
    pub count: u32,
}

/// Outbound token bucket
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub capacity: u32,
    pub period: Duration,
}

/// Reconnect backoff parameters
#[derive(Debug, Clone, Copy)]
pub struct ReconnectSettings {
    pub min_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter_factor: f64,
    pub max_retries: u32,
}

// Default value functions
fn default_intents() -> u64 {
    513 // GUILDS | GUILD_MESSAGES
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_shard_count() -> u32 {
    1
}

fn default_rate_limit_capacity() -> u32 {
    120
}

fn default_rate_limit_period_ms() -> u64 {
    60_000
}

fn default_min_backoff_ms() -> u64 {
    2_000
}

fn default_max_backoff_ms() -> u64 {
    120_000
}

fn default_jitter_factor() -> f64 {
    0.5
}

fn default_max_retries() -> u32 {
    u32::MAX
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a required variable is missing or any value is invalid
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let url = vars.required("GATEWAY_URL")?;
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ConfigError::InvalidValue("GATEWAY_URL", url));
        }

        let config = Self {
            env: vars
                .get("APP_ENV")
                .and_then(|s| Environment::parse(&s))
                .unwrap_or_default(),
            gateway: GatewayConfig {
                url,
                token: vars.required("GATEWAY_TOKEN")?,
                intents: vars.parse_or("GATEWAY_INTENTS", default_intents)?,
                connect_timeout: Duration::from_millis(
                    vars.parse_or("CONNECT_TIMEOUT_MS", default_connect_timeout_ms)?,
                ),
            },
            shard: ShardConfig {
                index: vars.parse_or("SHARD_INDEX", || 0)?,
                count: vars.parse_or("SHARD_COUNT", default_shard_count)?,
            },
            rate_limit: RateLimitConfig {
                capacity: vars.parse_or("RATE_LIMIT_CAPACITY", default_rate_limit_capacity)?,
                period: Duration::from_millis(
                    vars.parse_or("RATE_LIMIT_PERIOD_MS", default_rate_limit_period_ms)?,
                ),
            },
            reconnect: ReconnectSettings {
                min_backoff: Duration::from_millis(
                    vars.parse_or("RECONNECT_MIN_BACKOFF_MS", default_min_backoff_ms)?,
                ),
                max_backoff: Duration::from_millis(
                    vars.parse_or("RECONNECT_MAX_BACKOFF_MS", default_max_backoff_ms)?,
                ),
                jitter_factor: vars.parse_or("RECONNECT_JITTER_FACTOR", default_jitter_factor)?,
                max_retries: vars.parse_or("RECONNECT_MAX_RETRIES", default_max_retries)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.shard.count == 0 {
            return Err(ConfigError::InvalidValue("SHARD_COUNT", "0".to_string()));
        }
        if self.shard.index >= self.shard.count {
            return Err(ConfigError::InvalidValue(
                "SHARD_INDEX",
                format!("{} is not below SHARD_COUNT {}", self.shard.index, self.shard.count),
            ));
        }
        if self.rate_limit.capacity == 0 {
            return Err(ConfigError::InvalidValue("RATE_LIMIT_CAPACITY", "0".to_string()));
        }
        if !(0.0..=1.0).contains(&self.reconnect.jitter_factor) {
            return Err(ConfigError::InvalidValue(
                "RECONNECT_JITTER_FACTOR",
                self.reconnect.jitter_factor.to_string(),
            ));
        }
        if self.reconnect.min_backoff > self.reconnect.max_backoff {
            return Err(ConfigError::InvalidValue(
                "RECONNECT_MIN_BACKOFF_MS",
                "greater than RECONNECT_MAX_BACKOFF_MS".to_string(),
            ));
        }
        Ok(())
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.get(name).ok_or(ConfigError::MissingVar(name))
    }

    fn parse_or<T, D>(&self, name: &'static str, default: D) -> Result<T, ConfigError>
    where
        T: FromStr,
        D: FnOnce() -> T,
    {
        match self.get(name) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(name, raw)),
            None => Ok(default()),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<ClientConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ClientConfig::from_lookup(|name| vars.get(name).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("GATEWAY_URL", "wss://gateway.example.com/?v=10"),
        ("GATEWAY_TOKEN", "secret"),
    ];

    #[test]
    fn test_defaults_applied() {
        let config = load(&REQUIRED).unwrap();

        assert_eq!(config.env, Environment::Development);
        assert_eq!(config.gateway.intents, 513);
        assert_eq!(config.shard.index, 0);
        assert_eq!(config.shard.count, 1);
        assert_eq!(config.rate_limit.capacity, 120);
        assert_eq!(config.rate_limit.period, Duration::from_secs(60));
        assert_eq!(config.reconnect.min_backoff, Duration::from_secs(2));
        assert_eq!(config.reconnect.max_backoff, Duration::from_secs(120));
        assert!((config.reconnect.jitter_factor - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.reconnect.max_retries, u32::MAX);
    }

    #[test]
    fn test_missing_token() {
        let err = load(&[("GATEWAY_URL", "ws://localhost:9000")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("GATEWAY_TOKEN")));
    }

    #[test]
    fn test_rejects_http_url() {
        let err = load(&[("GATEWAY_URL", "https://x"), ("GATEWAY_TOKEN", "t")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue("GATEWAY_URL", _)));
    }

    #[test]
    fn test_unparsable_value_is_an_error() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("RATE_LIMIT_CAPACITY", "lots"));

        let err = load(&pairs).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue("RATE_LIMIT_CAPACITY", _)));
    }

    #[test]
    fn test_shard_index_must_fit() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([("SHARD_INDEX", "4"), ("SHARD_COUNT", "4")]);

        let err = load(&pairs).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue("SHARD_INDEX", _)));
    }

    #[test]
    fn test_jitter_out_of_range() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("RECONNECT_JITTER_FACTOR", "1.5"));

        assert!(load(&pairs).is_err());
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("PRODUCTION"), Some(Environment::Production));
        assert_eq!(Environment::parse("qa"), None);
        assert!(Environment::Production.is_production());
        assert!(Environment::Development.is_development());
    }
}
