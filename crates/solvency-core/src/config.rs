//! Gateway configuration.
//!
//! | Variable | Fallback | Default |
//! |----------|----------|---------|
//! | `SOLVENCY_CACHE_TTL_SECONDS` | `CACHE_TTL_SECONDS` | 300 |
//! | `SOLVENCY_CACHE_MAX_ENTRIES` | `CACHE_MAX_SIZE` | 1000 |
//! | `SOLVENCY_UPSTREAM_TIMEOUT_MS` | | 5000 |
//! | `SOLVENCY_UPSTREAM_MAX_RETRIES` | | 2 |
//! | `SOLVENCY_DIRECTORY_URL` | | unset (in-memory directory) |

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{DEFAULT_CAPACITY, DEFAULT_TTL};
use crate::retry::RetryConfig;
use crate::upstream::DEFAULT_UPSTREAM_TIMEOUT;
use crate::ConfigError;

pub const ENV_CACHE_TTL: &str = "SOLVENCY_CACHE_TTL_SECONDS";
pub const ENV_CACHE_MAX_ENTRIES: &str = "SOLVENCY_CACHE_MAX_ENTRIES";
pub const ENV_UPSTREAM_TIMEOUT: &str = "SOLVENCY_UPSTREAM_TIMEOUT_MS";
pub const ENV_UPSTREAM_MAX_RETRIES: &str = "SOLVENCY_UPSTREAM_MAX_RETRIES";
pub const ENV_DIRECTORY_URL: &str = "SOLVENCY_DIRECTORY_URL";

const LEGACY_CACHE_TTL: &str = "CACHE_TTL_SECONDS";
const LEGACY_CACHE_MAX_SIZE: &str = "CACHE_MAX_SIZE";

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub cache_ttl: Duration,
    pub cache_max_entries: usize,
    pub upstream_timeout: Duration,
    pub retry: RetryConfig,
    pub directory_url: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_TTL,
            cache_max_entries: DEFAULT_CAPACITY,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
            retry: RetryConfig::default(),
            directory_url: None,
        }
    }
}

impl GatewayConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some((name, value)) = first_set(&lookup, &[ENV_CACHE_TTL, LEGACY_CACHE_TTL]) {
            config.cache_ttl = Duration::from_secs(parse_number(name, &value)?);
        }
        if let Some((name, value)) =
            first_set(&lookup, &[ENV_CACHE_MAX_ENTRIES, LEGACY_CACHE_MAX_SIZE])
        {
            config.cache_max_entries = parse_number(name, &value)?;
        }
        if let Some((name, value)) = first_set(&lookup, &[ENV_UPSTREAM_TIMEOUT]) {
            config.upstream_timeout = Duration::from_millis(parse_number(name, &value)?);
        }
        if let Some((name, value)) = first_set(&lookup, &[ENV_UPSTREAM_MAX_RETRIES]) {
            let max_retries: u32 = parse_number(name, &value)?;
            config.retry = if max_retries == 0 {
                RetryConfig::no_retry()
            } else {
                RetryConfig::exponential(max_retries)
            };
        }
        config.directory_url = first_set(&lookup, &[ENV_DIRECTORY_URL]).map(|(_, value)| value);

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_max_entries == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.cache_ttl.is_zero() {
            return Err(ConfigError::ZeroTtl);
        }
        if self.upstream_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

fn first_set<F>(lookup: &F, names: &[&'static str]) -> Option<(&'static str, String)>
where
    F: Fn(&str) -> Option<String>,
{
    names.iter().find_map(|name| {
        lookup(name)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .map(|value| (*name, value))
    })
}

fn parse_number<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|err: T::Err| ConfigError::InvalidEnv {
        name,
        value: value.to_owned(),
        reason: err.to_string(),
    })
}
