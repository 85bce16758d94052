//! Runtime configuration from the environment.
//!
//! `.env` is loaded by the binary before [`Config::from_env`] runs; CLI flags
//! override what is read here.

use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::job::DispatcherConfig;

pub const ENV_PORT: &str = "RESOLVER_PORT";
pub const ENV_JOB_TTL_DAYS: &str = "RESOLVER_JOB_TTL_DAYS";
pub const ENV_REGISTRY_PATH: &str = "RESOLVER_REGISTRY_PATH";
pub const ENV_MAX_ATTEMPTS: &str = "RESOLVER_MAX_ATTEMPTS";
pub const ENV_RETRY_BACKOFF_MS: &str = "RESOLVER_RETRY_BACKOFF_MS";
pub const ENV_WORKERS: &str = "RESOLVER_WORKERS";
pub const ENV_CLEANUP_INTERVAL_SECS: &str = "RESOLVER_CLEANUP_INTERVAL_SECS";

/// Upper bound of `RESOLVER_JOB_TTL_DAYS`.
pub const MAX_JOB_TTL_DAYS: i64 = 3650;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub job_ttl_days: i64,
    /// Registry CSV dump; an empty registry is used when unset.
    pub registry_path: Option<PathBuf>,
    pub dispatcher: DispatcherConfig,
    pub cleanup_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            job_ttl_days: 30,
            registry_path: None,
            dispatcher: DispatcherConfig::default(),
            cleanup_interval: Duration::from_secs(3600),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source, defaults filling the gaps.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let value = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Ok(Self {
            port: parse(ENV_PORT, value(ENV_PORT), defaults.port)?,
            job_ttl_days: in_range(
                ENV_JOB_TTL_DAYS,
                parse(ENV_JOB_TTL_DAYS, value(ENV_JOB_TTL_DAYS), defaults.job_ttl_days)?,
                1..=MAX_JOB_TTL_DAYS,
            )?,
            registry_path: value(ENV_REGISTRY_PATH).map(PathBuf::from),
            dispatcher: DispatcherConfig {
                workers: parse(ENV_WORKERS, value(ENV_WORKERS), defaults.dispatcher.workers)?,
                max_attempts: parse(
                    ENV_MAX_ATTEMPTS,
                    value(ENV_MAX_ATTEMPTS),
                    defaults.dispatcher.max_attempts,
                )?,
                retry_backoff: Duration::from_millis(parse(
                    ENV_RETRY_BACKOFF_MS,
                    value(ENV_RETRY_BACKOFF_MS),
                    defaults.dispatcher.retry_backoff.as_millis() as u64,
                )?),
            },
            cleanup_interval: Duration::from_secs(in_range(
                ENV_CLEANUP_INTERVAL_SECS,
                parse(
                    ENV_CLEANUP_INTERVAL_SECS,
                    value(ENV_CLEANUP_INTERVAL_SECS),
                    defaults.cleanup_interval.as_secs(),
                )?,
                1..=u64::MAX,
            )?),
        })
    }

    /// Job lifetime, with the day count held to `1..=MAX_JOB_TTL_DAYS`.
    pub fn job_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.job_ttl_days.clamp(1, MAX_JOB_TTL_DAYS))
    }
}

fn in_range<T>(name: &str, value: T, range: RangeInclusive<T>) -> Result<T, ConfigError>
where
    T: PartialOrd + ToString,
{
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
        })
    }
}

fn parse<T: FromStr>(name: &str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            value: raw,
        }),
    }
}
