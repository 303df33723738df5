//! Process configuration read from the environment.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::policy::StorePolicy;

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Postgres connection string. Without one the in-memory store is used.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub store: StorePolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            store: StorePolicy::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key/value source. Unset or blank keys take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = StorePolicy::default();

        let bind_addr = parse(
            "PRICETRACK_BIND",
            get("PRICETRACK_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
        )?;
        let db_max_connections = match get("PRICETRACK_DB_MAX_CONNECTIONS") {
            Some(v) => positive("PRICETRACK_DB_MAX_CONNECTIONS", v)?,
            None => DEFAULT_DB_MAX_CONNECTIONS,
        };
        let timeout = match get("PRICETRACK_STORE_TIMEOUT_MS") {
            Some(v) => Duration::from_millis(u64::from(positive("PRICETRACK_STORE_TIMEOUT_MS", v)?)),
            None => defaults.timeout,
        };
        let attempts = match get("PRICETRACK_RETRY_ATTEMPTS") {
            Some(v) => positive("PRICETRACK_RETRY_ATTEMPTS", v)?,
            None => defaults.attempts,
        };
        let backoff = match get("PRICETRACK_RETRY_BACKOFF_MS") {
            Some(v) => Duration::from_millis(parse::<u64>("PRICETRACK_RETRY_BACKOFF_MS", v)?),
            None => defaults.backoff,
        };

        Ok(Self {
            bind_addr,
            database_url: get("DATABASE_URL"),
            db_max_connections,
            store: StorePolicy {
                timeout,
                attempts,
                backoff,
            },
        })
    }
}

fn parse<T>(var: &'static str, raw: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: format!("'{raw}': {e}"),
    })
}

fn positive(var: &'static str, raw: String) -> Result<u32, ConfigError> {
    match parse::<u32>(var, raw)? {
        0 => Err(ConfigError::Invalid {
            var,
            reason: "must be greater than 0".to_string(),
        }),
        n => Ok(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        assert_eq!(config(&[]).unwrap(), AppConfig::default());
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = config(&[
            ("PRICETRACK_BIND", "127.0.0.1:9000"),
            ("DATABASE_URL", "postgres://localhost/prices"),
            ("PRICETRACK_STORE_TIMEOUT_MS", "250"),
            ("PRICETRACK_RETRY_ATTEMPTS", "5"),
        ])
        .unwrap();
        assert_eq!(cfg.bind_addr.port(), 9000);
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/prices"));
        assert_eq!(cfg.store.timeout, Duration::from_millis(250));
        assert_eq!(cfg.store.attempts, 5);
    }

    #[test]
    fn bad_values_name_the_variable() {
        let err = config(&[("PRICETRACK_RETRY_ATTEMPTS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "PRICETRACK_RETRY_ATTEMPTS", .. }));

        let err = config(&[("PRICETRACK_BIND", "not an address")]).unwrap_err();
        assert!(err.to_string().contains("PRICETRACK_BIND"));
    }
}
