// Service configuration
//
// Read from the environment (after `.env` is loaded by `dotenv`). Unset
// variables fall back to defaults; set but unparsable values are errors.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_DATA_DIR: &str = "shared-data";
pub const DEFAULT_PERSIST_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 1800;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Root of the JSON logs; orders go to `<data_dir>/orders`
    pub data_dir: PathBuf,
    pub persist_timeout: Duration,
    /// Sessions untouched for this long are dropped by the sweeper
    pub session_idle_timeout: Duration,
}

impl Config {
    /// Loads configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Loads configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = read(&lookup, "CAPTURE_BIND_ADDR", DEFAULT_BIND_ADDR)?;
        let data_dir = read(&lookup, "CAPTURE_DATA_DIR", DEFAULT_DATA_DIR)?;
        let timeout_ms: u64 = read(
            &lookup,
            "CAPTURE_PERSIST_TIMEOUT_MS",
            &DEFAULT_PERSIST_TIMEOUT_MS.to_string(),
        )?;
        let idle_secs: u64 = read(
            &lookup,
            "CAPTURE_SESSION_IDLE_SECS",
            &DEFAULT_SESSION_IDLE_SECS.to_string(),
        )?;

        Ok(Self {
            bind_addr,
            data_dir,
            persist_timeout: Duration::from_millis(timeout_ms),
            session_idle_timeout: Duration::from_secs(idle_secs),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            persist_timeout: Duration::from_millis(DEFAULT_PERSIST_TIMEOUT_MS),
            session_idle_timeout: Duration::from_secs(DEFAULT_SESSION_IDLE_SECS),
        }
    }
}

fn read<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: &str,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let value = lookup(var).unwrap_or_else(|| {
        tracing::warn!("{} not set, using default {}", var, default);
        default.to_string()
    });

    let parsed = value.trim().parse::<T>();
    parsed.map_err(|e| ConfigError::Invalid {
        var,
        reason: e.to_string(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn reads_values() {
        let config = Config::from_lookup(lookup(&[
            ("CAPTURE_BIND_ADDR", "127.0.0.1:8080"),
            ("CAPTURE_DATA_DIR", "/tmp/capture"),
            ("CAPTURE_PERSIST_TIMEOUT_MS", "250"),
            ("CAPTURE_SESSION_IDLE_SECS", "60"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.data_dir, PathBuf::from("/tmp/capture"));
        assert_eq!(config.persist_timeout, Duration::from_millis(250));
        assert_eq!(config.session_idle_timeout, Duration::from_secs(60));
    }

    #[test]
    fn rejects_unparsable_values() {
        let err = Config::from_lookup(lookup(&[("CAPTURE_PERSIST_TIMEOUT_MS", "soon")])).unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { var: "CAPTURE_PERSIST_TIMEOUT_MS", .. }));
    }
}
