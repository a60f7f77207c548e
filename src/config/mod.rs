//! Configuration module for the roster backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Which store implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// A variable that was set but could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub variable: &'static str,
    pub value: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid value for {}: {:?}", self.variable, self.value)
    }
}

impl std::error::Error for ConfigError {}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Store implementation
    pub storage: StorageBackend,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
    /// Fixed seed for reviewer selection; entropy-seeded when absent
    pub rng_seed: Option<u64>,
    /// Deadline applied to every engine operation
    pub operation_timeout: Duration,
    /// Re-check a pull request's version before each bulk reassignment write
    pub revalidate_before_write: bool,
    /// Attempts per pull request when the bulk write hits a version conflict
    pub max_reassign_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/roster.sqlite"),
            storage: StorageBackend::Sqlite,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            rng_seed: None,
            operation_timeout: Duration::from_millis(10_000),
            revalidate_before_write: true,
            max_reassign_attempts: 3,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let db_path = env::var("ROSTER_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let storage = match env::var("ROSTER_STORAGE") {
            Ok(value) => match value.to_ascii_lowercase().as_str() {
                "sqlite" => StorageBackend::Sqlite,
                "memory" => StorageBackend::Memory,
                _ => {
                    return Err(ConfigError {
                        variable: "ROSTER_STORAGE",
                        value,
                    })
                }
            },
            Err(_) => defaults.storage,
        };

        let bind_addr = parse_var("ROSTER_BIND_ADDR")?.unwrap_or(defaults.bind_addr);

        let log_level = env::var("ROSTER_LOG_LEVEL").unwrap_or(defaults.log_level);

        let log_format = match env::var("ROSTER_LOG_FORMAT") {
            Ok(value) => match value.to_ascii_lowercase().as_str() {
                "pretty" => LogFormat::Pretty,
                "json" => LogFormat::Json,
                _ => {
                    return Err(ConfigError {
                        variable: "ROSTER_LOG_FORMAT",
                        value,
                    })
                }
            },
            Err(_) => defaults.log_format,
        };

        let rng_seed = parse_var("ROSTER_RNG_SEED")?;

        let operation_timeout = parse_var::<u64>("ROSTER_OPERATION_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.operation_timeout);

        let revalidate_before_write = parse_var("ROSTER_REVALIDATE_BEFORE_WRITE")?
            .unwrap_or(defaults.revalidate_before_write);

        let max_reassign_attempts = parse_var("ROSTER_MAX_REASSIGN_ATTEMPTS")?
            .unwrap_or(defaults.max_reassign_attempts)
            .max(1);

        Ok(Self {
            db_path,
            storage,
            bind_addr,
            log_level,
            log_format,
            rng_seed,
            operation_timeout,
            revalidate_before_write,
            max_reassign_attempts,
        })
    }
}

/// Parse an optional variable; set-but-invalid is an error.
fn parse_var<T: FromStr>(variable: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(variable) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError { variable, value }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 9] = [
        "ROSTER_DB_PATH",
        "ROSTER_STORAGE",
        "ROSTER_BIND_ADDR",
        "ROSTER_LOG_LEVEL",
        "ROSTER_LOG_FORMAT",
        "ROSTER_RNG_SEED",
        "ROSTER_OPERATION_TIMEOUT_MS",
        "ROSTER_REVALIDATE_BEFORE_WRITE",
        "ROSTER_MAX_REASSIGN_ATTEMPTS",
    ];

    // Both cases share one test so they never race on the process environment.
    #[test]
    fn test_config_from_env() {
        for var in VARS {
            env::remove_var(var);
        }

        let config = Config::from_env().unwrap();

        assert_eq!(config.db_path, PathBuf::from("./data/roster.sqlite"));
        assert_eq!(config.storage, StorageBackend::Sqlite);
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.rng_seed.is_none());
        assert_eq!(config.operation_timeout, Duration::from_secs(10));
        assert!(config.revalidate_before_write);
        assert_eq!(config.max_reassign_attempts, 3);

        env::set_var("ROSTER_STORAGE", "memory");
        env::set_var("ROSTER_RNG_SEED", "42");
        env::set_var("ROSTER_REVALIDATE_BEFORE_WRITE", "false");
        env::set_var("ROSTER_MAX_REASSIGN_ATTEMPTS", "0");

        let config = Config::from_env().unwrap();
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.rng_seed, Some(42));
        assert!(!config.revalidate_before_write);
        assert_eq!(config.max_reassign_attempts, 1);

        env::set_var("ROSTER_OPERATION_TIMEOUT_MS", "soon");
        let err = Config::from_env().unwrap_err();
        assert_eq!(err.variable, "ROSTER_OPERATION_TIMEOUT_MS");

        for var in VARS {
            env::remove_var(var);
        }
    }
}
