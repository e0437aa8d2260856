//! Ledger configuration.
//!
//! Defaults, overridden by `LEDGER_*` environment variables, overridden in turn
//! by command-line flags (see `main.rs`).

use crate::core::block::MAX_DIFFICULTY;
use crate::storage::pending_pool::POOL_CAPACITY;
use ledger_derive::Error;
use std::env;
use std::path::PathBuf;

pub const ENV_DATA_DIR: &str = "LEDGER_DATA_DIR";
pub const ENV_DIFFICULTY: &str = "LEDGER_DIFFICULTY";
pub const ENV_POOL_CAPACITY: &str = "LEDGER_POOL_CAPACITY";
pub const ENV_VERIFY_ON_LOAD: &str = "LEDGER_VERIFY_ON_LOAD";

/// Default RocksDB directory.
pub const DEFAULT_DATA_DIR: &str = "./land_ledger_db";
/// Default mining difficulty in leading zero hex characters.
pub const DEFAULT_DIFFICULTY: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    InvalidValue {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("difficulty {0} is above the maximum of 6")]
    DifficultyTooHigh(u8),
    #[error("pool capacity must be at least 1")]
    ZeroPoolCapacity,
    #[error("data directory must not be empty")]
    EmptyDataDir,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// RocksDB directory.
    pub data_dir: PathBuf,
    /// Leading zero hex characters required of every block hash.
    pub difficulty: u8,
    /// Maximum number of pending transactions.
    pub pool_capacity: usize,
    /// Recompute every block's merkle root and hash when opening.
    pub verify_on_load: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            difficulty: DEFAULT_DIFFICULTY,
            pool_capacity: POOL_CAPACITY,
            verify_on_load: false,
        }
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            expected: "a boolean",
            value: value.to_string(),
        }),
    }
}

impl LedgerConfig {
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn with_difficulty(mut self, difficulty: u8) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_pool_capacity(mut self, pool_capacity: usize) -> Self {
        self.pool_capacity = pool_capacity;
        self
    }

    pub fn with_verify_on_load(mut self, verify_on_load: bool) -> Self {
        self.verify_on_load = verify_on_load;
        self
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `LEDGER_*`
    /// variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup(ENV_DATA_DIR) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(ENV_DIFFICULTY) {
            config.difficulty = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: ENV_DIFFICULTY,
                expected: "an integer between 0 and 6",
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = lookup(ENV_POOL_CAPACITY) {
            config.pool_capacity = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: ENV_POOL_CAPACITY,
                expected: "a positive integer",
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = lookup(ENV_VERIFY_ON_LOAD) {
            config.verify_on_load = parse_bool(ENV_VERIFY_ON_LOAD, &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDataDir);
        }
        if self.difficulty > MAX_DIFFICULTY {
            return Err(ConfigError::DifficultyTooHigh(self.difficulty));
        }
        if self.pool_capacity == 0 {
            return Err(ConfigError::ZeroPoolCapacity);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("./land_ledger_db"));
        assert_eq!(config.difficulty, 2);
        assert_eq!(config.pool_capacity, 100_000);
        assert!(!config.verify_on_load);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = LedgerConfig::from_lookup(lookup(&[
            ("LEDGER_DATA_DIR", "/var/lib/ledger"),
            ("LEDGER_DIFFICULTY", "4"),
            ("LEDGER_POOL_CAPACITY", "10"),
            ("LEDGER_VERIFY_ON_LOAD", "true"),
        ]))
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/ledger"));
        assert_eq!(config.difficulty, 4);
        assert_eq!(config.pool_capacity, 10);
        assert!(config.verify_on_load);
    }

    #[test]
    fn missing_variables_keep_defaults() {
        let config = LedgerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, LedgerConfig::default());
    }

    #[test]
    fn malformed_values_are_reported() {
        let err = LedgerConfig::from_lookup(lookup(&[("LEDGER_DIFFICULTY", "hard")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                name: "LEDGER_DIFFICULTY",
                ..
            }
        ));

        let err =
            LedgerConfig::from_lookup(lookup(&[("LEDGER_VERIFY_ON_LOAD", "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn validate_bounds() {
        assert_eq!(
            LedgerConfig::default().with_difficulty(7).validate(),
            Err(ConfigError::DifficultyTooHigh(7))
        );
        assert_eq!(
            LedgerConfig::default().with_pool_capacity(0).validate(),
            Err(ConfigError::ZeroPoolCapacity)
        );
        assert_eq!(
            LedgerConfig::default().with_data_dir("").validate(),
            Err(ConfigError::EmptyDataDir)
        );
        assert!(LedgerConfig::from_lookup(lookup(&[("LEDGER_DIFFICULTY", "9")])).is_err());
    }
}
