//! Pool configuration files.
//!
//! Policies and registry settings can be described in an INI file:
//!
//! ```ini
//! [registry]
//! sweep_interval = 60s
//! fetch_timeout = 30s
//! event_buffer = 64
//!
//! [pool.home_feed]
//! kind = native
//! unit_id = feed-unit-1
//! capacity = 2
//! failure_threshold = 3
//! cooldown = 30s
//! stale_age = 1h
//! ```
//!
//! Every key except `kind` is optional. A missing file yields the defaults
//! with no pools.

use std::path::Path;

use ini::Ini;
use thiserror::Error;

use crate::pool::PoolPolicy;
use crate::registry::RegistrySettings;

/// Section name prefix that declares a pool.
pub const POOL_SECTION_PREFIX: &str = "pool.";

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read or parse the config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to parse config text
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] ini::ParseError),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// Registry settings plus the pools to configure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub registry: RegistrySettings,
    pub pools: Vec<PoolPolicy>,
}

impl ConfigFile {
    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Parse configuration from INI text.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigFileError> {
        let ini = Ini::load_from_str(text)?;
        super::parser::parse_ini(&ini)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PoolKind;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&dir.path().join("absent.ini")).unwrap();

        assert!(config.pools.is_empty());
        assert_eq!(config.registry, RegistrySettings::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pools.ini");
        std::fs::write(
            &path,
            "[registry]\nsweep_interval = 30s\n\n[pool.reward]\nkind = rewarded\ncapacity = 1\n",
        )
        .unwrap();

        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config.registry.sweep_interval, Duration::from_secs(30));
        assert_eq!(config.pools.len(), 1);
        assert_eq!(config.pools[0].kind(), PoolKind::Rewarded);
        assert_eq!(config.pools[0].capacity(), 1);
    }

    #[test]
    fn test_malformed_text_is_a_parse_error() {
        let err = ConfigFile::from_ini_str("[pool.feed\nkind = native\n").unwrap_err();
        assert!(matches!(err, ConfigFileError::ParseError(_)));
    }

    #[test]
    fn test_invalid_value_message() {
        let err = ConfigFile::from_ini_str("[pool.feed]\nkind = native\ncapacity = -1\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid configuration: pool.feed.capacity = '-1' - must be an integer of at least 1"
        );
    }
}
