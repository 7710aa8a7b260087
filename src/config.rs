//! Engine configuration.
//!
//! Tunables for locally built route tables and the rebuild debounce.
//! All fields have working defaults, so an empty config section is
//! valid.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::table::{DEFAULT_INFINITY, DEFAULT_TABLE_SIZE};

/// Default quiet period after a library change before rebuilding (ms).
const DEFAULT_REBUILD_DELAY_MS: u64 = 3_000;

/// Default cap on how long continuous changes may push a rebuild back (ms).
const DEFAULT_MAX_REBUILD_DELAY_MS: u64 = 30_000;

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Table size must be a nonzero power of two no larger than `u32::MAX`.
    #[error("table size {0} is not a power of two within u32 range")]
    TableSize(usize),

    /// Infinity of zero would leave no room for present entries.
    #[error("infinity must be at least 1")]
    Infinity,

    /// The debounce delay cannot exceed its own cap.
    #[error("rebuild delay {delay_ms}ms exceeds maximum {max_ms}ms")]
    RebuildDelay { delay_ms: u64, max_ms: u64 },
}

/// Route table engine configuration (`routing.*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Slots in locally built tables (`routing.table_size`).
    /// Must be a power of two.
    #[serde(default = "default_table_size")]
    pub table_size: usize,

    /// Hop-count ceiling used in patch deltas (`routing.infinity`).
    #[serde(default = "default_infinity")]
    pub infinity: u8,

    /// Quiet period after a library change before the table is rebuilt,
    /// in milliseconds (`routing.rebuild_delay_ms`).
    #[serde(default = "default_rebuild_delay_ms")]
    pub rebuild_delay_ms: u64,

    /// Longest a rebuild may be deferred while changes keep arriving,
    /// in milliseconds (`routing.max_rebuild_delay_ms`).
    #[serde(default = "default_max_rebuild_delay_ms")]
    pub max_rebuild_delay_ms: u64,
}

fn default_table_size() -> usize {
    DEFAULT_TABLE_SIZE
}

fn default_infinity() -> u8 {
    DEFAULT_INFINITY
}

fn default_rebuild_delay_ms() -> u64 {
    DEFAULT_REBUILD_DELAY_MS
}

fn default_max_rebuild_delay_ms() -> u64 {
    DEFAULT_MAX_REBUILD_DELAY_MS
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            table_size: default_table_size(),
            infinity: default_infinity(),
            rebuild_delay_ms: default_rebuild_delay_ms(),
            max_rebuild_delay_ms: default_max_rebuild_delay_ms(),
        }
    }
}

impl RoutingConfig {
    /// Check the configuration for values the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.table_size.is_power_of_two() || self.table_size > u32::MAX as usize {
            return Err(ConfigError::TableSize(self.table_size));
        }
        if self.infinity == 0 {
            return Err(ConfigError::Infinity);
        }
        if self.rebuild_delay_ms > self.max_rebuild_delay_ms {
            return Err(ConfigError::RebuildDelay {
                delay_ms: self.rebuild_delay_ms,
                max_ms: self.max_rebuild_delay_ms,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = RoutingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.table_size, DEFAULT_TABLE_SIZE);
        assert_eq!(config.infinity, DEFAULT_INFINITY);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: RoutingConfig =
            serde_json::from_str(r#"{"table_size": 8192}"#).unwrap();
        assert_eq!(config.table_size, 8192);
        assert_eq!(config.infinity, DEFAULT_INFINITY);
        assert_eq!(config.rebuild_delay_ms, DEFAULT_REBUILD_DELAY_MS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_config_is_default() {
        let config: RoutingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.table_size, RoutingConfig::default().table_size);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let parsed: Result<RoutingConfig, _> =
            serde_json::from_str(r#"{"table_bits": 16}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = RoutingConfig { table_size: 1000, ..RoutingConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::TableSize(1000))));

        let config = RoutingConfig { table_size: 0, ..RoutingConfig::default() };
        assert!(config.validate().is_err());

        let config = RoutingConfig { infinity: 0, ..RoutingConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Infinity)));

        let config = RoutingConfig {
            rebuild_delay_ms: 60_000,
            max_rebuild_delay_ms: 30_000,
            ..RoutingConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RebuildDelay { delay_ms: 60_000, max_ms: 30_000 })
        ));
    }

    #[test]
    fn test_round_trips_through_json() {
        let config = RoutingConfig {
            table_size: 16_384,
            infinity: 2,
            rebuild_delay_ms: 500,
            max_rebuild_delay_ms: 5_000,
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: RoutingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.table_size, 16_384);
        assert_eq!(back.infinity, 2);
        assert_eq!(back.rebuild_delay_ms, 500);
    }
}
