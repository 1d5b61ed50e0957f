//! # Engine Configuration
//!
//! [`EngineConfig`] can be built three ways: `Default`, deserialized from
//! the `engine:` section of a policy file, or read from the environment:
//!
//! - `EMBARGO_CACHE_CAPACITY` (default: 10000)
//!
//! Rule history is not configurable: every mutation records its entry.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default bound on cached courses.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable held a value that does not parse.
    #[error("invalid value for {var}: \"{value}\" ({reason})")]
    InvalidValue {
        /// Variable name.
        var: String,
        /// Rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The cache must hold at least one course.
    #[error("cache_capacity must be at least 1")]
    ZeroCapacity,
}

/// Tunables for [`EmbargoService`](crate::EmbargoService).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Maximum number of courses held in the decision cache. When a fill
    /// would exceed it, the cache is cleared first.
    pub cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for unparsable variables and
    /// [`ConfigError::ZeroCapacity`] for a zero cache bound.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup("EMBARGO_CACHE_CAPACITY") {
            config.cache_capacity =
                raw.trim()
                    .parse()
                    .map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
                        var: "EMBARGO_CACHE_CAPACITY".to_string(),
                        value: raw.clone(),
                        reason: e.to_string(),
                    })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.cache_capacity, 10_000);
    }

    #[test]
    fn env_overrides() {
        let config =
            EngineConfig::from_lookup(lookup(&[("EMBARGO_CACHE_CAPACITY", " 64 ")])).unwrap();
        assert_eq!(config.cache_capacity, 64);
    }

    #[test]
    fn malformed_capacity() {
        let err =
            EngineConfig::from_lookup(lookup(&[("EMBARGO_CACHE_CAPACITY", "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref var, .. } if var == "EMBARGO_CACHE_CAPACITY"));
    }

    #[test]
    fn zero_capacity_rejected() {
        assert_eq!(
            EngineConfig::from_lookup(lookup(&[("EMBARGO_CACHE_CAPACITY", "0")])).unwrap_err(),
            ConfigError::ZeroCapacity
        );
    }

    #[test]
    fn yaml_section_with_partial_fields() {
        let config: EngineConfig = serde_json::from_str(r#"{"cache_capacity": 5}"#).unwrap();
        assert_eq!(config.cache_capacity, 5);
        let empty: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, EngineConfig::default());
        assert!(serde_json::from_str::<EngineConfig>(r#"{"capacity": 5}"#).is_err());
    }

    #[test]
    fn history_cannot_be_switched_off() {
        assert!(serde_json::from_str::<EngineConfig>(r#"{"record_history": false}"#).is_err());
    }
}
