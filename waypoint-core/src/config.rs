//! Configuration types

use crate::{ConfigError, WaypointError, WaypointResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Blocking-query limits applied by servers answering config entry reads.
///
/// A blocking read that asks for no particular wait gets `default_query_wait`;
/// any requested wait is capped at `max_query_wait`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    pub default_query_wait: Duration,
    pub max_query_wait: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_query_wait: Duration::from_secs(300),
            max_query_wait: Duration::from_secs(600),
        }
    }
}

impl QueryConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `WAYPOINT_DEFAULT_QUERY_WAIT_SECS`: Wait used when a blocking read asks for none (default: 300)
    /// - `WAYPOINT_MAX_QUERY_WAIT_SECS`: Upper bound on any blocking wait (default: 600)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            default_query_wait: std::env::var("WAYPOINT_DEFAULT_QUERY_WAIT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.default_query_wait),
            max_query_wait: std::env::var("WAYPOINT_MAX_QUERY_WAIT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.max_query_wait),
        }
    }

    pub fn with_default_query_wait(mut self, wait: Duration) -> Self {
        self.default_query_wait = wait;
        self
    }

    pub fn with_max_query_wait(mut self, wait: Duration) -> Self {
        self.max_query_wait = wait;
        self
    }

    /// The wait a blocking read actually gets for a requested wait.
    pub fn effective_wait(&self, requested: Duration) -> Duration {
        if requested.is_zero() {
            self.default_query_wait.min(self.max_query_wait)
        } else {
            requested.min(self.max_query_wait)
        }
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - both waits are positive
    /// - default_query_wait <= max_query_wait
    pub fn validate(&self) -> WaypointResult<()> {
        if self.default_query_wait.is_zero() {
            return Err(WaypointError::Config(ConfigError::InvalidValue {
                field: "default_query_wait".to_string(),
                value: format!("{:?}", self.default_query_wait),
                reason: "default_query_wait must be positive".to_string(),
            }));
        }

        if self.max_query_wait.is_zero() {
            return Err(WaypointError::Config(ConfigError::InvalidValue {
                field: "max_query_wait".to_string(),
                value: format!("{:?}", self.max_query_wait),
                reason: "max_query_wait must be positive".to_string(),
            }));
        }

        if self.default_query_wait > self.max_query_wait {
            return Err(WaypointError::Config(ConfigError::InvalidValue {
                field: "default_query_wait".to_string(),
                value: format!("{:?}", self.default_query_wait),
                reason: "default_query_wait must not exceed max_query_wait".to_string(),
            }));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(QueryConfig::default().validate().is_ok());
    }

    #[test]
    fn test_effective_wait() {
        let config = QueryConfig::default()
            .with_default_query_wait(Duration::from_secs(10))
            .with_max_query_wait(Duration::from_secs(60));

        assert_eq!(config.effective_wait(Duration::ZERO), Duration::from_secs(10));
        assert_eq!(config.effective_wait(Duration::from_secs(1)), Duration::from_secs(1));
        assert_eq!(config.effective_wait(Duration::from_secs(3600)), Duration::from_secs(60));
    }

    #[test]
    fn test_validate_rejects_inverted_waits() {
        let config = QueryConfig::default()
            .with_default_query_wait(Duration::from_secs(60))
            .with_max_query_wait(Duration::from_secs(10));

        match config.validate() {
            Err(WaypointError::Config(ConfigError::InvalidValue { field, .. })) => {
                assert_eq!(field, "default_query_wait");
            }
            other => panic!("Expected ConfigError::InvalidValue, got {:?}", other),
        }
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The effective wait never exceeds the configured maximum.
        #[test]
        fn prop_effective_wait_is_capped(
            requested_ms in 0u64..10_000_000,
            max_secs in 1u64..3600,
        ) {
            let config = QueryConfig::default()
                .with_default_query_wait(Duration::from_secs(1))
                .with_max_query_wait(Duration::from_secs(max_secs));
            let wait = config.effective_wait(Duration::from_millis(requested_ms));
            prop_assert!(wait <= config.max_query_wait);
            prop_assert!(!wait.is_zero());
        }
    }
}
