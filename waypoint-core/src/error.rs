//! Error types for Waypoint operations

use thiserror::Error;

/// Remote read (transport) errors.
///
/// These are transient from the cache's point of view: they are surfaced to
/// the caller unchanged and are never cached.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("No servers available to handle {method}")]
    Unavailable { method: String },

    #[error("{method} failed: {message}")]
    Remote { method: String, message: String },
}

/// Discovery-chain compilation errors.
///
/// A compile error is a property of the current configuration state. It will
/// not go away until the configuration changes (the index advances).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("Required field missing: {field}")]
    MissingField { field: String },

    #[error("Splits for service {service} must each be between 0 and 100 and sum to 100, got total {total}")]
    InvalidSplitWeights { service: String, total: String },

    #[error("Detected circular resolver redirect: {}", .chain.join(" -> "))]
    CircularRedirect { chain: Vec<String> },

    #[error("No resolver configured for service {service} and defaults are not inferred")]
    MissingResolver { service: String },
}

/// Cache engine and cache type errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The cache engine handed a cache type a request that belongs to a
    /// different cache type. Always a programming error.
    #[error("Internal cache failure: request wrong type: expected {expected}, got {got}")]
    RequestWrongType { expected: String, got: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Waypoint errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WaypointError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl WaypointError {
    /// Whether a caller may reasonably retry the same request.
    ///
    /// Only transport failures qualify. Compile errors persist until the
    /// configuration changes and request-shape errors are defects.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WaypointError::Transport(_))
    }
}

/// Result type alias for Waypoint operations.
pub type WaypointResult<T> = Result<T, WaypointError>;

// =============================================================================
// TESTS
// =============================================================================
