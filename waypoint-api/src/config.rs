//! API server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::{ApiError, ApiResult};

/// Datacenter the server answers for when none is configured.
pub const DEFAULT_DATACENTER: &str = "dc1";

/// Server configuration loaded from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_host: String,
    pub port: u16,
    /// Local datacenter. Chains are evaluated here and reads without `?dc`
    /// go here.
    pub datacenter: String,
    /// JSON file holding the initial config entries.
    pub entries_file: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 3000,
            datacenter: DEFAULT_DATACENTER.to_string(),
            entries_file: None,
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `WAYPOINT_API_BIND`: Host to bind (default: 0.0.0.0)
    /// - `PORT` or `WAYPOINT_API_PORT`: Port to bind (default: 3000)
    /// - `WAYPOINT_DATACENTER`: Local datacenter (default: dc1)
    /// - `WAYPOINT_ENTRIES_FILE`: JSON array of config entries to preload
    pub fn from_env() -> ApiResult<Self> {
        let defaults = Self::default();

        let port = match std::env::var("PORT")
            .ok()
            .or_else(|| std::env::var("WAYPOINT_API_PORT").ok())
        {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", raw)))?,
            None => defaults.port,
        };

        let config = Self {
            bind_host: std::env::var("WAYPOINT_API_BIND").unwrap_or(defaults.bind_host),
            port,
            datacenter: std::env::var("WAYPOINT_DATACENTER").unwrap_or(defaults.datacenter),
            entries_file: std::env::var("WAYPOINT_ENTRIES_FILE").ok().map(PathBuf::from),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ApiResult<()> {
        if self.datacenter.trim().is_empty() {
            return Err(ApiError::invalid_input("Datacenter must not be empty"));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>().map_err(|e| {
            ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e))
        })
    }
}
