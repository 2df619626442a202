//! Waypoint API - HTTP surface for discovery chains
//!
//! Serves compiled discovery chains over HTTP, either compiled fresh on each
//! request (`/v1/internal/discovery-chain`) or through the blocking cache
//! (`/v1/discovery-chain`). Config entries come from any
//! [`ConfigEntryRpc`](waypoint_cache::ConfigEntryRpc) implementation; the
//! server binary uses the in-memory store.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_router;
pub use state::AppState;
