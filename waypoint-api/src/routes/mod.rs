//! HTTP routes.

pub mod discovery_chain;
pub mod health;

use axum::{routing::get, Router};

use crate::state::AppState;

/// Build the full router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/v1/internal/discovery-chain",
            get(discovery_chain::missing_chain_name),
        )
        .route(
            "/v1/internal/discovery-chain/",
            get(discovery_chain::missing_chain_name),
        )
        .route(
            "/v1/internal/discovery-chain/:name",
            get(discovery_chain::get_internal_discovery_chain),
        )
        .route(
            "/v1/discovery-chain/:name",
            get(discovery_chain::get_cached_discovery_chain),
        )
        .nest("/health", health::create_router())
        .with_state(state)
}
