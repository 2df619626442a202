//! Waypoint API server entry point.

use std::sync::Arc;
use std::time::Duration;

use waypoint_api::{
    create_router,
    telemetry::{init_tracing, TelemetryConfig},
    ApiConfig, ApiError, ApiResult, AppState,
};
use waypoint_cache::{
    BlockingCache, CacheConfig, CompiledDiscoveryChainFetcher, InMemoryConfigEntryStore,
};
use waypoint_chain::DiscoveryChainCompiler;
use waypoint_core::{ConfigEntry, QueryConfig};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let api_config = ApiConfig::from_env()?;
    let query_config = QueryConfig::from_env();
    query_config.validate()?;
    let cache_config = CacheConfig::from_env();
    cache_config.validate()?;

    let store = Arc::new(InMemoryConfigEntryStore::with_config(query_config));
    if let Some(path) = &api_config.entries_file {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            ApiError::internal_error(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let entries: Vec<ConfigEntry> = serde_json::from_str(&raw).map_err(|e| {
            ApiError::invalid_input(format!("Invalid config entries in {}: {}", path.display(), e))
        })?;
        let count = entries.len();
        let index = store.replace_all(entries);
        tracing::info!(path = %path.display(), count, index, "Loaded config entries");
    }

    let state = AppState::build(
        store,
        Arc::new(DiscoveryChainCompiler::new()),
        api_config.datacenter.clone(),
        cache_config,
    );
    spawn_eviction(Arc::clone(&state.cache));
    let app = create_router(state);

    let addr = api_config.bind_addr()?;
    tracing::info!(%addr, datacenter = %api_config.datacenter, "Starting Waypoint API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}

/// Periodically drop cache entries nobody has confirmed within the TTL.
fn spawn_eviction(cache: Arc<BlockingCache<CompiledDiscoveryChainFetcher>>) {
    const EVICTION_INTERVAL: Duration = Duration::from_secs(60 * 60);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(EVICTION_INTERVAL);
        loop {
            interval.tick().await;
            let evicted = cache.evict_expired().await;
            if evicted > 0 {
                tracing::info!(evicted, "Evicted expired cache entries");
            }
        }
    });
}
