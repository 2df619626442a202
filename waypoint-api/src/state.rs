//! Shared handler state.

use std::sync::Arc;
use std::time::Instant;

use waypoint_cache::{BlockingCache, CacheConfig, CompiledDiscoveryChainFetcher, ConfigEntryRpc};
use waypoint_chain::{ChainCompiler, DiscoveryChainCompiler};

/// State shared by every route.
#[derive(Clone)]
pub struct AppState {
    pub rpc: Arc<dyn ConfigEntryRpc>,
    pub compiler: Arc<dyn ChainCompiler>,
    /// Cache serving `/v1/discovery-chain`, backed by the same reader and
    /// compiler as the uncached debug route.
    pub cache: Arc<BlockingCache<CompiledDiscoveryChainFetcher>>,
    /// Datacenter chains are evaluated in.
    pub datacenter: String,
    pub start_time: Instant,
}

impl AppState {
    /// State using the reference compiler and default cache settings.
    pub fn new(rpc: Arc<dyn ConfigEntryRpc>, datacenter: impl Into<String>) -> Self {
        Self::build(
            rpc,
            Arc::new(DiscoveryChainCompiler::new()),
            datacenter,
            CacheConfig::default(),
        )
    }

    pub fn build(
        rpc: Arc<dyn ConfigEntryRpc>,
        compiler: Arc<dyn ChainCompiler>,
        datacenter: impl Into<String>,
        cache_config: CacheConfig,
    ) -> Self {
        let fetcher = CompiledDiscoveryChainFetcher::new(Arc::clone(&rpc))
            .with_compiler(Arc::clone(&compiler));
        Self {
            rpc,
            compiler,
            cache: Arc::new(BlockingCache::new(Arc::new(fetcher), cache_config)),
            datacenter: datacenter.into(),
            start_time: Instant::now(),
        }
    }
}
