//! Waypoint Cache - Discovery Chain Cache Type and Blocking Cache Engine
//!
//! Derives cache keys from requests, fetches and compiles discovery chains
//! with blocking-query semantics, and keeps the results current per key.

pub mod cache;

pub use cache::{
    BlockingCache, CacheConfig, CacheRead, CacheRequest, CacheStats, CacheType,
    CompiledDiscoveryChainFetcher, ConfigEntryRpc, DiscoveryChainRequest, DiscoveryChainResponse,
    FetchOptions, FetchResult, InMemoryConfigEntryStore, ReadSource, Request, RequestInfo,
    Watermark, COMPILED_DISCOVERY_CHAIN_NAME,
};
