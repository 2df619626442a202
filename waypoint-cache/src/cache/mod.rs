//! Blocking-query caching of derived values.
//!
//! A [`CacheType`] turns a versioned remote read into a derived value plus the
//! read's index. [`BlockingCache`] drives a cache type per key: it serves
//! stored values to callers that haven't seen them yet and lets callers that
//! have block until the index moves.
//!
//! # Example
//!
//! ```ignore
//! let store = Arc::new(InMemoryConfigEntryStore::new());
//! let fetcher = CompiledDiscoveryChainFetcher::new(store.clone());
//! let cache = BlockingCache::with_defaults(Arc::new(fetcher));
//!
//! let read = cache.get(DiscoveryChainRequest::new("web", "dc1")).await?;
//!
//! // Block until the chain changes
//! let mut next = DiscoveryChainRequest::new("web", "dc1");
//! next.query_options.min_query_index = read.index();
//! let read = cache.get(next).await?;
//! ```

pub mod blocking;
pub mod discovery_chain;
pub mod freshness;
pub mod request;
pub mod store;
pub mod traits;
pub mod watermark;

pub use blocking::{BlockingCache, CacheConfig, CacheStats};
pub use discovery_chain::{
    CompiledDiscoveryChainFetcher, DiscoveryChainResponse, COMPILED_DISCOVERY_CHAIN_NAME,
};
pub use freshness::{CacheRead, ReadSource};
pub use request::{CacheRequest, DiscoveryChainRequest, Request, RequestInfo};
pub use store::InMemoryConfigEntryStore;
pub use traits::{CacheType, ConfigEntryRpc, FetchOptions, FetchResult};
pub use watermark::{IndexChange, Watermark};
