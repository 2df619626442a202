//! Cache type and remote read traits.
//!
//! A cache type knows how to fetch one kind of value given blocking-query
//! options. The cache engine owns keys, watermarks and waiters; the cache type
//! owns nothing but its collaborators.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use waypoint_core::{IndexedConfigEntries, RelatedConfigEntryQuery, TransportError, WaypointResult};

use super::request::Request;

/// Options the cache engine supplies on each fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchOptions {
    /// Last index the caller has already seen. The fetch should block until
    /// the data moves past it.
    pub min_index: u64,
    /// Upper bound on how long the fetch may block.
    pub timeout: Duration,
}

/// Value and index returned by a fetch.
///
/// The engine treats `index` as the new watermark for the key. A result whose
/// index equals the previous watermark means "nothing changed".
#[derive(Debug)]
pub struct FetchResult<V> {
    pub value: Arc<V>,
    pub index: u64,
}

impl<V> FetchResult<V> {
    pub fn new(value: V, index: u64) -> Self {
        Self {
            value: Arc::new(value),
            index,
        }
    }
}

impl<V> Clone for FetchResult<V> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            index: self.index,
        }
    }
}

/// A kind of value the cache engine can keep up to date.
///
/// Implementations must be safe to call concurrently for different keys and
/// must not retain any per-call state between fetches.
#[async_trait]
pub trait CacheType: Send + Sync {
    type Value: Send + Sync + 'static;

    /// Name the cache type is registered under.
    fn name(&self) -> &'static str;

    /// Fetch the value for `req`, blocking per `opts`.
    async fn fetch(&self, opts: FetchOptions, req: Request) -> WaypointResult<FetchResult<Self::Value>>;

    /// Whether `fetch` honours `FetchOptions::min_index` by blocking.
    fn supports_blocking(&self) -> bool;
}

/// The `ConfigEntry.ListRelated` remote read.
#[async_trait]
pub trait ConfigEntryRpc: Send + Sync {
    async fn list_related(
        &self,
        query: RelatedConfigEntryQuery,
    ) -> Result<IndexedConfigEntries, TransportError>;
}

#[async_trait]
impl<R: ConfigEntryRpc + ?Sized> ConfigEntryRpc for Arc<R> {
    async fn list_related(
        &self,
        query: RelatedConfigEntryQuery,
    ) -> Result<IndexedConfigEntries, TransportError> {
        (**self).list_related(query).await
    }
}
