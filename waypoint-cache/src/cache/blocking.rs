//! Blocking cache engine.
//!
//! Keeps one entry per cache key, each stamped with the index it was fetched
//! at. A read is served from the entry when the caller has not seen that index
//! yet; otherwise the cache type is asked to block until the index moves past
//! what the caller has seen.
//!
//! # Watermark rules
//!
//! - A fetched index strictly above the stored watermark replaces the entry.
//! - An equal index keeps the stored value (nothing changed for waiters) and
//!   only refreshes when it was last confirmed.
//! - A lower index never overwrites.
//! - Errors are returned to the caller and never stored.
//!
//! Concurrent fetches of one key are serialized. A caller queued behind an
//! in-flight fetch waits at most its own timeout, then gets the stored entry
//! at its unchanged index.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::debug;
use waypoint_core::{ConfigError, WaypointError, WaypointResult};

use super::freshness::{CacheRead, ReadSource};
use super::request::{CacheRequest, Request, RequestInfo};
use super::traits::{CacheType, FetchOptions, FetchResult};
use super::watermark::{IndexChange, Watermark};

/// Smallest wait handed to a fetch that started after queueing on the key.
const MIN_FETCH_WAIT: Duration = Duration::from_millis(1);

fn deadline_after(wait: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(wait)
        .unwrap_or_else(|| now + Duration::from_secs(86400 * 365 * 30))
}

/// Configuration for the blocking cache engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Blocking wait used when a request carries no timeout.
    pub default_timeout: Duration,
    /// Entries not confirmed by a fetch for this long are evicted by
    /// [`BlockingCache::evict_expired`].
    pub entry_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(600),
            entry_ttl: Duration::from_secs(72 * 3600),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `WAYPOINT_CACHE_DEFAULT_TIMEOUT_SECS` (default: 600)
    /// - `WAYPOINT_CACHE_ENTRY_TTL_SECS` (default: 259200)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            default_timeout: std::env::var("WAYPOINT_CACHE_DEFAULT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.default_timeout),
            entry_ttl: std::env::var("WAYPOINT_CACHE_ENTRY_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.entry_ttl),
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = ttl;
        self
    }

    pub fn validate(&self) -> WaypointResult<()> {
        if self.default_timeout.is_zero() {
            return Err(WaypointError::Config(ConfigError::InvalidValue {
                field: "default_timeout".to_string(),
                value: format!("{:?}", self.default_timeout),
                reason: "default_timeout must be positive".to_string(),
            }));
        }

        if self.entry_ttl.is_zero() {
            return Err(WaypointError::Config(ConfigError::InvalidValue {
                field: "entry_ttl".to_string(),
                value: format!("{:?}", self.entry_ttl),
                reason: "entry_ttl must be positive".to_string(),
            }));
        }

        Ok(())
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Requests without a cache key, fetched directly.
    pub bypasses: u64,
    pub entries: u64,
}

impl CacheStats {
    /// Hit rate (0.0 to 1.0) over keyed requests.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    bypasses: AtomicU64,
}

struct CacheEntry<V> {
    value: Arc<V>,
    watermark: Watermark,
}

/// Blocking cache over a single cache type.
pub struct BlockingCache<T: CacheType> {
    cache_type: Arc<T>,
    config: CacheConfig,
    entries: RwLock<HashMap<String, CacheEntry<T::Value>>>,
    /// One fetch lock per key; concurrent misses on a key share one fetch.
    fetch_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    counters: Counters,
}

impl<T: CacheType> BlockingCache<T> {
    pub fn new(cache_type: Arc<T>, config: CacheConfig) -> Self {
        Self {
            cache_type,
            config,
            entries: RwLock::new(HashMap::new()),
            fetch_locks: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    pub fn with_defaults(cache_type: Arc<T>) -> Self {
        Self::new(cache_type, CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn cache_type(&self) -> &T {
        &self.cache_type
    }

    /// Get the value for `req`.
    ///
    /// Returns immediately when a stored value is newer than the request's
    /// `min_index`. Otherwise fetches, blocking up to the request timeout (or
    /// the configured default) for the index to pass `min_index`.
    pub async fn get(&self, req: impl Into<Request>) -> WaypointResult<CacheRead<T::Value>> {
        let req = req.into();
        let info = req.cache_info();

        let Some(key) = info.key.clone() else {
            self.counters.bypasses.fetch_add(1, Ordering::Relaxed);
            debug!(
                cache_type = self.cache_type.name(),
                "request has no cache key, bypassing cache"
            );
            let result = self.cache_type.fetch(self.fetch_options(&info), req).await?;
            return Ok(CacheRead::new(
                result.value,
                Watermark::at(result.index),
                ReadSource::Bypass,
            ));
        };

        if let Some(read) = self.lookup(&key, &info).await {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(read);
        }

        let mut opts = self.fetch_options(&info);
        let deadline = deadline_after(opts.timeout);

        let lock = self.fetch_lock(&key).await;
        let _guard = match lock.try_lock() {
            Ok(guard) => guard,
            // Another caller's fetch holds the key. Wait for it no longer
            // than this caller's own timeout.
            Err(_) => match tokio::time::timeout_at(deadline, lock.lock()).await {
                Ok(guard) => {
                    opts.timeout = deadline
                        .saturating_duration_since(Instant::now())
                        .max(MIN_FETCH_WAIT);
                    guard
                }
                Err(_) => return self.lock_wait_elapsed(key, opts, req).await,
            },
        };

        // Another caller may have fetched while this one waited on the lock.
        if let Some(read) = self.lookup(&key, &info).await {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(read);
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        debug!(
            cache_type = self.cache_type.name(),
            key = %key,
            min_index = opts.min_index,
            "cache miss, fetching"
        );
        let result = self.cache_type.fetch(opts, req).await?;
        Ok(self.store(key, result).await)
    }

    /// The caller's timeout ran out while another fetch held the key. Serve
    /// the stored entry at its unchanged index, as a timed-out blocking fetch
    /// would. With nothing stored yet, read without blocking.
    async fn lock_wait_elapsed(
        &self,
        key: String,
        opts: FetchOptions,
        req: Request,
    ) -> WaypointResult<CacheRead<T::Value>> {
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        debug!(
            cache_type = self.cache_type.name(),
            key = %key,
            "timed out waiting on in-flight fetch"
        );

        let stored = self
            .entries
            .read()
            .await
            .get(&key)
            .map(|e| (Arc::clone(&e.value), e.watermark));
        if let Some((value, watermark)) = stored {
            return Ok(CacheRead::new(value, watermark, ReadSource::Fetch));
        }

        let opts = FetchOptions {
            min_index: 0,
            ..opts
        };
        let result = self.cache_type.fetch(opts, req).await?;
        Ok(self.store(key, result).await)
    }

    /// Current watermark for `key`, if an entry exists.
    pub async fn watermark(&self, key: &str) -> Option<Watermark> {
        self.entries.read().await.get(key).map(|e| e.watermark)
    }

    /// Drop the entry for `key`. Returns whether one existed.
    pub async fn invalidate(&self, key: &str) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    /// Drop every entry not confirmed within `entry_ttl`. Returns how many
    /// were dropped.
    pub async fn evict_expired(&self) -> usize {
        let ttl = self.config.entry_ttl;
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| !e.watermark.outlived(ttl));
        let evicted = before - entries.len();
        drop(entries);

        if evicted > 0 {
            let mut locks = self.fetch_locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        evicted
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            bypasses: self.counters.bypasses.load(Ordering::Relaxed),
            entries: self.entries.read().await.len() as u64,
        }
    }

    fn fetch_options(&self, info: &RequestInfo) -> FetchOptions {
        FetchOptions {
            min_index: info.min_index,
            timeout: if info.timeout.is_zero() {
                self.config.default_timeout
            } else {
                info.timeout
            },
        }
    }

    async fn fetch_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.fetch_locks.lock().await;
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    /// Serve from the stored entry when the caller hasn't seen its index yet
    /// and the entry needs no revalidation.
    async fn lookup(&self, key: &str, info: &RequestInfo) -> Option<CacheRead<T::Value>> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;

        if info.min_index >= entry.watermark.index {
            return None;
        }
        if info.must_revalidate {
            return None;
        }
        if !info.max_age.is_zero() && entry.watermark.age() > info.max_age {
            return None;
        }

        Some(CacheRead::new(
            Arc::clone(&entry.value),
            entry.watermark,
            ReadSource::Cache,
        ))
    }

    async fn store(&self, key: String, result: FetchResult<T::Value>) -> CacheRead<T::Value> {
        let mut entries = self.entries.write().await;

        if let Some(existing) = entries.get_mut(&key) {
            match existing.watermark.compare(result.index) {
                IndexChange::Advanced => {}
                IndexChange::Unchanged => {
                    existing.watermark.confirm();
                    debug!(key = %key, index = result.index, "index unchanged, keeping stored value");
                    return CacheRead::new(
                        Arc::clone(&existing.value),
                        existing.watermark,
                        ReadSource::Fetch,
                    );
                }
                IndexChange::Regressed => {
                    debug!(
                        key = %key,
                        index = result.index,
                        stored = existing.watermark.index,
                        "fetch returned an older index, keeping stored value"
                    );
                    return CacheRead::new(
                        Arc::clone(&existing.value),
                        existing.watermark,
                        ReadSource::Fetch,
                    );
                }
            }
        }

        let watermark = Watermark::at(result.index);
        debug!(key = %key, index = result.index, "storing fetched value");
        entries.insert(
            key,
            CacheEntry {
                value: Arc::clone(&result.value),
                watermark,
            },
        );
        CacheRead::new(result.value, watermark, ReadSource::Fetch)
    }
}
