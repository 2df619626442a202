//! What a cache read returns.

use std::sync::Arc;
use std::time::Duration;

use super::watermark::Watermark;

/// Where a read's value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    /// Stored entry, no fetch.
    Cache,
    /// Fetched for this read, or by a concurrent read this one waited on.
    Fetch,
    /// Request had no key; fetched and not stored.
    Bypass,
}

/// A value plus the index it is valid at.
///
/// Every reader served the same version shares one `Arc`.
#[derive(Debug)]
pub struct CacheRead<T> {
    value: Arc<T>,
    watermark: Watermark,
    source: ReadSource,
}

impl<T> CacheRead<T> {
    pub(crate) fn new(value: Arc<T>, watermark: Watermark, source: ReadSource) -> Self {
        Self {
            value,
            watermark,
            source,
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn shared(&self) -> Arc<T> {
        Arc::clone(&self.value)
    }

    /// Pass back as the next request's `min_index` to block until the value
    /// changes.
    pub fn index(&self) -> u64 {
        self.watermark.index
    }

    pub fn watermark(&self) -> Watermark {
        self.watermark
    }

    /// Time since a fetch last confirmed the value.
    pub fn staleness(&self) -> Duration {
        self.watermark.age()
    }

    pub fn source(&self) -> ReadSource {
        self.source
    }

    pub fn was_cache_hit(&self) -> bool {
        self.source == ReadSource::Cache
    }
}

impl<T> Clone for CacheRead<T> {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.value), self.watermark, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_hit_only_from_cache() {
        let value = Arc::new("chain".to_string());
        let mark = Watermark::at(48);

        let hit = CacheRead::new(Arc::clone(&value), mark, ReadSource::Cache);
        assert!(hit.was_cache_hit());
        assert_eq!(hit.value(), "chain");
        assert_eq!(hit.index(), 48);

        for source in [ReadSource::Fetch, ReadSource::Bypass] {
            assert!(!CacheRead::new(Arc::clone(&value), mark, source).was_cache_hit());
        }
    }

    #[test]
    fn test_staleness_follows_confirmation() {
        let mark = Watermark {
            index: 1,
            confirmed_at: Utc::now() - chrono::Duration::seconds(5),
        };
        let read = CacheRead::new(Arc::new(()), mark, ReadSource::Cache);

        assert!(read.staleness() >= Duration::from_secs(4));
        assert!(read.staleness() <= Duration::from_secs(10));
    }

    #[test]
    fn test_clone_shares_value() {
        let read = CacheRead::new(Arc::new(vec![1u8, 2, 3]), Watermark::at(9), ReadSource::Fetch);
        let cloned = read.clone();
        assert!(Arc::ptr_eq(&read.shared(), &cloned.shared()));
        assert_eq!(cloned.source(), ReadSource::Fetch);
    }
}
