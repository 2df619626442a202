//! Per-key index watermarks.
//!
//! Indexes only move forward. A fetch is compared against the stored
//! watermark to decide whether it carries news.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// How a fetched index relates to the stored watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexChange {
    Advanced,
    Unchanged,
    /// The answering server is behind the one that produced the stored
    /// value.
    Regressed,
}

/// Last index stored for a key and when a fetch last confirmed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermark {
    pub index: u64,
    pub confirmed_at: DateTime<Utc>,
}

impl Watermark {
    /// A watermark for `index`, confirmed now.
    pub fn at(index: u64) -> Self {
        Self {
            index,
            confirmed_at: Utc::now(),
        }
    }

    pub fn compare(&self, fetched: u64) -> IndexChange {
        match fetched.cmp(&self.index) {
            std::cmp::Ordering::Greater => IndexChange::Advanced,
            std::cmp::Ordering::Equal => IndexChange::Unchanged,
            std::cmp::Ordering::Less => IndexChange::Regressed,
        }
    }

    /// Record that a fetch just reported this same index.
    pub fn confirm(&mut self) {
        self.confirmed_at = Utc::now();
    }

    pub fn age(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.confirmed_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Not confirmed within `ttl`.
    pub fn outlived(&self, ttl: Duration) -> bool {
        self.age() > ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn confirmed_ago(index: u64, secs: i64) -> Watermark {
        Watermark {
            index,
            confirmed_at: Utc::now() - chrono::Duration::seconds(secs),
        }
    }

    #[test]
    fn test_compare() {
        let mark = Watermark::at(24);
        assert_eq!(mark.compare(48), IndexChange::Advanced);
        assert_eq!(mark.compare(24), IndexChange::Unchanged);
        assert_eq!(mark.compare(3), IndexChange::Regressed);
    }

    #[test]
    fn test_confirm_resets_age_not_index() {
        let mut mark = confirmed_ago(7, 30);
        assert!(mark.age() >= Duration::from_secs(29));

        mark.confirm();
        assert_eq!(mark.index, 7);
        assert!(mark.age() < Duration::from_secs(5));
    }

    #[test]
    fn test_outlived() {
        let mark = confirmed_ago(1, 120);
        assert!(mark.outlived(Duration::from_secs(60)));
        assert!(!mark.outlived(Duration::from_secs(3600)));
    }
}
