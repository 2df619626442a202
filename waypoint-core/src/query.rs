//! Blocking-query parameters and read metadata.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ConfigEntry;

/// Name of the remote operation that lists config entries related to a service.
pub const CONFIG_ENTRY_LIST_RELATED: &str = "ConfigEntry.ListRelated";

/// Options attached to every read.
///
/// `min_query_index` and `max_query_time` turn a read into a blocking query:
/// the server holds the request until its index passes `min_query_index` or
/// `max_query_time` elapses. `max_age` and `must_revalidate` are consumed by
/// the cache engine and are not sent to the server.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueryOptions {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
    #[serde(default)]
    pub min_query_index: u64,
    #[serde(default)]
    pub max_query_time: Duration,
    /// Allow any server, not just the leader, to answer.
    #[serde(default)]
    pub allow_stale: bool,
    #[serde(default)]
    pub require_consistent: bool,
    #[serde(default)]
    pub max_age: Duration,
    #[serde(default)]
    pub must_revalidate: bool,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    pub fn with_min_index(mut self, index: u64) -> Self {
        self.min_query_index = index;
        self
    }

    pub fn with_max_query_time(mut self, wait: Duration) -> Self {
        self.max_query_time = wait;
        self
    }

    pub fn with_allow_stale(mut self, allow_stale: bool) -> Self {
        self.allow_stale = allow_stale;
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Whether this is a blocking query.
    pub fn is_blocking(&self) -> bool {
        self.min_query_index > 0
    }
}

/// Metadata returned alongside every read.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueryMeta {
    /// Index at which the returned snapshot was valid.
    pub index: u64,
    /// Time since the answering server last contacted the leader.
    #[serde(default)]
    pub last_contact: Duration,
    #[serde(default)]
    pub known_leader: bool,
}

impl QueryMeta {
    pub fn at_index(index: u64) -> Self {
        Self {
            index,
            last_contact: Duration::ZERO,
            known_leader: true,
        }
    }
}

/// Read of every config entry related to a service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RelatedConfigEntryQuery {
    pub service_name: String,
    pub datacenter: String,
    #[serde(flatten)]
    pub query_options: QueryOptions,
}

/// Response of a related config entry read.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IndexedConfigEntries {
    #[serde(default)]
    pub entries: Vec<ConfigEntry>,
    #[serde(flatten)]
    pub query_meta: QueryMeta,
}
