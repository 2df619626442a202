//! In-memory config entry store.
//!
//! Implements the `ConfigEntry.ListRelated` read with real blocking-query
//! semantics: a read with `min_query_index > 0` waits until the store index
//! passes it or the wait elapses, then answers with the current snapshot.
//! Every write bumps the index.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::watch;
use tracing::debug;
use waypoint_core::{
    ConfigEntry, ConfigEntryKind, IndexedConfigEntries, QueryConfig, QueryMeta,
    RelatedConfigEntryQuery, TransportError, CONFIG_ENTRY_LIST_RELATED,
};

use super::traits::ConfigEntryRpc;

type EntryKey = (ConfigEntryKind, String);

#[derive(Debug, Clone, Default)]
struct Snapshot {
    index: u64,
    entries: BTreeMap<EntryKey, ConfigEntry>,
}

/// Config entries held in memory behind a watch channel.
pub struct InMemoryConfigEntryStore {
    state: watch::Sender<Snapshot>,
    config: QueryConfig,
}

impl Default for InMemoryConfigEntryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryConfigEntryStore {
    pub fn new() -> Self {
        Self::with_config(QueryConfig::default())
    }

    pub fn with_config(config: QueryConfig) -> Self {
        let (state, _) = watch::channel(Snapshot::default());
        Self { state, config }
    }

    /// Current store index.
    pub fn index(&self) -> u64 {
        self.state.borrow().index
    }

    pub fn len(&self) -> usize {
        self.state.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, kind: ConfigEntryKind, name: &str) -> Option<ConfigEntry> {
        self.state
            .borrow()
            .entries
            .get(&(kind, name.to_string()))
            .cloned()
    }

    /// Insert or replace an entry. Returns the new index.
    pub fn set(&self, entry: ConfigEntry) -> u64 {
        let (index, _) = self.write(|entries| {
            entries.insert((entry.kind(), entry.name().to_string()), entry);
            true
        });
        index
    }

    /// Remove an entry. Returns the new index, or `None` when no such entry
    /// existed (the index does not move).
    pub fn delete(&self, kind: ConfigEntryKind, name: &str) -> Option<u64> {
        let (index, removed) =
            self.write(|entries| entries.remove(&(kind, name.to_string())).is_some());
        removed.then_some(index)
    }

    /// Replace every entry at once. Returns the new index.
    pub fn replace_all<I>(&self, entries: I) -> u64
    where
        I: IntoIterator<Item = ConfigEntry>,
    {
        let fresh: BTreeMap<EntryKey, ConfigEntry> = entries
            .into_iter()
            .map(|e| ((e.kind(), e.name().to_string()), e))
            .collect();
        let (index, _) = self.write(move |entries| {
            *entries = fresh;
            true
        });
        index
    }

    /// Apply `change`; bump the index and notify readers when it reports a
    /// modification. Returns the resulting index and whether it moved.
    fn write<F>(&self, change: F) -> (u64, bool)
    where
        F: FnOnce(&mut BTreeMap<EntryKey, ConfigEntry>) -> bool,
    {
        let mut index = 0;
        let modified = self.state.send_if_modified(|snapshot| {
            let modified = change(&mut snapshot.entries);
            if modified {
                snapshot.index += 1;
            }
            index = snapshot.index;
            modified
        });
        (index, modified)
    }
}

/// Every entry reachable from `service` through router destinations,
/// splitter splits and resolver redirects, sorted by kind then name.
fn related_entries(entries: &BTreeMap<EntryKey, ConfigEntry>, service: &str) -> Vec<ConfigEntry> {
    const KINDS: [ConfigEntryKind; 3] = [
        ConfigEntryKind::ServiceRouter,
        ConfigEntryKind::ServiceSplitter,
        ConfigEntryKind::ServiceResolver,
    ];

    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut pending = vec![service.to_string()];
    let mut out = Vec::new();

    while let Some(name) = pending.pop() {
        if !seen.insert(name.clone()) {
            continue;
        }
        for kind in KINDS {
            if let Some(entry) = entries.get(&(kind, name.clone())) {
                pending.extend(entry.referenced_services().into_iter().map(str::to_string));
                out.push(entry.clone());
            }
        }
    }

    out.sort_by(|a, b| (a.kind(), a.name()).cmp(&(b.kind(), b.name())));
    out
}

#[async_trait]
impl ConfigEntryRpc for InMemoryConfigEntryStore {
    async fn list_related(
        &self,
        query: RelatedConfigEntryQuery,
    ) -> Result<IndexedConfigEntries, TransportError> {
        if query.service_name.is_empty() {
            return Err(TransportError::Remote {
                method: CONFIG_ENTRY_LIST_RELATED.to_string(),
                message: "Missing service name".to_string(),
            });
        }

        let mut rx = self.state.subscribe();
        let opts = &query.query_options;
        if opts.is_blocking() {
            let wait = self.config.effective_wait(opts.max_query_time);
            let min_index = opts.min_query_index;
            let changed = tokio::time::timeout(wait, async {
                rx.wait_for(|s| s.index > min_index).await.is_ok()
            })
            .await
            .unwrap_or(false);
            debug!(
                service = %query.service_name,
                min_index,
                changed,
                "blocking read returned"
            );
        }

        let snapshot = rx.borrow();
        Ok(IndexedConfigEntries {
            entries: related_entries(&snapshot.entries, &query.service_name),
            query_meta: QueryMeta::at_index(snapshot.index),
        })
    }
}
