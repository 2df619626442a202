//! Waypoint Test Utilities
//!
//! Centralized test infrastructure for the Waypoint workspace:
//! - Recording doubles for the remote read and the compiler
//! - Proptest generators for requests and config entries
//! - Test fixtures for common routing setups
//! - Custom assertions for Waypoint errors

// Re-export core types for convenience
pub use waypoint_cache::{
    CacheType, ConfigEntryRpc, DiscoveryChainRequest, FetchOptions, Request, RequestInfo,
};
pub use waypoint_chain::{default_chain, ChainCompiler, CompileRequest, CompileResult};
pub use waypoint_core::{
    CompiledDiscoveryChain, ConfigEntry, DiscoveryChainConfigEntries, IndexedConfigEntries,
    QueryMeta, QueryOptions, RelatedConfigEntryQuery, TransportError, WaypointError,
    WaypointResult, CONFIG_ENTRY_LIST_RELATED,
};

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

// ============================================================================
// RECORDING DOUBLES
// ============================================================================

/// Remote read double that records every query it receives.
///
/// Replies are taken from a queue; once the queue is empty the fallback reply
/// is repeated.
#[derive(Debug)]
pub struct RecordingRpc {
    replies: Mutex<VecDeque<Result<IndexedConfigEntries, TransportError>>>,
    fallback: Result<IndexedConfigEntries, TransportError>,
    queries: Mutex<Vec<RelatedConfigEntryQuery>>,
}

impl RecordingRpc {
    /// Always answer with `entries` at `index`.
    pub fn answering(entries: Vec<ConfigEntry>, index: u64) -> Self {
        Self::with_fallback(Ok(IndexedConfigEntries {
            entries,
            query_meta: QueryMeta::at_index(index),
        }))
    }

    /// Always fail with `err`.
    pub fn failing(err: TransportError) -> Self {
        Self::with_fallback(Err(err))
    }

    fn with_fallback(fallback: Result<IndexedConfigEntries, TransportError>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Queue a one-off reply ahead of the fallback.
    pub fn then_reply(self, entries: Vec<ConfigEntry>, index: u64) -> Self {
        self.push(Ok(IndexedConfigEntries {
            entries,
            query_meta: QueryMeta::at_index(index),
        }))
    }

    /// Queue a one-off failure ahead of the fallback.
    pub fn then_fail(self, err: TransportError) -> Self {
        self.push(Err(err))
    }

    fn push(self, reply: Result<IndexedConfigEntries, TransportError>) -> Self {
        self.replies
            .lock()
            .expect("replies lock poisoned")
            .push_back(reply);
        self
    }

    /// Every query received so far, oldest first.
    pub fn queries(&self) -> Vec<RelatedConfigEntryQuery> {
        self.queries.lock().expect("queries lock poisoned").clone()
    }

    pub fn call_count(&self) -> usize {
        self.queries.lock().expect("queries lock poisoned").len()
    }

    pub fn last_query(&self) -> Option<RelatedConfigEntryQuery> {
        self.queries
            .lock()
            .expect("queries lock poisoned")
            .last()
            .cloned()
    }
}

#[async_trait]
impl ConfigEntryRpc for RecordingRpc {
    async fn list_related(
        &self,
        query: RelatedConfigEntryQuery,
    ) -> Result<IndexedConfigEntries, TransportError> {
        self.queries
            .lock()
            .expect("queries lock poisoned")
            .push(query);
        let next = self
            .replies
            .lock()
            .expect("replies lock poisoned")
            .pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

/// Compiler double that records requests and answers with a fixed result.
#[derive(Debug)]
pub struct RecordingCompiler {
    result: CompileResult<Option<CompiledDiscoveryChain>>,
    requests: Mutex<Vec<CompileRequest>>,
}

impl RecordingCompiler {
    pub fn returning(result: CompileResult<Option<CompiledDiscoveryChain>>) -> Self {
        Self {
            result,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompileRequest> {
        self.requests.lock().expect("requests lock poisoned").clone()
    }
}

impl ChainCompiler for RecordingCompiler {
    fn compile(&self, req: &CompileRequest) -> CompileResult<Option<CompiledDiscoveryChain>> {
        self.requests
            .lock()
            .expect("requests lock poisoned")
            .push(req.clone());
        self.result.clone()
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating Waypoint request and entry types.

    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;
    use waypoint_core::{
        ServiceResolverConfigEntry, ServiceResolverRedirect, ServiceSplit,
        ServiceSplitterConfigEntry,
    };

    /// Generate a DNS-label style service name.
    pub fn arb_service_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9-]{0,15}"
    }

    pub fn arb_datacenter() -> impl Strategy<Value = String> {
        "dc[0-9]{1,2}"
    }

    pub fn arb_namespace() -> impl Strategy<Value = String> {
        prop_oneof![Just("default".to_string()), "[a-z]{1,8}"]
    }

    /// Generate per-call query options (token, indexes, waits).
    pub fn arb_query_options() -> impl Strategy<Value = QueryOptions> {
        (
            "[a-zA-Z0-9]{0,16}",
            any::<u64>(),
            0u64..600_000,
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(|(token, min_index, wait_ms, allow_stale, require_consistent)| {
                QueryOptions {
                    token,
                    min_query_index: min_index,
                    max_query_time: Duration::from_millis(wait_ms),
                    allow_stale,
                    require_consistent,
                    ..QueryOptions::default()
                }
            })
    }

    pub fn arb_discovery_chain_request() -> impl Strategy<Value = DiscoveryChainRequest> {
        (
            arb_service_name(),
            arb_datacenter(),
            arb_namespace(),
            arb_datacenter(),
            arb_query_options(),
        )
            .prop_map(|(service, eval_dc, eval_ns, dc, opts)| {
                DiscoveryChainRequest::new(service, dc)
                    .with_evaluate_in(eval_dc, eval_ns)
                    .with_query_options(opts)
            })
    }

    /// Generate a resolver entry, optionally redirecting to another service.
    pub fn arb_resolver_entry() -> impl Strategy<Value = ConfigEntry> {
        (arb_service_name(), proptest::option::of(arb_service_name())).prop_map(
            |(name, redirect)| {
                ConfigEntry::ServiceResolver(ServiceResolverConfigEntry {
                    name,
                    connect_timeout: None,
                    redirect: redirect.map(|service| ServiceResolverRedirect {
                        service: Some(service),
                        datacenter: None,
                    }),
                })
            },
        )
    }

    /// Generate a splitter whose weights sum to exactly 100.
    pub fn arb_splitter_entry() -> impl Strategy<Value = ConfigEntry> {
        (arb_service_name(), arb_service_name(), 0u32..=100).prop_map(
            |(name, other, weight)| {
                ConfigEntry::ServiceSplitter(ServiceSplitterConfigEntry {
                    name: name.clone(),
                    splits: vec![
                        ServiceSplit {
                            weight: weight as f32,
                            service: Some(name),
                        },
                        ServiceSplit {
                            weight: (100 - weight) as f32,
                            service: Some(other),
                        },
                    ],
                })
            },
        )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common routing setups.

    use super::*;
    use std::time::Duration;
    use waypoint_core::{
        ServiceResolverConfigEntry, ServiceResolverRedirect, ServiceRoute,
        ServiceRouteDestination, ServiceRouteMatch, ServiceRouterConfigEntry, ServiceSplit,
        ServiceSplitterConfigEntry,
    };

    /// The `web` request evaluated in `default`/`dc1`, read from `dc1`.
    pub fn web_request() -> DiscoveryChainRequest {
        DiscoveryChainRequest::new("web", "dc1").with_evaluate_in("dc1", "default")
    }

    /// `web` request blocking past `min_index` for up to `timeout`.
    pub fn blocking_web_request(min_index: u64, timeout: Duration) -> DiscoveryChainRequest {
        web_request().with_query_options(
            QueryOptions::new()
                .with_min_index(min_index)
                .with_max_query_time(timeout),
        )
    }

    pub fn router(name: &str, routes: &[(&str, &str)]) -> ConfigEntry {
        ConfigEntry::ServiceRouter(ServiceRouterConfigEntry {
            name: name.to_string(),
            routes: routes
                .iter()
                .map(|(prefix, service)| ServiceRoute {
                    route_match: Some(ServiceRouteMatch {
                        path_prefix: Some(prefix.to_string()),
                    }),
                    destination: Some(ServiceRouteDestination {
                        service: Some(service.to_string()),
                    }),
                })
                .collect(),
        })
    }

    pub fn splitter(name: &str, splits: &[(f32, &str)]) -> ConfigEntry {
        ConfigEntry::ServiceSplitter(ServiceSplitterConfigEntry {
            name: name.to_string(),
            splits: splits
                .iter()
                .map(|(weight, service)| ServiceSplit {
                    weight: *weight,
                    service: Some(service.to_string()),
                })
                .collect(),
        })
    }

    pub fn resolver(name: &str) -> ConfigEntry {
        ConfigEntry::ServiceResolver(ServiceResolverConfigEntry {
            name: name.to_string(),
            connect_timeout: None,
            redirect: None,
        })
    }

    pub fn redirect(name: &str, to: &str) -> ConfigEntry {
        ConfigEntry::ServiceResolver(ServiceResolverConfigEntry {
            name: name.to_string(),
            connect_timeout: None,
            redirect: Some(ServiceResolverRedirect {
                service: Some(to.to_string()),
                datacenter: None,
            }),
        })
    }

    /// A canary rollout for `web`: 90/10 split between `web` and `web-canary`,
    /// with `/admin` routed to `admin`.
    pub fn canary_entries() -> Vec<ConfigEntry> {
        vec![
            router("web", &[("/admin", "admin")]),
            splitter("web", &[(90.0, "web"), (10.0, "web-canary")]),
            resolver("web"),
            resolver("web-canary"),
        ]
    }

    /// An empty read at `index`.
    pub fn empty_read(index: u64) -> IndexedConfigEntries {
        IndexedConfigEntries {
            entries: vec![],
            query_meta: QueryMeta::at_index(index),
        }
    }

    pub fn unavailable() -> TransportError {
        TransportError::Unavailable {
            method: CONFIG_ENTRY_LIST_RELATED.to_string(),
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertions for Waypoint results.

    use super::*;
    use waypoint_core::{CacheError, CompileError};

    /// Assert that a result is Ok.
    pub fn assert_ok<T: std::fmt::Debug>(result: &WaypointResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got {:?}", result);
    }

    /// Assert that a result is a transport error.
    pub fn assert_transport_error<T: std::fmt::Debug>(result: &WaypointResult<T>) {
        match result {
            Err(WaypointError::Transport(_)) => {}
            other => panic!("Expected transport error, got {:?}", other),
        }
    }

    /// Assert that a result is a compile error.
    pub fn assert_compile_error<T: std::fmt::Debug>(result: &WaypointResult<T>) -> CompileError {
        match result {
            Err(WaypointError::Compile(err)) => err.clone(),
            other => panic!("Expected compile error, got {:?}", other),
        }
    }

    /// Assert that a result is the wrong-request-type defect.
    pub fn assert_wrong_type<T: std::fmt::Debug>(result: &WaypointResult<T>) {
        match result {
            Err(err @ WaypointError::Cache(CacheError::RequestWrongType { .. })) => {
                assert!(err.to_string().contains("wrong type"));
            }
            other => panic!("Expected request wrong type error, got {:?}", other),
        }
    }

    /// Assert that a key is a 64 character lowercase hex digest.
    pub fn assert_cache_key_shape(key: &str) {
        assert_eq!(key.len(), 64, "cache key should be 64 chars: {}", key);
        assert!(
            key.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')),
            "cache key should be lowercase hex: {}",
            key
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixtures::*;

    #[tokio::test]
    async fn test_recording_rpc_replays_queue_then_fallback() {
        let rpc = RecordingRpc::answering(vec![], 10)
            .then_reply(vec![resolver("web")], 5)
            .then_fail(unavailable());

        let q = RelatedConfigEntryQuery::default();
        let first = rpc.list_related(q.clone()).await.expect("first reply");
        assert_eq!(first.query_meta.index, 5);
        assert!(rpc.list_related(q.clone()).await.is_err());
        let third = rpc.list_related(q).await.expect("fallback reply");
        assert_eq!(third.query_meta.index, 10);
        assert_eq!(rpc.call_count(), 3);
    }

    #[test]
    fn test_recording_compiler_records() {
        let compiler = RecordingCompiler::returning(Ok(None));
        let req = CompileRequest {
            service_name: "web".to_string(),
            ..Default::default()
        };
        assert_eq!(compiler.compile(&req), Ok(None));
        assert_eq!(compiler.requests(), vec![req]);
    }

    #[test]
    fn test_canary_entries_compile() {
        let req = CompileRequest {
            service_name: "web".to_string(),
            current_namespace: "default".to_string(),
            current_datacenter: "dc1".to_string(),
            infer_defaults: true,
            entries: DiscoveryChainConfigEntries::from_entries(canary_entries()),
        };
        let chain = waypoint_chain::compile(&req)
            .expect("canary entries should compile")
            .expect("chain should exist");
        assert_eq!(chain.start_node, "router:web");
        assert_eq!(chain.targets.len(), 3);
    }
}
