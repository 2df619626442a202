//! End-to-end fetch behaviour: remote read, compile, and the blocking cache.

use std::sync::Arc;
use std::time::Duration;

use waypoint_cache::{
    BlockingCache, CacheConfig, CacheRequest, CacheType, CompiledDiscoveryChainFetcher,
    DiscoveryChainRequest, FetchOptions, InMemoryConfigEntryStore, ReadSource,
};
use waypoint_core::{CompileError, DiscoveryGraphNode, QueryConfig};
use waypoint_test_utils::assertions::*;
use waypoint_test_utils::fixtures::*;
use waypoint_test_utils::generators::*;
use waypoint_test_utils::{default_chain, RecordingCompiler, RecordingRpc, RequestInfo};

#[tokio::test]
async fn test_scenario_empty_read_yields_default_chain() {
    let rpc = Arc::new(RecordingRpc::answering(vec![], 48));
    let fetcher = CompiledDiscoveryChainFetcher::new(rpc.clone());

    let result = fetcher
        .fetch(
            FetchOptions {
                min_index: 24,
                timeout: Duration::from_secs(1),
            },
            web_request().into(),
        )
        .await
        .expect("fetch should succeed");

    assert_eq!(result.index, 48);
    assert!(result.value.config_entries.is_empty());
    assert_eq!(result.value.chain, Some(default_chain("web", "default", "dc1")));
    assert_eq!(result.value.query_meta.index, 48);

    let query = rpc.last_query().expect("one read should be recorded");
    assert_eq!(query.query_options.min_query_index, 24);
    assert_eq!(query.query_options.max_query_time, Duration::from_secs(1));
    assert!(query.query_options.allow_stale);
}

#[tokio::test]
async fn test_compiler_receives_evaluation_context() {
    let rpc = Arc::new(RecordingRpc::answering(vec![resolver("web")], 3));
    let compiler = Arc::new(RecordingCompiler::returning(Ok(None)));
    let fetcher = CompiledDiscoveryChainFetcher::new(rpc.clone()).with_compiler(compiler.clone());

    let req = DiscoveryChainRequest::new("web", "dc2").with_evaluate_in("dc1", "team-a");
    let result = fetcher
        .fetch(FetchOptions::default(), req.into())
        .await
        .expect("fetch should succeed");

    assert_eq!(result.value.chain, None);
    assert_eq!(rpc.last_query().map(|q| q.datacenter), Some("dc2".to_string()));

    let requests = compiler.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].service_name, "web");
    assert_eq!(requests[0].current_datacenter, "dc1");
    assert_eq!(requests[0].current_namespace, "team-a");
    assert!(requests[0].infer_defaults);
    assert_eq!(requests[0].entries.len(), 1);
}

#[tokio::test]
async fn test_wrong_request_type_performs_no_read() {
    let rpc = Arc::new(RecordingRpc::answering(vec![], 1));
    let fetcher = CompiledDiscoveryChainFetcher::new(rpc.clone());

    let result = fetcher
        .fetch(FetchOptions::default(), RequestInfo::default().into())
        .await;

    assert_wrong_type(&result);
    assert_eq!(rpc.call_count(), 0);
}

#[tokio::test]
async fn test_transport_error_is_surfaced() {
    let rpc = Arc::new(RecordingRpc::failing(unavailable()));
    let fetcher = CompiledDiscoveryChainFetcher::new(rpc);

    let result = fetcher.fetch(FetchOptions::default(), web_request().into()).await;

    assert_transport_error(&result);
    assert_eq!(
        result.unwrap_err().to_string(),
        unavailable().to_string()
    );
}

#[tokio::test]
async fn test_store_backed_chain_follows_entries() {
    let store = Arc::new(InMemoryConfigEntryStore::new());
    store.replace_all(canary_entries());
    let fetcher = CompiledDiscoveryChainFetcher::new(store.clone());

    let result = fetcher
        .fetch(FetchOptions::default(), web_request().into())
        .await
        .expect("fetch should succeed");

    let chain = result.value.chain.clone().expect("chain should exist");
    assert_eq!(result.index, 1);
    assert_eq!(chain.start_node, "router:web");
    assert!(matches!(
        chain.nodes.get("splitter:web"),
        Some(DiscoveryGraphNode::Splitter(s)) if s.splits.len() == 2
    ));
}

#[tokio::test]
async fn test_invalid_entries_surface_compile_error() {
    let store = Arc::new(InMemoryConfigEntryStore::new());
    store.replace_all(vec![redirect("web", "api"), redirect("api", "web")]);
    let fetcher = CompiledDiscoveryChainFetcher::new(store);

    let result = fetcher.fetch(FetchOptions::default(), web_request().into()).await;

    assert!(matches!(
        assert_compile_error(&result),
        CompileError::CircularRedirect { .. }
    ));
}

#[tokio::test]
async fn test_cache_blocks_until_entries_change() {
    let store = Arc::new(InMemoryConfigEntryStore::with_config(
        QueryConfig::default().with_max_query_wait(Duration::from_secs(30)),
    ));
    store.set(resolver("web"));
    let fetcher = CompiledDiscoveryChainFetcher::new(store.clone());
    let cache = Arc::new(BlockingCache::new(Arc::new(fetcher), CacheConfig::default()));

    let first = cache.get(web_request()).await.expect("get should succeed");
    assert_eq!(first.index(), 1);

    let waiter = {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move {
            cache
                .get(blocking_web_request(1, Duration::from_secs(10)))
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    store.set(redirect("web", "web-v2"));

    let second = tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .expect("waiter should wake")
        .expect("task should not panic")
        .expect("get should succeed");

    assert_eq!(second.index(), 2);
    let chain = second.value().chain.as_ref().expect("chain should exist");
    assert_eq!(chain.start_node, "resolver:web-v2.default.dc1");

    let third = cache.get(web_request()).await.expect("get should succeed");
    assert!(third.was_cache_hit());
    assert_eq!(third.index(), 2);
}

#[tokio::test]
async fn test_blocking_timeout_keeps_cached_value() {
    let store = Arc::new(InMemoryConfigEntryStore::new());
    store.set(resolver("web"));
    let cache = BlockingCache::with_defaults(Arc::new(CompiledDiscoveryChainFetcher::new(
        store.clone(),
    )));

    let first = cache.get(web_request()).await.expect("get should succeed");
    let second = cache
        .get(blocking_web_request(1, Duration::from_millis(50)))
        .await
        .expect("get should succeed");

    assert_eq!(second.index(), 1);
    assert!(Arc::ptr_eq(&first.shared(), &second.shared()));
}

#[tokio::test]
async fn test_short_waiter_not_held_by_longer_waiter() {
    let store = Arc::new(InMemoryConfigEntryStore::new());
    store.set(resolver("web"));
    let cache = Arc::new(BlockingCache::with_defaults(Arc::new(
        CompiledDiscoveryChainFetcher::new(store.clone()),
    )));
    cache.get(web_request()).await.expect("get should succeed");

    let long = {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move {
            cache
                .get(blocking_web_request(1, Duration::from_secs(3)))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = std::time::Instant::now();
    let short = cache
        .get(blocking_web_request(1, Duration::from_millis(200)))
        .await
        .expect("get should succeed");

    assert!(
        started.elapsed() < Duration::from_secs(1),
        "short waiter took {:?}",
        started.elapsed()
    );
    assert_eq!(short.index(), 1);
    assert_eq!(short.source(), ReadSource::Fetch);

    // The long waiter still sees the next change.
    store.set(redirect("web", "web-v2"));
    let woke = tokio::time::timeout(Duration::from_secs(5), long)
        .await
        .expect("long waiter should wake")
        .expect("task should not panic")
        .expect("get should succeed");
    assert_eq!(woke.index(), 2);
}

#[test]
fn test_cache_key_shape() {
    let key = web_request()
        .cache_info()
        .key
        .expect("key should derive");
    assert_cache_key_shape(&key);
}

mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Every generated request derives a well-formed key.
        #[test]
        fn prop_every_request_has_a_key(req in arb_discovery_chain_request()) {
            let key = req.cache_key();
            prop_assert!(key.is_some());
            assert_cache_key_shape(&key.unwrap_or_default());
        }

        /// The key only depends on the evaluation triple.
        #[test]
        fn prop_key_ignores_query_options(
            req in arb_discovery_chain_request(),
            opts in arb_query_options(),
        ) {
            let varied = req.clone().with_query_options(opts);
            prop_assert_eq!(req.cache_key(), varied.cache_key());
        }
    }
}
