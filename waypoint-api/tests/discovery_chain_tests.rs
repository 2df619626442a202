//! HTTP tests for the discovery chain routes, driven through the router with
//! `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::Value;
use tower::ServiceExt;
use waypoint_api::{create_router, AppState};
use waypoint_cache::{CacheConfig, InMemoryConfigEntryStore};
use waypoint_core::CompileError;
use waypoint_test_utils::fixtures::*;
use waypoint_test_utils::{default_chain, RecordingCompiler, RecordingRpc};

fn app_with_rpc(rpc: Arc<RecordingRpc>) -> Router {
    create_router(AppState::new(rpc, "dc1"))
}

async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    app.oneshot(request).await.expect("router is infallible")
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should read");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

#[tokio::test]
async fn test_internal_route_returns_chain_and_meta_headers() {
    let rpc = Arc::new(RecordingRpc::answering(vec![], 48));
    let response = get(app_with_rpc(rpc.clone()), "/v1/internal/discovery-chain/web").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-waypoint-index"], "48");
    assert_eq!(response.headers()["x-waypoint-knownleader"], "true");
    assert_eq!(response.headers()["x-waypoint-lastcontact"], "0");

    let body = json_body(response).await;
    let expected = serde_json::to_value(default_chain("web", "default", "dc1"))
        .expect("chain should serialize");
    assert_eq!(body, expected);

    let query = rpc.last_query().expect("one read should be recorded");
    assert_eq!(query.service_name, "web");
    assert_eq!(query.datacenter, "dc1");
}

#[tokio::test]
async fn test_internal_route_passes_query_params_to_read() {
    let rpc = Arc::new(RecordingRpc::answering(vec![], 7));
    let response = get(
        app_with_rpc(rpc.clone()),
        "/v1/internal/discovery-chain/web?dc=dc2&stale&index=5&wait=2s",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let query = rpc.last_query().expect("one read should be recorded");
    assert_eq!(query.datacenter, "dc2");
    assert!(query.query_options.allow_stale);
    assert_eq!(query.query_options.min_query_index, 5);
    assert_eq!(
        query.query_options.max_query_time,
        std::time::Duration::from_secs(2)
    );

    // Evaluation stays in the server's own datacenter.
    let body = json_body(response).await;
    assert_eq!(body["datacenter"], "dc1");
}

#[tokio::test]
async fn test_missing_chain_name_is_bad_request() {
    for uri in ["/v1/internal/discovery-chain", "/v1/internal/discovery-chain/"] {
        let rpc = Arc::new(RecordingRpc::answering(vec![], 1));
        let response = get(app_with_rpc(rpc.clone()), uri).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Missing chain name");
        assert_eq!(rpc.call_count(), 0);
    }
}

#[tokio::test]
async fn test_conflicting_consistency_is_bad_request() {
    let rpc = Arc::new(RecordingRpc::answering(vec![], 1));
    let response = get(
        app_with_rpc(rpc.clone()),
        "/v1/internal/discovery-chain/web?stale&consistent",
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(rpc.call_count(), 0);
}

#[tokio::test]
async fn test_malformed_wait_is_bad_request() {
    let rpc = Arc::new(RecordingRpc::answering(vec![], 1));
    let response = get(
        app_with_rpc(rpc.clone()),
        "/v1/internal/discovery-chain/web?wait=forever",
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "INVALID_FORMAT");
}

#[tokio::test]
async fn test_no_chain_is_not_found() {
    let rpc = Arc::new(RecordingRpc::answering(vec![], 3));
    let compiler = Arc::new(RecordingCompiler::returning(Ok(None)));
    let state = AppState::build(rpc, compiler, "dc1", CacheConfig::default());

    let response = get(create_router(state), "/v1/internal/discovery-chain/web").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["x-waypoint-index"], "3");
}

#[tokio::test]
async fn test_read_failure_is_server_error() {
    let rpc = Arc::new(RecordingRpc::failing(unavailable()));
    let response = get(app_with_rpc(rpc), "/v1/internal/discovery-chain/web").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["code"], "REMOTE_READ_FAILED");
    assert_eq!(body["message"], unavailable().to_string());
}

#[tokio::test]
async fn test_compile_failure_is_server_error_with_headers() {
    let rpc = Arc::new(RecordingRpc::answering(vec![], 9));
    let compiler = Arc::new(RecordingCompiler::returning(Err(
        CompileError::MissingResolver {
            service: "web".to_string(),
        },
    )));
    let state = AppState::build(rpc, compiler, "dc1", CacheConfig::default());

    let response = get(create_router(state), "/v1/internal/discovery-chain/web").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()["x-waypoint-index"], "9");
    let body = json_body(response).await;
    assert_eq!(body["code"], "COMPILE_FAILED");
}

#[tokio::test]
async fn test_internal_route_reads_store() {
    let store = Arc::new(InMemoryConfigEntryStore::new());
    store.replace_all(canary_entries());
    let app = create_router(AppState::new(store, "dc1"));

    let response = get(app, "/v1/internal/discovery-chain/web").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-waypoint-index"], "1");
    let body = json_body(response).await;
    assert_eq!(body["start_node"], "router:web");
    assert_eq!(body["nodes"]["splitter:web"]["type"], "splitter");
}

#[tokio::test]
async fn test_cached_route_serves_second_read_from_cache() {
    let rpc = Arc::new(RecordingRpc::answering(vec![resolver("web")], 12));
    let app = app_with_rpc(rpc.clone());

    let first = get(app.clone(), "/v1/discovery-chain/web").await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers()["x-cache"], "MISS");
    assert_eq!(first.headers()["x-waypoint-index"], "12");

    let second = get(app, "/v1/discovery-chain/web").await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(second.headers()["x-cache"], "HIT");
    assert!(second.headers().contains_key("age"));
    assert_eq!(rpc.call_count(), 1);

    let body = json_body(second).await;
    assert_eq!(body["service_name"], "web");
}

#[tokio::test]
async fn test_cached_route_surfaces_read_failure() {
    let rpc = Arc::new(RecordingRpc::failing(unavailable()));
    let response = get(app_with_rpc(rpc), "/v1/discovery-chain/web").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_health_routes() {
    let rpc = Arc::new(RecordingRpc::answering(vec![], 1));

    let ping = get(app_with_rpc(rpc.clone()), "/health/ping").await;
    assert_eq!(ping.status(), StatusCode::OK);
    assert_eq!(json_body(ping).await["status"], "healthy");

    let live = get(app_with_rpc(rpc), "/health/live").await;
    assert_eq!(live.status(), StatusCode::OK);
    let body = json_body(live).await;
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["uptime_seconds"].is_u64());
}
