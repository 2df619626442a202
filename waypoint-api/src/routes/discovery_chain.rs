//! Discovery chain routes.
//!
//! - `GET /v1/internal/discovery-chain/:name` reads the related config
//!   entries and compiles them on every request, uncached.
//! - `GET /v1/discovery-chain/:name` serves the same chain through the
//!   blocking cache.
//!
//! Both accept `?dc`, `?index` and `?wait`. Read metadata is returned in the
//! `X-Waypoint-Index`, `X-Waypoint-KnownLeader` and `X-Waypoint-LastContact`
//! headers.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use waypoint_cache::DiscoveryChainRequest;
use waypoint_chain::CompileRequest;
use waypoint_core::{
    DiscoveryChainConfigEntries, QueryMeta, QueryOptions, RelatedConfigEntryQuery,
};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub const INDEX_HEADER: &str = "x-waypoint-index";
pub const KNOWN_LEADER_HEADER: &str = "x-waypoint-knownleader";
pub const LAST_CONTACT_HEADER: &str = "x-waypoint-lastcontact";
pub const CACHE_HEADER: &str = "x-cache";

/// Namespace chains are evaluated in.
const EVALUATE_IN_NAMESPACE: &str = "default";

// ============================================================================
// QUERY PARAMETERS
// ============================================================================

/// Query string accepted by the discovery chain routes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChainQueryParams {
    /// Datacenter that services the read.
    pub dc: Option<String>,
    /// Present (`?stale`) to allow any server to answer.
    pub stale: Option<String>,
    /// Present (`?consistent`) to require a leader-verified read.
    pub consistent: Option<String>,
    /// Block until the entries move past this index.
    pub index: Option<u64>,
    /// Upper bound on the block, e.g. `500ms`, `10s`, `5m`.
    pub wait: Option<String>,
}

impl ChainQueryParams {
    pub fn query_options(&self) -> ApiResult<QueryOptions> {
        if self.stale.is_some() && self.consistent.is_some() {
            return Err(ApiError::invalid_input(
                "Cannot specify ?stale with ?consistent, conflicting semantics.",
            ));
        }

        let mut opts = QueryOptions::new().with_allow_stale(self.stale.is_some());
        opts.require_consistent = self.consistent.is_some();
        if let Some(index) = self.index {
            opts = opts.with_min_index(index);
        }
        if let Some(raw) = &self.wait {
            let wait = parse_wait(raw)
                .ok_or_else(|| ApiError::invalid_format("wait", "a duration such as 10s"))?;
            opts = opts.with_max_query_time(wait);
        }
        Ok(opts)
    }

    /// Datacenter to read from, falling back to `local`.
    pub fn datacenter(&self, local: &str) -> String {
        self.dc
            .as_deref()
            .map(str::trim)
            .filter(|dc| !dc.is_empty())
            .unwrap_or(local)
            .to_string()
    }
}

/// Parse a wait of the form `<digits><unit>` with unit `ms`, `s`, `m` or `h`.
pub fn parse_wait(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let split = raw.find(|c: char| !c.is_ascii_digit())?;
    let (digits, unit) = raw.split_at(split);
    let value: u64 = digits.parse().ok()?;
    match unit {
        "ms" => Some(Duration::from_millis(value)),
        "s" => Some(Duration::from_secs(value)),
        "m" => value.checked_mul(60).map(Duration::from_secs),
        "h" => value.checked_mul(3600).map(Duration::from_secs),
        _ => None,
    }
}

fn required_name(name: String) -> ApiResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::missing_chain_name());
    }
    Ok(name.to_string())
}

/// Read metadata as response headers.
pub fn meta_headers(meta: &QueryMeta) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static(INDEX_HEADER),
        HeaderValue::from(meta.index),
    );
    headers.insert(
        HeaderName::from_static(KNOWN_LEADER_HEADER),
        HeaderValue::from_static(if meta.known_leader { "true" } else { "false" }),
    );
    let last_contact_ms = u64::try_from(meta.last_contact.as_millis()).unwrap_or(u64::MAX);
    headers.insert(
        HeaderName::from_static(LAST_CONTACT_HEADER),
        HeaderValue::from(last_contact_ms),
    );
    headers
}

// ============================================================================
// HANDLERS
// ============================================================================

/// `GET /v1/internal/discovery-chain` with no service name.
pub async fn missing_chain_name() -> ApiError {
    ApiError::missing_chain_name()
}

/// `GET /v1/internal/discovery-chain/:name`
pub async fn get_internal_discovery_chain(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<ChainQueryParams>,
) -> ApiResult<Response> {
    let name = required_name(name)?;
    let query = RelatedConfigEntryQuery {
        service_name: name.clone(),
        datacenter: params.datacenter(&state.datacenter),
        query_options: params.query_options()?,
    };
    debug!(
        service = %name,
        datacenter = %query.datacenter,
        min_index = query.query_options.min_query_index,
        "reading discovery chain entries"
    );

    let reply = state.rpc.list_related(query).await?;
    let headers = meta_headers(&reply.query_meta);

    let compile_req = CompileRequest {
        service_name: name.clone(),
        current_namespace: EVALUATE_IN_NAMESPACE.to_string(),
        current_datacenter: state.datacenter.clone(),
        infer_defaults: true,
        entries: DiscoveryChainConfigEntries::from_entries(reply.entries),
    };

    let response = match state.compiler.compile(&compile_req) {
        Ok(Some(chain)) => (headers, Json(chain)).into_response(),
        Ok(None) => (headers, ApiError::chain_not_found(&name)).into_response(),
        Err(err) => (headers, ApiError::from(err)).into_response(),
    };
    Ok(response)
}

/// `GET /v1/discovery-chain/:name`
///
/// Adds `X-Cache: HIT|MISS` and `Age` (seconds since the value was last
/// confirmed) to the read metadata headers.
pub async fn get_cached_discovery_chain(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<ChainQueryParams>,
) -> ApiResult<Response> {
    let name = required_name(name)?;
    let req = DiscoveryChainRequest::new(name.clone(), params.datacenter(&state.datacenter))
        .with_evaluate_in(state.datacenter.clone(), EVALUATE_IN_NAMESPACE)
        .with_query_options(params.query_options()?);

    let read = state.cache.get(req).await?;
    let value = read.value();

    let mut headers = meta_headers(&value.query_meta);
    headers.insert(
        HeaderName::from_static(INDEX_HEADER),
        HeaderValue::from(read.index()),
    );
    headers.insert(
        HeaderName::from_static(CACHE_HEADER),
        HeaderValue::from_static(if read.was_cache_hit() { "HIT" } else { "MISS" }),
    );
    headers.insert(header::AGE, HeaderValue::from(read.staleness().as_secs()));

    let response = match &value.chain {
        Some(chain) => (headers, Json(chain)).into_response(),
        None => (headers, ApiError::chain_not_found(&name)).into_response(),
    };
    Ok(response)
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_wait_seconds_parse(secs in 0u32..100_000) {
            prop_assert_eq!(
                parse_wait(&format!("{}s", secs)),
                Some(Duration::from_secs(u64::from(secs)))
            );
        }

        #[test]
        fn prop_wait_without_unit_rejected(value in 0u64..u64::MAX) {
            prop_assert_eq!(parse_wait(&value.to_string()), None);
        }
    }
}
