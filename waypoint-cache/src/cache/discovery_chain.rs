//! Compiled discovery chain cache type.
//!
//! Each fetch reads every config entry related to the requested service
//! (a blocking `ConfigEntry.ListRelated` read) and compiles them into the
//! service's discovery chain. The returned index is the read's index, so the
//! cache engine wakes waiters only when the underlying entries change.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use waypoint_chain::{ChainCompiler, CompileRequest, DiscoveryChainCompiler};
use waypoint_core::{
    CacheError, CompiledDiscoveryChain, DiscoveryChainConfigEntries, QueryMeta,
    RelatedConfigEntryQuery, WaypointResult,
};

use super::request::Request;
use super::traits::{CacheType, ConfigEntryRpc, FetchOptions, FetchResult};

/// Name the cache type is registered under.
pub const COMPILED_DISCOVERY_CHAIN_NAME: &str = "compiled-discovery-chain";

/// A compiled chain together with the entries and read metadata it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryChainResponse {
    pub config_entries: DiscoveryChainConfigEntries,
    /// `None` when the compiler found nothing to build.
    pub chain: Option<CompiledDiscoveryChain>,
    #[serde(flatten)]
    pub query_meta: QueryMeta,
}

/// Fetches and compiles discovery chains.
pub struct CompiledDiscoveryChainFetcher {
    rpc: Arc<dyn ConfigEntryRpc>,
    compiler: Arc<dyn ChainCompiler>,
}

impl CompiledDiscoveryChainFetcher {
    /// Create a fetcher that compiles with the reference compiler.
    pub fn new(rpc: Arc<dyn ConfigEntryRpc>) -> Self {
        Self {
            rpc,
            compiler: Arc::new(DiscoveryChainCompiler::new()),
        }
    }

    pub fn with_compiler(mut self, compiler: Arc<dyn ChainCompiler>) -> Self {
        self.compiler = compiler;
        self
    }
}

#[async_trait]
impl CacheType for CompiledDiscoveryChainFetcher {
    type Value = DiscoveryChainResponse;

    fn name(&self) -> &'static str {
        COMPILED_DISCOVERY_CHAIN_NAME
    }

    async fn fetch(
        &self,
        opts: FetchOptions,
        req: Request,
    ) -> WaypointResult<FetchResult<DiscoveryChainResponse>> {
        let req = match req {
            Request::DiscoveryChain(req) => req,
            other => {
                return Err(CacheError::RequestWrongType {
                    expected: "discovery-chain".to_string(),
                    got: other.kind().to_string(),
                }
                .into())
            }
        };

        let mut query_options = req.query_options;
        query_options.min_query_index = opts.min_index;
        query_options.max_query_time = opts.timeout;
        // Chains are always served from any replica.
        query_options.allow_stale = true;
        query_options.require_consistent = false;

        debug!(
            service = %req.service_name,
            datacenter = %req.datacenter,
            min_index = opts.min_index,
            "fetching related config entries"
        );

        let reply = self
            .rpc
            .list_related(RelatedConfigEntryQuery {
                service_name: req.service_name.clone(),
                datacenter: req.datacenter,
                query_options,
            })
            .await?;

        let compile_req = CompileRequest {
            service_name: req.service_name,
            current_namespace: req.evaluate_in_namespace,
            current_datacenter: req.evaluate_in_datacenter,
            infer_defaults: true,
            entries: DiscoveryChainConfigEntries::from_entries(reply.entries),
        };
        let chain = self.compiler.compile(&compile_req)?;

        let index = reply.query_meta.index;
        debug!(
            service = %compile_req.service_name,
            index,
            found = chain.is_some(),
            "compiled discovery chain"
        );

        Ok(FetchResult::new(
            DiscoveryChainResponse {
                config_entries: compile_req.entries,
                chain,
                query_meta: reply.query_meta,
            },
            index,
        ))
    }

    fn supports_blocking(&self) -> bool {
        true
    }
}
