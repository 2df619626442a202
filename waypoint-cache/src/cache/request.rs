//! Cache requests and cache-key derivation.
//!
//! Every request handed to the cache engine describes itself through
//! [`CacheRequest::cache_info`]. The key in that info is a fingerprint of the
//! fields that change the *meaning* of the request; per-call fields (token,
//! deadlines, indexes) never enter it.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::warn;
use waypoint_core::QueryOptions;

/// Format version of the serialized key material. Part of the hashed bytes,
/// so changing the key fields never collides with keys derived before.
const CACHE_KEY_VERSION: u32 = 1;

/// What the cache engine needs to know about any request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestInfo {
    pub token: String,
    /// Cache key. `None` means the request must bypass the cache.
    pub key: Option<String>,
    pub datacenter: String,
    pub min_index: u64,
    pub timeout: Duration,
    pub max_age: Duration,
    pub must_revalidate: bool,
}

impl RequestInfo {
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_min_index(mut self, index: u64) -> Self {
        self.min_index = index;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Implemented by every request a cache type accepts.
pub trait CacheRequest {
    fn cache_info(&self) -> RequestInfo;
}

// ============================================================================
// DISCOVERY CHAIN REQUEST
// ============================================================================

/// Request for the compiled discovery chain of one service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiscoveryChainRequest {
    pub service_name: String,
    /// Datacenter the chain is evaluated as seen from.
    pub evaluate_in_datacenter: String,
    /// Namespace the chain is evaluated as seen from.
    pub evaluate_in_namespace: String,
    /// Datacenter that services the read.
    pub datacenter: String,
    #[serde(flatten)]
    pub query_options: QueryOptions,
}

impl DiscoveryChainRequest {
    /// A request evaluated in the `default` namespace of the datacenter that
    /// services the read.
    pub fn new(service_name: impl Into<String>, datacenter: impl Into<String>) -> Self {
        let datacenter = datacenter.into();
        Self {
            service_name: service_name.into(),
            evaluate_in_datacenter: datacenter.clone(),
            evaluate_in_namespace: "default".to_string(),
            datacenter,
            query_options: QueryOptions::default(),
        }
    }

    pub fn with_evaluate_in(
        mut self,
        datacenter: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        self.evaluate_in_datacenter = datacenter.into();
        self.evaluate_in_namespace = namespace.into();
        self
    }

    pub fn with_query_options(mut self, query_options: QueryOptions) -> Self {
        self.query_options = query_options;
        self
    }

    /// Stable fingerprint of `{service_name, evaluate_in_datacenter,
    /// evaluate_in_namespace}`: 64 lowercase hex characters.
    ///
    /// Returns `None` when the key material can't be serialized; the caller
    /// then skips the cache for this request.
    pub fn cache_key(&self) -> Option<String> {
        let material = KeyMaterial {
            version: CACHE_KEY_VERSION,
            service_name: &self.service_name,
            evaluate_in_datacenter: &self.evaluate_in_datacenter,
            evaluate_in_namespace: &self.evaluate_in_namespace,
        };

        match fingerprint(&material) {
            Ok(key) => Some(key),
            Err(err) => {
                warn!(
                    service = %self.service_name,
                    error = %err,
                    "failed to derive cache key, bypassing cache"
                );
                None
            }
        }
    }
}

impl CacheRequest for DiscoveryChainRequest {
    fn cache_info(&self) -> RequestInfo {
        RequestInfo {
            token: self.query_options.token.clone(),
            key: self.cache_key(),
            datacenter: self.datacenter.clone(),
            min_index: self.query_options.min_query_index,
            timeout: self.query_options.max_query_time,
            max_age: self.query_options.max_age,
            must_revalidate: self.query_options.must_revalidate,
        }
    }
}

#[derive(Serialize)]
struct KeyMaterial<'a> {
    version: u32,
    service_name: &'a str,
    evaluate_in_datacenter: &'a str,
    evaluate_in_namespace: &'a str,
}

fn fingerprint<T: Serialize>(material: &T) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(material)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

// ============================================================================
// REQUEST
// ============================================================================

/// The closed set of requests the cache engine hands to cache types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    DiscoveryChain(DiscoveryChainRequest),
    /// A request fully described by its info.
    Info(RequestInfo),
}

impl Request {
    pub fn kind(&self) -> &'static str {
        match self {
            Request::DiscoveryChain(_) => "discovery-chain",
            Request::Info(_) => "info",
        }
    }
}

impl CacheRequest for Request {
    fn cache_info(&self) -> RequestInfo {
        match self {
            Request::DiscoveryChain(req) => req.cache_info(),
            Request::Info(info) => info.clone(),
        }
    }
}

impl From<DiscoveryChainRequest> for Request {
    fn from(req: DiscoveryChainRequest) -> Self {
        Request::DiscoveryChain(req)
    }
}

impl From<RequestInfo> for Request {
    fn from(info: RequestInfo) -> Self {
        Request::Info(info)
    }
}
