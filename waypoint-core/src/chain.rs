//! Compiled discovery chain types.
//!
//! A discovery chain is the routing graph for one service as seen from one
//! namespace and datacenter. It is produced by the compiler and is immutable
//! once built.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Connect timeout used by synthesized resolvers.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Identifier of a concrete upstream: `<service>.<namespace>.<datacenter>`.
pub fn target_id(service: &str, namespace: &str, datacenter: &str) -> String {
    format!("{}.{}.{}", service, namespace, datacenter)
}

pub fn router_node_name(service: &str) -> String {
    format!("router:{}", service)
}

pub fn splitter_node_name(service: &str) -> String {
    format!("splitter:{}", service)
}

pub fn resolver_node_name(target_id: &str) -> String {
    format!("resolver:{}", target_id)
}

/// The compiled routing graph for a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledDiscoveryChain {
    pub service_name: String,
    pub namespace: String,
    pub datacenter: String,
    /// Name of the first node traffic enters.
    pub start_node: String,
    pub nodes: BTreeMap<String, DiscoveryGraphNode>,
    pub targets: BTreeMap<String, DiscoveryTarget>,
}

impl CompiledDiscoveryChain {
    pub fn start(&self) -> Option<&DiscoveryGraphNode> {
        self.nodes.get(&self.start_node)
    }

    /// True when the chain is the synthesized single-resolver default.
    pub fn is_default(&self) -> bool {
        self.nodes.len() == 1
            && matches!(
                self.start(),
                Some(DiscoveryGraphNode::Resolver(r)) if r.default
            )
    }
}

/// A node in the routing graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscoveryGraphNode {
    Router(DiscoveryRouter),
    Splitter(DiscoverySplitter),
    Resolver(DiscoveryResolver),
}

impl DiscoveryGraphNode {
    pub fn name(&self) -> &str {
        match self {
            DiscoveryGraphNode::Router(n) => &n.name,
            DiscoveryGraphNode::Splitter(n) => &n.name,
            DiscoveryGraphNode::Resolver(n) => &n.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryRouter {
    pub name: String,
    pub routes: Vec<DiscoveryRoute>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryRoute {
    pub path_prefix: String,
    pub next_node: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoverySplitter {
    pub name: String,
    pub splits: Vec<DiscoverySplit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoverySplit {
    pub weight: f32,
    pub next_node: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryResolver {
    pub name: String,
    /// Synthesized because no resolver entry existed.
    pub default: bool,
    pub connect_timeout: Duration,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryTarget {
    pub id: String,
    pub service: String,
    pub namespace: String,
    pub datacenter: String,
}

impl DiscoveryTarget {
    pub fn new(service: &str, namespace: &str, datacenter: &str) -> Self {
        Self {
            id: target_id(service, namespace, datacenter),
            service: service.to_string(),
            namespace: namespace.to_string(),
            datacenter: datacenter.to_string(),
        }
    }
}
