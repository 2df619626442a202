//! Discovery Chain Compiler - Transform Config Entries to a Routing Graph
//!
//! This module takes the raw routing config entries related to a service and
//! compiles them into a [`CompiledDiscoveryChain`]. It validates the semantic
//! rules that can't be checked when an entry is written in isolation (split
//! weights, redirect loops).
//!
//! # Pipeline
//!
//! ```text
//! ListRelated → DiscoveryChainConfigEntries → Compiler → CompiledDiscoveryChain
//!                                               ↓
//!                                      router → splitter → resolver
//! ```
//!
//! Compilation is pure: the output depends only on the request.

use std::collections::BTreeMap;

use waypoint_core::{
    resolver_node_name, router_node_name, splitter_node_name, CompileError,
    CompiledDiscoveryChain, DiscoveryChainConfigEntries, DiscoveryGraphNode, DiscoveryResolver,
    DiscoveryRoute, DiscoveryRouter, DiscoverySplit, DiscoverySplitter, DiscoveryTarget,
    ServiceRouterConfigEntry, ServiceSplitterConfigEntry, DEFAULT_CONNECT_TIMEOUT,
};

pub type CompileResult<T> = Result<T, CompileError>;

/// Path prefix of the catch-all route appended to every router.
const CATCH_ALL_PREFIX: &str = "/";

/// Allowed drift when checking that split weights sum to 100.
const SPLIT_WEIGHT_TOLERANCE: f32 = 0.01;

// ============================================================================
// COMPILE REQUEST
// ============================================================================

/// Everything the compiler needs to build a chain.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompileRequest {
    pub service_name: String,
    pub current_namespace: String,
    pub current_datacenter: String,
    /// Synthesize a default resolver for services with no resolver entry
    /// instead of failing.
    pub infer_defaults: bool,
    pub entries: DiscoveryChainConfigEntries,
}

/// Contract between a fetcher and the chain compiler.
///
/// Returns `Ok(None)` when there is nothing to compile for the service
/// ("not found"), which callers must keep distinct from an error.
pub trait ChainCompiler: Send + Sync {
    fn compile(&self, req: &CompileRequest) -> CompileResult<Option<CompiledDiscoveryChain>>;
}

/// The reference compiler for router/splitter/resolver entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscoveryChainCompiler;

impl DiscoveryChainCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl ChainCompiler for DiscoveryChainCompiler {
    fn compile(&self, req: &CompileRequest) -> CompileResult<Option<CompiledDiscoveryChain>> {
        compile(req)
    }
}

/// Compile the chain for `req.service_name`.
pub fn compile(req: &CompileRequest) -> CompileResult<Option<CompiledDiscoveryChain>> {
    require_field("service_name", &req.service_name)?;
    require_field("current_namespace", &req.current_namespace)?;
    require_field("current_datacenter", &req.current_datacenter)?;

    if !req.infer_defaults && !req.entries.mentions(&req.service_name) {
        return Ok(None);
    }

    let mut builder = ChainBuilder::new(req);
    let start_node = builder.assemble(&req.service_name)?;

    Ok(Some(CompiledDiscoveryChain {
        service_name: req.service_name.clone(),
        namespace: req.current_namespace.clone(),
        datacenter: req.current_datacenter.clone(),
        start_node,
        nodes: builder.nodes,
        targets: builder.targets,
    }))
}

/// The chain compiled for a service with no config entries at all: a single
/// resolver pointing at the service itself.
pub fn default_chain(service: &str, namespace: &str, datacenter: &str) -> CompiledDiscoveryChain {
    let target = DiscoveryTarget::new(service, namespace, datacenter);
    let node_name = resolver_node_name(&target.id);

    let mut nodes = BTreeMap::new();
    nodes.insert(
        node_name.clone(),
        DiscoveryGraphNode::Resolver(DiscoveryResolver {
            name: node_name.clone(),
            default: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            target: target.id.clone(),
        }),
    );
    let mut targets = BTreeMap::new();
    targets.insert(target.id.clone(), target);

    CompiledDiscoveryChain {
        service_name: service.to_string(),
        namespace: namespace.to_string(),
        datacenter: datacenter.to_string(),
        start_node: node_name,
        nodes,
        targets,
    }
}

fn require_field(field: &str, value: &str) -> CompileResult<()> {
    if value.is_empty() {
        return Err(CompileError::MissingField {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

// ============================================================================
// CHAIN BUILDER
// ============================================================================

struct ChainBuilder<'a> {
    req: &'a CompileRequest,
    nodes: BTreeMap<String, DiscoveryGraphNode>,
    targets: BTreeMap<String, DiscoveryTarget>,
}

impl<'a> ChainBuilder<'a> {
    fn new(req: &'a CompileRequest) -> Self {
        Self {
            req,
            nodes: BTreeMap::new(),
            targets: BTreeMap::new(),
        }
    }

    fn entries(&self) -> &'a DiscoveryChainConfigEntries {
        &self.req.entries
    }

    /// Build the graph rooted at `service` and return the start node name.
    fn assemble(&mut self, service: &str) -> CompileResult<String> {
        match self.entries().get_router(service) {
            Some(router) => self.router_node(router),
            None => self.splitter_or_resolver_node(service),
        }
    }

    fn router_node(&mut self, router: &ServiceRouterConfigEntry) -> CompileResult<String> {
        let name = router_node_name(&router.name);

        let mut routes = Vec::with_capacity(router.routes.len() + 1);
        for route in &router.routes {
            let destination = route
                .destination
                .as_ref()
                .and_then(|d| non_empty(d.service.as_ref()))
                .unwrap_or(router.name.as_str());
            let path_prefix = route
                .route_match
                .as_ref()
                .and_then(|m| non_empty(m.path_prefix.as_ref()))
                .unwrap_or(CATCH_ALL_PREFIX);

            let next_node = self.splitter_or_resolver_node(destination)?;
            routes.push(DiscoveryRoute {
                path_prefix: path_prefix.to_string(),
                next_node,
            });
        }

        let next_node = self.splitter_or_resolver_node(&router.name)?;
        routes.push(DiscoveryRoute {
            path_prefix: CATCH_ALL_PREFIX.to_string(),
            next_node,
        });

        self.nodes.insert(
            name.clone(),
            DiscoveryGraphNode::Router(DiscoveryRouter {
                name: name.clone(),
                routes,
            }),
        );
        Ok(name)
    }

    fn splitter_or_resolver_node(&mut self, service: &str) -> CompileResult<String> {
        match self.entries().get_splitter(service) {
            Some(splitter) => self.splitter_node(splitter),
            None => {
                let datacenter = self.req.current_datacenter.clone();
                self.resolver_node(service, &datacenter)
            }
        }
    }

    fn splitter_node(&mut self, splitter: &ServiceSplitterConfigEntry) -> CompileResult<String> {
        let name = splitter_node_name(&splitter.name);
        if self.nodes.contains_key(&name) {
            return Ok(name);
        }

        let total: f32 = splitter.splits.iter().map(|s| s.weight).sum();
        let weight_out_of_range = splitter
            .splits
            .iter()
            .any(|s| !(0.0..=100.0).contains(&s.weight));
        if weight_out_of_range || (total - 100.0).abs() > SPLIT_WEIGHT_TOLERANCE {
            return Err(CompileError::InvalidSplitWeights {
                service: splitter.name.clone(),
                total: format!("{:.2}", total),
            });
        }

        let datacenter = self.req.current_datacenter.clone();
        let mut splits = Vec::with_capacity(splitter.splits.len());
        for split in splitter.splits.iter().filter(|s| s.weight > 0.0) {
            let service = non_empty(split.service.as_ref()).unwrap_or(splitter.name.as_str());
            let next_node = self.resolver_node(service, &datacenter)?;
            splits.push(DiscoverySplit {
                weight: split.weight,
                next_node,
            });
        }

        self.nodes.insert(
            name.clone(),
            DiscoveryGraphNode::Splitter(DiscoverySplitter {
                name: name.clone(),
                splits,
            }),
        );
        Ok(name)
    }

    /// Follow resolver redirects starting at `service` in `datacenter` until a
    /// terminal resolver is found.
    fn resolver_node(&mut self, service: &str, datacenter: &str) -> CompileResult<String> {
        let namespace = self.req.current_namespace.as_str();
        let mut service = service.to_string();
        let mut datacenter = datacenter.to_string();
        let mut visited: Vec<String> = Vec::new();

        loop {
            let id = waypoint_core::target_id(&service, namespace, &datacenter);
            if visited.contains(&id) {
                visited.push(id);
                return Err(CompileError::CircularRedirect { chain: visited });
            }
            visited.push(id);

            let Some(resolver) = self.entries().get_resolver(&service) else {
                if !self.req.infer_defaults {
                    return Err(CompileError::MissingResolver { service });
                }
                return Ok(self.insert_resolver(&service, &datacenter, true, DEFAULT_CONNECT_TIMEOUT));
            };

            if let Some(redirect) = &resolver.redirect {
                let next_service = non_empty(redirect.service.as_ref())
                    .unwrap_or(service.as_str())
                    .to_string();
                let next_datacenter = non_empty(redirect.datacenter.as_ref())
                    .unwrap_or(datacenter.as_str())
                    .to_string();
                if next_service != service || next_datacenter != datacenter {
                    service = next_service;
                    datacenter = next_datacenter;
                    continue;
                }
            }

            let connect_timeout = resolver.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
            return Ok(self.insert_resolver(&service, &datacenter, false, connect_timeout));
        }
    }

    fn insert_resolver(
        &mut self,
        service: &str,
        datacenter: &str,
        default: bool,
        connect_timeout: std::time::Duration,
    ) -> String {
        let target = DiscoveryTarget::new(service, &self.req.current_namespace, datacenter);
        let name = resolver_node_name(&target.id);

        self.nodes.insert(
            name.clone(),
            DiscoveryGraphNode::Resolver(DiscoveryResolver {
                name: name.clone(),
                default,
                connect_timeout,
                target: target.id.clone(),
            }),
        );
        self.targets.insert(target.id.clone(), target);
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waypoint_core::{ConfigEntry, ServiceResolverConfigEntry, ServiceResolverRedirect};

    fn request(service: &str, entries: Vec<ConfigEntry>) -> CompileRequest {
        CompileRequest {
            service_name: service.to_string(),
            current_namespace: "default".to_string(),
            current_datacenter: "dc1".to_string(),
            infer_defaults: true,
            entries: DiscoveryChainConfigEntries::from_entries(entries),
        }
    }

    #[test]
    fn test_empty_entries_compile_to_default_chain() {
        let chain = compile(&request("web", vec![]))
            .expect("compile should succeed")
            .expect("chain should exist");
        assert_eq!(chain, default_chain("web", "default", "dc1"));
        assert!(chain.is_default());
    }

    #[test]
    fn test_missing_service_name() {
        let err = compile(&request("", vec![])).unwrap_err();
        assert_eq!(
            err,
            CompileError::MissingField {
                field: "service_name".to_string()
            }
        );
    }

    #[test]
    fn test_not_found_without_inferred_defaults() {
        let mut req = request("web", vec![]);
        req.infer_defaults = false;
        assert_eq!(compile(&req).expect("compile should succeed"), None);
    }

    #[test]
    fn test_redirect_datacenter_only() {
        let req = request(
            "web",
            vec![ConfigEntry::ServiceResolver(ServiceResolverConfigEntry {
                name: "web".to_string(),
                connect_timeout: None,
                redirect: Some(ServiceResolverRedirect {
                    service: None,
                    datacenter: Some("dc2".to_string()),
                }),
            })],
        );
        let chain = compile(&req)
            .expect("compile should succeed")
            .expect("chain should exist");
        assert_eq!(chain.start_node, "resolver:web.default.dc2");
        assert!(chain.targets.contains_key("web.default.dc2"));
        assert!(!chain.is_default());
    }
}
