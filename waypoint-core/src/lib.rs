//! Waypoint Core - Data Types
//!
//! Routing config entries, blocking-query parameters, compiled discovery
//! chain types, configuration and errors. Every other crate depends on this.
//! This crate contains ONLY data types - no fetching, caching or compiling.

pub mod chain;
pub mod config;
pub mod config_entry;
pub mod error;
pub mod query;

pub use chain::{
    resolver_node_name, router_node_name, splitter_node_name, target_id, CompiledDiscoveryChain,
    DiscoveryGraphNode, DiscoveryResolver, DiscoveryRoute, DiscoveryRouter, DiscoverySplit,
    DiscoverySplitter, DiscoveryTarget, DEFAULT_CONNECT_TIMEOUT,
};
pub use config::QueryConfig;
pub use config_entry::{
    ConfigEntry, ConfigEntryKind, DiscoveryChainConfigEntries, ServiceResolverConfigEntry,
    ServiceResolverRedirect, ServiceRoute, ServiceRouteDestination, ServiceRouteMatch,
    ServiceRouterConfigEntry, ServiceSplit, ServiceSplitterConfigEntry,
};
pub use error::{
    CacheError, CompileError, ConfigError, TransportError, WaypointError, WaypointResult,
};
pub use query::{
    IndexedConfigEntries, QueryMeta, QueryOptions, RelatedConfigEntryQuery,
    CONFIG_ENTRY_LIST_RELATED,
};
