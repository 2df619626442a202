//! Routing config entries and the canonical container the compiler consumes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Kind discriminator for config entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigEntryKind {
    ServiceRouter,
    ServiceSplitter,
    ServiceResolver,
}

impl ConfigEntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigEntryKind::ServiceRouter => "service-router",
            ConfigEntryKind::ServiceSplitter => "service-splitter",
            ConfigEntryKind::ServiceResolver => "service-resolver",
        }
    }
}

/// A raw configuration object as stored by the remote server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ConfigEntry {
    ServiceRouter(ServiceRouterConfigEntry),
    ServiceSplitter(ServiceSplitterConfigEntry),
    ServiceResolver(ServiceResolverConfigEntry),
}

impl ConfigEntry {
    pub fn kind(&self) -> ConfigEntryKind {
        match self {
            ConfigEntry::ServiceRouter(_) => ConfigEntryKind::ServiceRouter,
            ConfigEntry::ServiceSplitter(_) => ConfigEntryKind::ServiceSplitter,
            ConfigEntry::ServiceResolver(_) => ConfigEntryKind::ServiceResolver,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ConfigEntry::ServiceRouter(e) => &e.name,
            ConfigEntry::ServiceSplitter(e) => &e.name,
            ConfigEntry::ServiceResolver(e) => &e.name,
        }
    }

    /// Services this entry points at, other than its own.
    ///
    /// Used to compute the transitive set of entries related to a service.
    pub fn referenced_services(&self) -> Vec<&str> {
        let own = self.name();
        let mut out: Vec<&str> = match self {
            ConfigEntry::ServiceRouter(e) => e
                .routes
                .iter()
                .filter_map(|r| r.destination.as_ref()?.service.as_deref())
                .collect(),
            ConfigEntry::ServiceSplitter(e) => {
                e.splits.iter().filter_map(|s| s.service.as_deref()).collect()
            }
            ConfigEntry::ServiceResolver(e) => e
                .redirect
                .as_ref()
                .and_then(|r| r.service.as_deref())
                .into_iter()
                .collect(),
        };
        out.retain(|s| !s.is_empty() && *s != own);
        out.sort_unstable();
        out.dedup();
        out
    }
}

/// Layer 7 routes for a service, matched in order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceRouterConfigEntry {
    pub name: String,
    #[serde(default)]
    pub routes: Vec<ServiceRoute>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceRoute {
    #[serde(default, rename = "match", skip_serializing_if = "Option::is_none")]
    pub route_match: Option<ServiceRouteMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<ServiceRouteDestination>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceRouteMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceRouteDestination {
    /// Destination service; defaults to the router's own service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

/// Weighted traffic split for a service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServiceSplitterConfigEntry {
    pub name: String,
    #[serde(default)]
    pub splits: Vec<ServiceSplit>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServiceSplit {
    /// Percentage of traffic, 0.0 to 100.0.
    pub weight: f32,
    /// Target service; defaults to the splitter's own service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

/// How instances of a service are resolved.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceResolverConfigEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<ServiceResolverRedirect>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceResolverRedirect {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datacenter: Option<String>,
}

/// Canonical container of the entries a discovery chain is compiled from.
///
/// Entries are keyed by name inside ordered maps, so two containers built
/// from the same entries in a different order compare equal. An empty
/// container is a valid input meaning "no configuration".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DiscoveryChainConfigEntries {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub routers: BTreeMap<String, ServiceRouterConfigEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub splitters: BTreeMap<String, ServiceSplitterConfigEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resolvers: BTreeMap<String, ServiceResolverConfigEntry>,
}

impl DiscoveryChainConfigEntries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a container from a list of entries. Later entries with the same
    /// kind and name replace earlier ones.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = ConfigEntry>,
    {
        let mut out = Self::new();
        out.add_entries(entries);
        out
    }

    pub fn add_entries<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = ConfigEntry>,
    {
        for entry in entries {
            self.add_entry(entry);
        }
    }

    pub fn add_entry(&mut self, entry: ConfigEntry) {
        match entry {
            ConfigEntry::ServiceRouter(e) => {
                self.routers.insert(e.name.clone(), e);
            }
            ConfigEntry::ServiceSplitter(e) => {
                self.splitters.insert(e.name.clone(), e);
            }
            ConfigEntry::ServiceResolver(e) => {
                self.resolvers.insert(e.name.clone(), e);
            }
        }
    }

    pub fn get_router(&self, name: &str) -> Option<&ServiceRouterConfigEntry> {
        self.routers.get(name)
    }

    pub fn get_splitter(&self, name: &str) -> Option<&ServiceSplitterConfigEntry> {
        self.splitters.get(name)
    }

    pub fn get_resolver(&self, name: &str) -> Option<&ServiceResolverConfigEntry> {
        self.resolvers.get(name)
    }

    /// Whether any entry of any kind exists for the service.
    pub fn mentions(&self, name: &str) -> bool {
        self.routers.contains_key(name)
            || self.splitters.contains_key(name)
            || self.resolvers.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.routers.is_empty() && self.splitters.is_empty() && self.resolvers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.routers.len() + self.splitters.len() + self.resolvers.len()
    }
}
