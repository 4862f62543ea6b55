//! Hosted Region Registry
//!
//! The set of worlds/regions served by this process. The loopback guard asks
//! it whether a configured endpoint is actually ourselves. Regions come and go
//! while lookups are in flight, so the registry is a concurrent map behind a
//! trait that hosts can replace.

use dashmap::DashMap;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::core_types::RegionHandle;

/// A region hosted by this process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionInfo {
    pub region_id: Uuid,
    pub handle: RegionHandle,
    pub name: String,
    /// Host name advertised to the outside world
    pub external_host_name: String,
    /// Port of the region's HTTP listener
    pub http_port: u16,
    /// Full server URI if the host publishes one
    #[serde(default)]
    pub server_uri: Option<String>,
}

impl RegionInfo {
    /// True when `endpoint` addresses this region's own listener.
    ///
    /// Matches on exact authority (host + effective port) against the server
    /// URI, or on external host name plus HTTP port.
    pub fn serves(&self, endpoint: &Url) -> bool {
        let Some(host) = endpoint.host_str() else {
            return false;
        };
        let port = endpoint.port_or_known_default();

        if let Some(uri) = self.server_uri.as_deref().and_then(|u| Url::parse(u).ok())
            && let Some(own_host) = uri.host_str()
            && own_host.eq_ignore_ascii_case(host)
            && uri.port_or_known_default() == port
        {
            return true;
        }

        !self.external_host_name.is_empty()
            && self.external_host_name.eq_ignore_ascii_case(host)
            && port == Some(self.http_port)
    }
}

/// Registry of regions hosted by this process
pub trait RegionRegistry: Send + Sync {
    fn add_region(&self, region: RegionInfo);

    fn remove_region(&self, handle: RegionHandle) -> Option<RegionInfo>;

    fn regions(&self) -> Vec<RegionInfo>;

    /// Whether any hosted region serves `endpoint`
    fn is_self(&self, endpoint: &Url) -> bool {
        self.regions().iter().any(|r| r.serves(endpoint))
    }
}

/// Default in-memory registry
#[derive(Debug, Default)]
pub struct HostedRegions {
    regions: DashMap<RegionHandle, RegionInfo>,
}

impl HostedRegions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

impl RegionRegistry for HostedRegions {
    fn add_region(&self, region: RegionInfo) {
        info!(
            region = %region.name,
            handle = region.handle,
            host = %region.external_host_name,
            "Region registered"
        );
        self.regions.insert(region.handle, region);
    }

    fn remove_region(&self, handle: RegionHandle) -> Option<RegionInfo> {
        let removed = self.regions.remove(&handle).map(|(_, r)| r);
        if let Some(ref r) = removed {
            debug!(region = %r.name, handle, "Region removed");
        }
        removed
    }

    fn regions(&self) -> Vec<RegionInfo> {
        self.regions.iter().map(|e| e.value().clone()).collect()
    }

    fn is_self(&self, endpoint: &Url) -> bool {
        self.regions.iter().any(|e| e.value().serves(endpoint))
    }
}
