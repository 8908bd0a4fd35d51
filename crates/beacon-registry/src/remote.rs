//! Remote-region registry handles and their aggregation set.
//!
//! Peer registries in other regions are reached through an opaque handle;
//! the transport behind it (HTTP, replication feed) lives outside this
//! crate. The registry unions remote views into its own, subject to
//! per-region application whitelists.

use std::collections::BTreeMap;
use std::sync::Arc;

use beacon_types::Application;
use beacon_types::Applications;

/// Read surface of a registry in another region.
pub trait RemoteRegionRegistry: Send + Sync {
    /// Fetch one application from the remote view.
    fn get_application(&self, app_name: &str) -> Option<Application>;

    /// Fetch the remote full snapshot.
    fn get_applications(&self) -> Applications;

    /// Fetch the remote delta.
    fn get_application_deltas(&self) -> Applications;
}

/// The configured set of remote regions, in deterministic name order.
#[derive(Clone, Default)]
pub struct RemoteRegions {
    handles: BTreeMap<String, Arc<dyn RemoteRegionRegistry>>,
}

impl RemoteRegions {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a region handle, replacing any previous one with the same name.
    pub fn insert(&mut self, region: impl Into<String>, handle: Arc<dyn RemoteRegionRegistry>) {
        self.handles.insert(region.into(), handle);
    }

    /// Handle for one region.
    pub fn get(&self, region: &str) -> Option<&Arc<dyn RemoteRegionRegistry>> {
        self.handles.get(region)
    }

    /// All known region names, sorted.
    pub fn region_names(&self) -> Vec<String> {
        self.handles.keys().cloned().collect()
    }

    /// Iterate `(region, handle)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn RemoteRegionRegistry>)> {
        self.handles.iter().map(|(name, handle)| (name.as_str(), handle))
    }

    /// Number of configured regions.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// True when no regions are configured.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl std::fmt::Debug for RemoteRegions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteRegions").field("regions", &self.region_names()).finish()
    }
}
