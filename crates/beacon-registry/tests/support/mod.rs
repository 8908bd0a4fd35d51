//! Test doubles and fixtures shared by the integration suite.

#![allow(dead_code)]

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use beacon_registry::AlwaysEnabledAsg;
use beacon_registry::InstanceRegistry;
use beacon_registry::ManualClock;
use beacon_registry::RegistryConfig;
use beacon_registry::RemoteRegionRegistry;
use beacon_registry::RemoteRegions;
use beacon_registry::ResponseCache;
use beacon_types::Application;
use beacon_types::Applications;
use beacon_types::InstanceInfo;
use beacon_types::InstanceStatus;

/// Base timestamp for manual clocks: far from zero so the 0-sentinel
/// timestamps (eviction, service-up) stay unambiguous.
pub const T0: u64 = 1_000_000;

/// Response cache that records every invalidation.
#[derive(Default)]
pub struct RecordingCache {
    invalidations: Mutex<Vec<(String, Option<String>, Option<String>)>>,
    version_delta: AtomicU64,
    version_delta_with_regions: AtomicU64,
}

impl RecordingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidations(&self) -> Vec<(String, Option<String>, Option<String>)> {
        self.invalidations.lock().unwrap().clone()
    }

    pub fn invalidation_count(&self) -> usize {
        self.invalidations.lock().unwrap().len()
    }
}

impl ResponseCache for RecordingCache {
    fn invalidate(&self, app_name: &str, vip_address: Option<&str>, secure_vip_address: Option<&str>) {
        self.invalidations.lock().unwrap().push((
            app_name.to_string(),
            vip_address.map(str::to_string),
            secure_vip_address.map(str::to_string),
        ));
    }

    fn version_delta(&self) -> u64 {
        self.version_delta.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn version_delta_with_regions(&self) -> u64 {
        self.version_delta_with_regions.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Remote-region registry serving fixed application sets.
#[derive(Default)]
pub struct FixedRemoteRegion {
    apps: Applications,
    deltas: Applications,
}

impl FixedRemoteRegion {
    pub fn new(apps: Applications) -> Self {
        Self {
            apps,
            deltas: Applications::new(),
        }
    }

    pub fn with_deltas(mut self, deltas: Applications) -> Self {
        self.deltas = deltas;
        self
    }
}

impl RemoteRegionRegistry for FixedRemoteRegion {
    fn get_application(&self, app_name: &str) -> Option<Application> {
        self.apps.get_registered_application(app_name).cloned()
    }

    fn get_applications(&self) -> Applications {
        self.apps.clone()
    }

    fn get_application_deltas(&self) -> Applications {
        self.deltas.clone()
    }
}

/// Build an instance descriptor with addresses derived from its identity.
pub fn instance(app_name: &str, instance_id: &str, status: InstanceStatus) -> InstanceInfo {
    let mut info = InstanceInfo::new(app_name, instance_id);
    info.address = format!("10.0.0.1:7{}", instance_id.len());
    info.vip_address = Some(format!("{app_name}-vip"));
    info.secure_vip_address = Some(format!("{app_name}-svip"));
    info.status = status;
    info
}

/// Build an `Applications` set out of whole-app instance lists.
pub fn applications(apps: &[(&str, &[InstanceInfo])]) -> Applications {
    let mut set = Applications::new();
    for (name, instances) in apps {
        let app = set.get_or_insert(name);
        for info in *instances {
            app.add_instance(info.clone());
        }
    }
    set
}

/// A registry wired to recording doubles and a manual clock at [`T0`].
pub struct Harness {
    pub registry: Arc<InstanceRegistry>,
    pub cache: Arc<RecordingCache>,
    pub clock: Arc<ManualClock>,
}

pub fn harness(config: RegistryConfig) -> Harness {
    harness_with_regions(config, RemoteRegions::new())
}

pub fn harness_with_regions(config: RegistryConfig, remote_regions: RemoteRegions) -> Harness {
    let cache = Arc::new(RecordingCache::new());
    let clock = Arc::new(ManualClock::at(T0));
    let registry = Arc::new(InstanceRegistry::with_clock(
        config,
        Arc::clone(&cache) as Arc<dyn ResponseCache>,
        Arc::new(AlwaysEnabledAsg),
        remote_regions,
        Arc::clone(&clock) as Arc<dyn beacon_registry::Clock>,
    ));
    Harness { registry, cache, clock }
}
