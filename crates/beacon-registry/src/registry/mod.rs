//! The in-memory instance registry.
//!
//! Two-level concurrent mapping from application name to instance id to
//! lease, mutated by many clients at once and read on every discovery
//! query. Mutators run under the read side of a global gate so that
//! distinct instances can be mutated in parallel while the delta snapshot
//! path, which takes the write side, sees a quiescent change log.
//!
//! ## Example
//!
//! ```ignore
//! use beacon_registry::{InstanceRegistry, RegistryConfig, NullResponseCache, AlwaysEnabledAsg, RemoteRegions};
//!
//! let registry = Arc::new(InstanceRegistry::new(
//!     RegistryConfig::default(),
//!     Arc::new(NullResponseCache::new()),
//!     Arc::new(AlwaysEnabledAsg),
//!     RemoteRegions::new(),
//! ));
//!
//! registry.register(instance, 90, false);
//! Arc::clone(&registry).start().await;
//! let apps = registry.get_applications();
//! ```

mod evict;
mod mutate;
mod reads;
mod tasks;

use std::sync::Arc;

use beacon_types::InstanceInfo;
use beacon_types::LeaseInfo;
use beacon_types::DEFAULT_LEASE_RENEWAL_INTERVAL_SECS;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::arbiter::AsgStatusOracle;
use crate::cache::ResponseCache;
use crate::changelog::ChangeLog;
use crate::clock::Clock;
use crate::clock::SystemClock;
use crate::config::RegistryConfig;
use crate::lease::Lease;
use crate::metrics::RegistryMetrics;
use crate::overrides::StatusOverrides;
use crate::rate::RenewalCapacity;
use crate::rate::RenewalRateMeter;
use crate::recent::ActivityEntry;
use crate::recent::ActivityRing;
use crate::remote::RemoteRegions;

/// Registry of service-instance leases with renewal, eviction, and
/// snapshot/delta read views.
pub struct InstanceRegistry {
    pub(crate) config: RegistryConfig,
    pub(crate) clock: Arc<dyn Clock>,
    /// app name -> instance id -> lease.
    pub(crate) registry: DashMap<String, Arc<DashMap<String, Lease>>>,
    pub(crate) overrides: StatusOverrides,
    pub(crate) change_log: ChangeLog,
    /// Mutators hold the read side; the delta snapshot holds the write
    /// side. The guard carries no data, only exclusion.
    pub(crate) snapshot_gate: RwLock<()>,
    pub(crate) renewal_capacity: RenewalCapacity,
    pub(crate) renews_last_min: RenewalRateMeter,
    pub(crate) recent_registrations: ActivityRing,
    pub(crate) recent_cancellations: ActivityRing,
    pub(crate) remote_regions: RemoteRegions,
    pub(crate) response_cache: Arc<dyn ResponseCache>,
    pub(crate) asg: Arc<dyn AsgStatusOracle>,
    pub(crate) metrics: RegistryMetrics,
    pub(crate) shutdown: watch::Sender<bool>,
    pub(crate) tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl InstanceRegistry {
    /// Create a registry on the wall clock.
    pub fn new(
        config: RegistryConfig,
        response_cache: Arc<dyn ResponseCache>,
        asg: Arc<dyn AsgStatusOracle>,
        remote_regions: RemoteRegions,
    ) -> Self {
        Self::with_clock(config, response_cache, asg, remote_regions, Arc::new(SystemClock))
    }

    /// Create a registry on an injected clock.
    pub fn with_clock(
        config: RegistryConfig,
        response_cache: Arc<dyn ResponseCache>,
        asg: Arc<dyn AsgStatusOracle>,
        remote_regions: RemoteRegions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        debug_assert!(config.validate().is_ok(), "invalid registry config: {:?}", config.validate());

        Self {
            overrides: StatusOverrides::new(config.override_entry_ttl_ms),
            recent_registrations: ActivityRing::new(config.recent_activity_capacity),
            recent_cancellations: ActivityRing::new(config.recent_activity_capacity),
            config,
            clock,
            registry: DashMap::new(),
            change_log: ChangeLog::new(),
            snapshot_gate: RwLock::new(()),
            renewal_capacity: RenewalCapacity::new(),
            renews_last_min: RenewalRateMeter::new(),
            remote_regions,
            response_cache,
            asg,
            metrics: RegistryMetrics::default(),
            shutdown: watch::channel(false).0,
            tasks: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    /// Decorated value copy of a lease's holder, with a freshly built
    /// lease summary and the coordinating-server flag set.
    pub(crate) fn decorate(&self, lease: &Lease) -> InstanceInfo {
        let mut info = lease.holder().clone();
        let renewal_interval_secs = info
            .lease_info
            .map(|summary| summary.renewal_interval_secs)
            .unwrap_or(DEFAULT_LEASE_RENEWAL_INTERVAL_SECS);
        info.lease_info = Some(LeaseInfo {
            renewal_interval_secs,
            duration_secs: (lease.duration_ms() / 1_000) as u32,
            registration_ts_ms: lease.registration_ts_ms(),
            last_renewal_ts_ms: lease.last_renewal_ts_ms(),
            eviction_ts_ms: lease.eviction_ts_ms(),
            service_up_ts_ms: lease.service_up_ts_ms(),
        });
        info.is_coordinating_discovery_server = true;
        info
    }

    pub(crate) fn invalidate_cache(&self, app_name: &str, vip: Option<&str>, secure_vip: Option<&str>) {
        self.response_cache.invalidate(app_name, vip, secure_vip);
    }

    /// Operation counters.
    pub fn metrics(&self) -> &RegistryMetrics {
        &self.metrics
    }

    /// Renewals observed in the previous whole minute.
    pub fn renews_last_minute(&self) -> u64 {
        self.renews_last_min.count(self.clock.now_ms())
    }

    /// Renewals per minute the registered population should produce.
    pub fn expected_renewals_per_minute(&self) -> u64 {
        self.renewal_capacity.expected_per_min()
    }

    /// Observed-renewal floor under which self-preservation trips.
    pub fn renewal_threshold(&self) -> u64 {
        self.renewal_capacity.threshold()
    }

    /// Number of live operator overrides held.
    pub fn override_entry_count(&self) -> usize {
        self.overrides.len()
    }

    /// Total registered instances across all applications.
    pub fn instance_count(&self) -> usize {
        self.registry.iter().map(|entry| entry.value().len()).sum()
    }

    /// Most recent registrations, newest first.
    pub fn recently_registered(&self) -> Vec<ActivityEntry> {
        self.recent_registrations.snapshot()
    }

    /// Most recent cancellations, newest first.
    pub fn recently_cancelled(&self) -> Vec<ActivityEntry> {
        self.recent_cancellations.snapshot()
    }

    /// The configuration this registry runs with.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }
}

impl std::fmt::Debug for InstanceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceRegistry")
            .field("applications", &self.registry.len())
            .field("instances", &self.instance_count())
            .field("change_log_len", &self.change_log.len())
            .finish()
    }
}
