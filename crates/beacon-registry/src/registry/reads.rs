//! Read views: point lookups, full snapshots, and deltas, each with
//! optional remote-region union.
//!
//! Every view hands back decorated value copies; nothing a reader
//! receives aliases registry-owned state. Point reads and full snapshots
//! take no global lock. The delta views take the write side of the
//! snapshot gate so the change log they replay is quiescent.

use std::sync::Arc;

use beacon_types::Application;
use beacon_types::Applications;
use beacon_types::InstanceInfo;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::InstanceRegistry;

impl InstanceRegistry {
    /// All instances of one application, falling back to remote regions
    /// unless transparent fallback is disabled in the configuration.
    pub fn get_application(&self, app_name: &str) -> Option<Application> {
        self.get_application_with_remote(app_name, !self.config.disable_transparent_fallback_to_other_region)
    }

    /// All instances of one application.
    ///
    /// When the local view is empty and `include_remote` is set, remote
    /// regions are consulted in name order and the first hit wins.
    pub fn get_application_with_remote(&self, app_name: &str, include_remote: bool) -> Option<Application> {
        let leases = self.registry.get(app_name).map(|entry| Arc::clone(&entry));
        if let Some(leases) = leases {
            let mut app = Application::new(app_name);
            for lease in leases.iter() {
                app.add_instance(self.decorate(lease.value()));
            }
            if !app.is_empty() {
                return Some(app);
            }
        }
        if include_remote {
            for (_region, handle) in self.remote_regions.iter() {
                if let Some(app) = handle.get_application(app_name) {
                    return Some(app);
                }
            }
        }
        None
    }

    /// Full snapshot under the configured fallback policy: local region
    /// only when transparent fallback is disabled, otherwise the union
    /// over every known remote region.
    pub fn get_applications(&self) -> Applications {
        if self.config.disable_transparent_fallback_to_other_region {
            self.get_applications_from_local_region_only()
        } else {
            self.get_applications_from_all_remote_regions()
        }
    }

    /// Full snapshot over the local region and every known remote region.
    pub fn get_applications_from_all_remote_regions(&self) -> Applications {
        self.get_applications_from_multiple_regions(&self.remote_regions.region_names())
    }

    /// Full snapshot over the local region only.
    pub fn get_applications_from_local_region_only(&self) -> Applications {
        self.get_applications_from_multiple_regions(&[])
    }

    /// Full snapshot over the local region unioned with the requested
    /// remote regions, subject to the per-region application whitelists.
    ///
    /// Installs the reconcile hash of the resulting set.
    pub fn get_applications_from_multiple_regions(&self, remote_regions: &[String]) -> Applications {
        let include_remote = !remote_regions.is_empty();
        debug!(regions = ?remote_regions, "building full snapshot");

        let mut apps = Applications::new();
        apps.version = 1;
        for entry in self.registry.iter() {
            let mut app = Application::new(entry.key().clone());
            for lease in entry.value().iter() {
                app.add_instance(self.decorate(lease.value()));
            }
            if !app.is_empty() {
                apps.add_application(app);
            }
        }

        if include_remote {
            for region in remote_regions {
                let Some(handle) = self.remote_regions.get(region) else {
                    warn!(%region, "no remote registry available for region");
                    continue;
                };
                let remote_apps = handle.get_applications();
                for remote_app in remote_apps.registered_applications() {
                    if !self.config.allows_remote_app(region, &remote_app.name) {
                        info!(app_name = %remote_app.name, %region, "application excluded by whitelist");
                        continue;
                    }
                    let merged = apps.get_or_insert(&remote_app.name);
                    for instance in remote_app.instances() {
                        merged.add_instance(instance.clone());
                    }
                }
            }
        }

        apps.apps_hash_code = apps.reconcile_hash();
        apps
    }

    /// Recent changes under the configured fallback policy.
    pub fn get_application_deltas(&self) -> Applications {
        let version = self.response_cache.version_delta();
        if self.config.disable_transparent_fallback_to_other_region {
            self.build_deltas(&[], version)
        } else {
            self.build_deltas(&self.remote_regions.region_names(), version)
        }
    }

    /// Recent changes over the local region plus the requested remote
    /// regions (`None` means all known regions).
    ///
    /// The reconcile hash is computed from the full current snapshot over
    /// the same region set, not from the delta itself: clients apply the
    /// delta to their state and compare against that hash.
    pub fn get_application_deltas_from_multiple_regions(&self, remote_regions: Option<&[String]>) -> Applications {
        let all_regions = self.remote_regions.region_names();
        let regions = remote_regions.unwrap_or(&all_regions);
        self.build_deltas(regions, self.response_cache.version_delta_with_regions())
    }

    fn build_deltas(&self, remote_regions: &[String], version: u64) -> Applications {
        let include_remote = !remote_regions.is_empty();
        let mut apps = Applications::new();
        apps.version = version;

        // Write side of the gate: mutators are excluded, so the change
        // log replay and the hash snapshot below describe the same state.
        let _gate = self.snapshot_gate.write();

        {
            let records = self.change_log.lock();
            debug!(records = records.len(), "replaying change log for delta");
            for record in records.iter() {
                apps.get_or_insert(&record.instance.app_name).push_instance(record.instance.clone());
            }
        }

        if include_remote {
            for region in remote_regions {
                let Some(handle) = self.remote_regions.get(region) else {
                    warn!(%region, "no remote registry available for region");
                    continue;
                };
                let remote_delta = handle.get_application_deltas();
                for remote_app in remote_delta.registered_applications() {
                    if !self.config.allows_remote_app(region, &remote_app.name) {
                        continue;
                    }
                    let merged = apps.get_or_insert(&remote_app.name);
                    for instance in remote_app.instances() {
                        merged.add_instance(instance.clone());
                    }
                }
            }
        }

        let full = self.get_applications_from_multiple_regions(remote_regions);
        apps.apps_hash_code = full.apps_hash_code;
        apps
    }

    /// One instance by identity.
    ///
    /// Skips leases that are already expired while expiration is enabled;
    /// when `include_remote` is set, the first remote region knowing the
    /// application answers for it.
    pub fn get_instance_by_app_and_id(
        &self,
        app_name: &str,
        instance_id: &str,
        include_remote: bool,
    ) -> Option<InstanceInfo> {
        let lease =
            self.registry.get(app_name).and_then(|leases| leases.get(instance_id).map(|l| l.value().clone()));
        if let Some(lease) = lease {
            if !self.lease_expiration_enabled() || !lease.is_expired_at(self.clock.now_ms()) {
                return Some(self.decorate(&lease));
            }
        }
        if include_remote {
            for (_region, handle) in self.remote_regions.iter() {
                if let Some(app) = handle.get_application(app_name) {
                    return app.get_by_instance_id(instance_id).cloned();
                }
            }
        }
        None
    }

    /// Every local instance carrying the given id, one per application;
    /// falls back to remote regions when the id is unknown locally.
    pub fn get_instances_by_id(&self, instance_id: &str, include_remote: bool) -> Vec<InstanceInfo> {
        let now = self.clock.now_ms();
        let expiration_enabled = self.lease_expiration_enabled();

        let mut instances = Vec::new();
        for entry in self.registry.iter() {
            if let Some(lease) = entry.value().get(instance_id) {
                if expiration_enabled && lease.is_expired_at(now) {
                    continue;
                }
                instances.push(self.decorate(lease.value()));
            }
        }

        if instances.is_empty() && include_remote {
            for (_region, handle) in self.remote_regions.iter() {
                for app in handle.get_applications().registered_applications() {
                    if let Some(instance) = app.get_by_instance_id(instance_id) {
                        instances.push(instance.clone());
                        return instances;
                    }
                }
            }
        }
        instances
    }
}
