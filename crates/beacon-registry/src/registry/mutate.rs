//! Mutator operations: register, renew, cancel, status overrides.
//!
//! All single-instance mutators take the read side of the snapshot gate;
//! renew takes no global lock at all and relies on the concurrent maps.
//! Every mutator that changes visible state appends exactly one change
//! record, stamps the holder's last-updated time, and invalidates the
//! response cache with the addresses captured at mutation time, before
//! returning.

use std::sync::Arc;

use beacon_types::ActionType;
use beacon_types::InstanceInfo;
use beacon_types::InstanceStatus;
use beacon_types::DEFAULT_LEASE_DURATION_SECS;
use dashmap::DashMap;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::InstanceRegistry;
use crate::arbiter::effective_status;
use crate::changelog::ChangeRecord;
use crate::lease::Lease;
use crate::metrics::RegistryMetrics;

impl InstanceRegistry {
    /// Register an instance, upserting the lease for its identity.
    ///
    /// A `lease_duration_secs` of 0 falls back to the default duration.
    /// Replacing an existing lease keeps the newer of the two dirty
    /// timestamps and carries the service-up timestamp forward.
    pub fn register(&self, mut info: InstanceInfo, lease_duration_secs: u32, is_replication: bool) {
        let _gate = self.snapshot_gate.read();
        let now = self.clock.now_ms();
        RegistryMetrics::incr(&self.metrics.registrations);

        let leases = {
            let entry = self.registry.entry(info.app_name.clone()).or_insert_with(|| Arc::new(DashMap::new()));
            Arc::clone(&entry)
        };
        let existing = leases.get(&info.instance_id).map(|lease| lease.value().clone());

        if let Some(existing) = &existing {
            // The stored dirty timestamp never moves backwards: an older
            // registration is rebased onto the newer version.
            let existing_dirty = existing.holder().last_dirty_ts_ms;
            if existing_dirty > info.last_dirty_ts_ms {
                warn!(
                    app_name = %info.app_name,
                    instance_id = %info.instance_id,
                    existing_dirty,
                    incoming_dirty = info.last_dirty_ts_ms,
                    "existing lease carries a newer dirty timestamp, rebasing registration"
                );
                info.last_dirty_ts_ms = existing_dirty;
            }
        } else {
            // A brand-new instance is two more expected heartbeats per
            // minute.
            self.renewal_capacity.add_expected(2, self.config.renewal_percent_threshold);
        }

        self.recent_registrations.add(now, format!("{}({})", info.app_name, info.instance_id));

        // Initial state transfer of an override riding in on the
        // registration, then pull the authoritative override back out.
        if info.overridden_status != InstanceStatus::Unknown
            && !self.overrides.contains(&info.instance_id, now)
        {
            debug!(
                instance_id = %info.instance_id,
                status = %info.overridden_status,
                "seeding override from registration"
            );
            self.overrides.insert(&info.instance_id, info.overridden_status, now);
        }
        if let Some(overridden) = self.overrides.get(&info.instance_id, now) {
            info.overridden_status = overridden;
        }

        let existing_status = existing.as_ref().map(|lease| lease.holder().status);
        let status = effective_status(&info, existing_status, is_replication, &self.overrides, self.asg.as_ref(), now);
        info.set_status_without_dirty(status);

        info.action_type = Some(ActionType::Added);
        info.set_last_updated(now);

        let app_name = info.app_name.clone();
        let instance_id = info.instance_id.clone();
        let vip = info.vip_address.clone();
        let secure_vip = info.secure_vip_address.clone();

        let duration_secs = if lease_duration_secs == 0 {
            DEFAULT_LEASE_DURATION_SECS
        } else {
            lease_duration_secs
        };
        let mut lease = Lease::new(
            info,
            u64::from(duration_secs) * 1_000,
            self.config.expiry_duration_multiplier,
            now,
        );
        if let Some(existing) = &existing {
            if existing.service_up_ts_ms() != 0 {
                lease.set_service_up_ts_ms(existing.service_up_ts_ms());
            }
        }
        if lease.holder().status == InstanceStatus::Up {
            lease.service_up(now);
        }

        self.change_log.push(ChangeRecord {
            update_ts_ms: now,
            instance: self.decorate(&lease),
        });
        leases.insert(instance_id.clone(), lease);
        self.invalidate_cache(&app_name, vip.as_deref(), secure_vip.as_deref());

        info!(
            app_name = %app_name,
            instance_id = %instance_id,
            status = %status,
            replication = is_replication,
            "registered instance"
        );
    }

    /// Renew an instance's lease.
    ///
    /// Returns false when no lease exists, or when the arbitrated status
    /// resolves to UNKNOWN — the client's override was deleted and it must
    /// re-register. Renewals reconcile the stored status but do not emit
    /// to the change log.
    pub fn renew(&self, app_name: &str, instance_id: &str, is_replication: bool) -> bool {
        RegistryMetrics::incr(&self.metrics.renewals);
        let now = self.clock.now_ms();

        let leases = self.registry.get(app_name).map(|entry| Arc::clone(&entry));
        let Some(leases) = leases else {
            RegistryMetrics::incr(&self.metrics.renewal_misses);
            warn!(app_name, instance_id, replication = is_replication, "renew for unknown application");
            return false;
        };
        let Some(mut lease) = leases.get_mut(instance_id) else {
            RegistryMetrics::incr(&self.metrics.renewal_misses);
            warn!(app_name, instance_id, replication = is_replication, "renew for unregistered instance");
            return false;
        };

        let current = lease.holder().status;
        let status =
            effective_status(lease.holder(), Some(current), is_replication, &self.overrides, self.asg.as_ref(), now);
        if status == InstanceStatus::Unknown {
            info!(app_name, instance_id, "status resolved to UNKNOWN, instance must re-register");
            RegistryMetrics::incr(&self.metrics.renewal_misses);
            return false;
        }
        if current != status {
            info!(
                app_name,
                instance_id,
                current = %current,
                arbitrated = %status,
                "reconciling stored status on renewal"
            );
            lease.holder_mut().set_status_without_dirty(status);
        }

        self.renews_last_min.increment(now);
        lease.renew(now);
        true
    }

    /// Cancel an instance's registration and drop its override.
    ///
    /// Returns false when no lease was present.
    pub fn cancel(&self, app_name: &str, instance_id: &str, is_replication: bool) -> bool {
        let _gate = self.snapshot_gate.read();
        let now = self.clock.now_ms();
        RegistryMetrics::incr(&self.metrics.cancellations);

        let removed = self.registry.get(app_name).and_then(|leases| leases.remove(instance_id));

        self.recent_cancellations.add(now, format!("{app_name}({instance_id})"));
        if let Some(status) = self.overrides.remove(instance_id, now) {
            debug!(instance_id, status = %status, "removed status override on cancel");
        }

        let Some((_, mut lease)) = removed else {
            RegistryMetrics::incr(&self.metrics.cancellation_misses);
            warn!(app_name, instance_id, replication = is_replication, "cancel for unregistered instance");
            return false;
        };

        lease.cancel(now);
        let holder = lease.holder_mut();
        holder.action_type = Some(ActionType::Deleted);
        holder.set_last_updated(now);
        let vip = holder.vip_address.clone();
        let secure_vip = holder.secure_vip_address.clone();

        self.change_log.push(ChangeRecord {
            update_ts_ms: now,
            instance: self.decorate(&lease),
        });
        self.invalidate_cache(app_name, vip.as_deref(), secure_vip.as_deref());

        debug!(app_name, instance_id, replication = is_replication, "cancelled lease");
        true
    }

    /// Impose an operator status override on an instance.
    ///
    /// Returns false when no lease exists. The override also renews the
    /// lease: operator actions count as proof of life. Requesting the
    /// status already in effect is a no-op beyond the renewal: nothing is
    /// appended to the change log and no cache entry is invalidated.
    pub fn status_update(
        &self,
        app_name: &str,
        instance_id: &str,
        new_status: InstanceStatus,
        last_dirty_ts_ms: Option<u64>,
        is_replication: bool,
    ) -> bool {
        let _gate = self.snapshot_gate.read();
        let now = self.clock.now_ms();
        RegistryMetrics::incr(&self.metrics.status_updates);

        let leases = self.registry.get(app_name).map(|entry| Arc::clone(&entry));
        let Some(leases) = leases else {
            return false;
        };
        let Some(mut lease) = leases.get_mut(instance_id) else {
            return false;
        };

        lease.renew(now);
        if lease.holder().status != new_status {
            if new_status == InstanceStatus::Up {
                lease.service_up(now);
            }
            self.overrides.insert(instance_id, new_status, now);

            let holder = lease.holder_mut();
            holder.overridden_status = new_status;

            let incoming_dirty = last_dirty_ts_ms.unwrap_or(0);
            if incoming_dirty > holder.last_dirty_ts_ms {
                // The caller is ahead of us: adopt its version wholesale
                // without minting a new one.
                holder.last_dirty_ts_ms = incoming_dirty;
                holder.set_status_without_dirty(new_status);
            } else {
                holder.set_status(new_status, now);
            }
            holder.action_type = Some(ActionType::Modified);
            holder.set_last_updated(now);
            let vip = holder.vip_address.clone();
            let secure_vip = holder.secure_vip_address.clone();

            self.change_log.push(ChangeRecord {
                update_ts_ms: now,
                instance: self.decorate(&lease),
            });
            self.invalidate_cache(app_name, vip.as_deref(), secure_vip.as_deref());
            info!(app_name, instance_id, status = %new_status, replication = is_replication, "status override applied");
        }
        true
    }

    /// Remove the operator override from an instance, adopting
    /// `new_status` as its effective status.
    ///
    /// Returns false when no lease exists; a lease without an override is
    /// renewed but otherwise left untouched and still reported as success,
    /// with nothing appended to the change log and no cache invalidation.
    pub fn delete_status_override(
        &self,
        app_name: &str,
        instance_id: &str,
        new_status: InstanceStatus,
        last_dirty_ts_ms: Option<u64>,
        is_replication: bool,
    ) -> bool {
        let _gate = self.snapshot_gate.read();
        let now = self.clock.now_ms();
        RegistryMetrics::incr(&self.metrics.override_deletes);

        let leases = self.registry.get(app_name).map(|entry| Arc::clone(&entry));
        let Some(leases) = leases else {
            return false;
        };
        let Some(mut lease) = leases.get_mut(instance_id) else {
            return false;
        };

        lease.renew(now);
        if self.overrides.remove(instance_id, now).is_some() {
            let holder = lease.holder_mut();
            holder.overridden_status = InstanceStatus::Unknown;

            let incoming_dirty = last_dirty_ts_ms.unwrap_or(0);
            if incoming_dirty > holder.last_dirty_ts_ms {
                holder.last_dirty_ts_ms = incoming_dirty;
                holder.set_status_without_dirty(new_status);
            } else {
                holder.set_status(new_status, now);
            }
            holder.action_type = Some(ActionType::Modified);
            holder.set_last_updated(now);
            let vip = holder.vip_address.clone();
            let secure_vip = holder.secure_vip_address.clone();

            self.change_log.push(ChangeRecord {
                update_ts_ms: now,
                instance: self.decorate(&lease),
            });
            self.invalidate_cache(app_name, vip.as_deref(), secure_vip.as_deref());
            info!(app_name, instance_id, status = %new_status, replication = is_replication, "status override removed");
        }
        true
    }

    /// Seed an override reported by a replicating peer, if this node does
    /// not already hold it, and propagate it onto any live local copy.
    ///
    /// Keeps operator decisions alive across node restarts.
    pub fn store_overridden_status_if_required(&self, instance_id: &str, overridden: InstanceStatus) {
        let _gate = self.snapshot_gate.read();
        let now = self.clock.now_ms();
        if self.overrides.get(instance_id, now) == Some(overridden) {
            return;
        }
        info!(instance_id, status = %overridden, "adopting overridden status from peer");
        self.overrides.insert(instance_id, overridden, now);
        for entry in self.registry.iter() {
            if let Some(mut lease) = entry.value().get_mut(instance_id) {
                lease.holder_mut().overridden_status = overridden;
            }
        }
    }

    /// Wipe the registry: leases, overrides, rings, and the change log.
    ///
    /// Used by operators and by the peer-bootstrap path before a full
    /// state transfer. Renewal accounting is left alone.
    pub fn clear(&self) {
        let _gate = self.snapshot_gate.read();
        self.overrides.clear();
        self.recent_registrations.clear();
        self.recent_cancellations.clear();
        self.change_log.clear();
        self.registry.clear();
        info!("registry cleared");
    }
}
