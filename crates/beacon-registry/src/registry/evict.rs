//! Eviction sweep and the self-preservation circuit breaker.

use tracing::debug;
use tracing::warn;

use super::InstanceRegistry;
use crate::metrics::RegistryMetrics;

impl InstanceRegistry {
    /// Whether expired leases may currently be evicted.
    ///
    /// Self-preservation: when the renewals observed over the last minute
    /// fall below the expected floor, this server assumes it is the
    /// partitioned party — the instances are probably fine and the
    /// heartbeats are not arriving — and stops evicting.
    pub fn lease_expiration_enabled(&self) -> bool {
        if !self.config.self_preservation_enabled {
            return true;
        }
        let threshold = self.renewal_capacity.threshold();
        threshold > 0 && self.renews_last_min.count(self.clock.now_ms()) >= threshold
    }

    /// Cancel every expired lease, unless self-preservation is tripped.
    ///
    /// Returns the number of leases evicted. Victims are collected first
    /// and then cancelled one by one; cancel takes the read gate per
    /// victim, which keeps the sweep from stalling mutators.
    pub fn evict(&self) -> usize {
        if !self.lease_expiration_enabled() {
            debug!("lease expiration is currently disabled");
            return 0;
        }

        let now = self.clock.now_ms();
        let mut victims = Vec::new();
        for entry in self.registry.iter() {
            for lease in entry.value().iter() {
                let holder = lease.value().holder();
                if holder.app_name != *entry.key() {
                    warn!(
                        key = %entry.key(),
                        app_name = %holder.app_name,
                        instance_id = %holder.instance_id,
                        "registry key does not match lease holder, skipping"
                    );
                    continue;
                }
                if lease.value().is_expired_at(now) {
                    victims.push((holder.app_name.clone(), holder.instance_id.clone()));
                }
            }
        }

        let mut evicted = 0;
        for (app_name, instance_id) in victims {
            RegistryMetrics::incr(&self.metrics.expirations);
            warn!(app_name = %app_name, instance_id = %instance_id, "evicting expired lease");
            if self.cancel(&app_name, &instance_id, false) {
                evicted += 1;
            }
        }
        evicted
    }
}
