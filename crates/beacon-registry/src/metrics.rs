//! Operation counters for registry introspection.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serde::Serialize;

/// Running counters over every registry operation.
///
/// Misses are counted, never raised: a cancel or renew against an absent
/// lease is an expected event in an AP registry.
#[derive(Debug, Default)]
pub struct RegistryMetrics {
    pub(crate) registrations: AtomicU64,
    pub(crate) renewals: AtomicU64,
    pub(crate) renewal_misses: AtomicU64,
    pub(crate) cancellations: AtomicU64,
    pub(crate) cancellation_misses: AtomicU64,
    pub(crate) status_updates: AtomicU64,
    pub(crate) override_deletes: AtomicU64,
    pub(crate) expirations: AtomicU64,
}

/// Point-in-time view of [`RegistryMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistryMetricsSnapshot {
    pub registrations: u64,
    pub renewals: u64,
    pub renewal_misses: u64,
    pub cancellations: u64,
    pub cancellation_misses: u64,
    pub status_updates: u64,
    pub override_deletes: u64,
    pub expirations: u64,
}

impl RegistryMetrics {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot every counter.
    pub fn snapshot(&self) -> RegistryMetricsSnapshot {
        RegistryMetricsSnapshot {
            registrations: self.registrations.load(Ordering::Relaxed),
            renewals: self.renewals.load(Ordering::Relaxed),
            renewal_misses: self.renewal_misses.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
            cancellation_misses: self.cancellation_misses.load(Ordering::Relaxed),
            status_updates: self.status_updates.load(Ordering::Relaxed),
            override_deletes: self.override_deletes.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_increments() {
        let metrics = RegistryMetrics::default();
        RegistryMetrics::incr(&metrics.registrations);
        RegistryMetrics::incr(&metrics.registrations);
        RegistryMetrics::incr(&metrics.renewal_misses);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.registrations, 2);
        assert_eq!(snapshot.renewal_misses, 1);
        assert_eq!(snapshot.cancellations, 0);
    }
}
