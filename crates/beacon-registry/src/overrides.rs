//! Operator status overrides with per-entry access TTL.
//!
//! An override outlives the instance it targets: it survives
//! re-registration so an operator's out-of-service decision is not undone
//! by a client restart. Each read bumps the entry's deadline, so an
//! override stays alive as long as anything keeps consulting it; an hour
//! of silence lets it lapse.

use std::collections::HashMap;

use beacon_types::InstanceStatus;
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy)]
struct OverrideEntry {
    status: InstanceStatus,
    deadline_ms: u64,
}

/// Time-expiring map from instance id to operator-imposed status.
#[derive(Debug)]
pub struct StatusOverrides {
    ttl_ms: u64,
    entries: Mutex<HashMap<String, OverrideEntry>>,
}

impl StatusOverrides {
    /// Create an empty map with the given per-entry access TTL.
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            ttl_ms,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up the override for an instance, bumping its TTL.
    ///
    /// Expired entries are dropped on the way out.
    pub fn get(&self, instance_id: &str, now_ms: u64) -> Option<InstanceStatus> {
        let mut entries = self.entries.lock();
        match entries.get_mut(instance_id) {
            Some(entry) if entry.deadline_ms > now_ms => {
                entry.deadline_ms = now_ms + self.ttl_ms;
                Some(entry.status)
            }
            Some(_) => {
                entries.remove(instance_id);
                None
            }
            None => None,
        }
    }

    /// Whether a live override exists, bumping its TTL.
    pub fn contains(&self, instance_id: &str, now_ms: u64) -> bool {
        self.get(instance_id, now_ms).is_some()
    }

    /// Insert or replace the override for an instance.
    pub fn insert(&self, instance_id: &str, status: InstanceStatus, now_ms: u64) {
        self.entries.lock().insert(
            instance_id.to_string(),
            OverrideEntry {
                status,
                deadline_ms: now_ms + self.ttl_ms,
            },
        );
    }

    /// Remove the override for an instance, returning it if it was live.
    pub fn remove(&self, instance_id: &str, now_ms: u64) -> Option<InstanceStatus> {
        let entry = self.entries.lock().remove(instance_id)?;
        if entry.deadline_ms > now_ms {
            Some(entry.status)
        } else {
            None
        }
    }

    /// Drop every entry past its deadline. Returns how many were dropped.
    pub fn purge_expired(&self, now_ms: u64) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.deadline_ms > now_ms);
        before - entries.len()
    }

    /// Number of entries currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when no entries are held.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR_MS: u64 = 3_600_000;

    #[test]
    fn entries_expire_after_ttl() {
        let overrides = StatusOverrides::new(HOUR_MS);
        overrides.insert("i-1", InstanceStatus::OutOfService, 0);

        assert_eq!(overrides.get("i-1", HOUR_MS - 1), Some(InstanceStatus::OutOfService));
        // The read above bumped the deadline.
        assert_eq!(overrides.get("i-1", 2 * HOUR_MS - 2), Some(InstanceStatus::OutOfService));
        // Silence past the TTL lets the entry lapse.
        assert_eq!(overrides.get("i-1", 4 * HOUR_MS), None);
        assert!(overrides.is_empty());
    }

    #[test]
    fn access_bumps_deadline() {
        let overrides = StatusOverrides::new(1_000);
        overrides.insert("i-1", InstanceStatus::Up, 0);
        for t in (250..2_000).step_by(250) {
            assert!(overrides.contains("i-1", t), "entry lapsed at t={t}");
        }
    }

    #[test]
    fn remove_returns_live_entry_only() {
        let overrides = StatusOverrides::new(1_000);
        overrides.insert("i-1", InstanceStatus::Down, 0);
        assert_eq!(overrides.remove("i-1", 500), Some(InstanceStatus::Down));
        assert_eq!(overrides.remove("i-1", 500), None);

        overrides.insert("i-2", InstanceStatus::Down, 0);
        assert_eq!(overrides.remove("i-2", 5_000), None);
    }

    #[test]
    fn purge_drops_expired_entries() {
        let overrides = StatusOverrides::new(1_000);
        overrides.insert("i-1", InstanceStatus::Up, 0);
        overrides.insert("i-2", InstanceStatus::Up, 900);
        assert_eq!(overrides.purge_expired(1_500), 1);
        assert_eq!(overrides.len(), 1);
    }
}
