//! Time-windowed log of recent registry mutations.
//!
//! Every mutator appends exactly one record; the delta read views replay
//! the log under the registry's write gate, and a background pruner drops
//! entries older than the retention window from the head.

use std::collections::VecDeque;

use beacon_types::InstanceInfo;
use parking_lot::Mutex;
use parking_lot::MutexGuard;

/// One recorded mutation.
///
/// The instance is a decorated value copy captured at mutation time, so a
/// later mutation of the same instance never rewrites history already in
/// the log.
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    /// When the mutation happened (Unix ms).
    pub update_ts_ms: u64,
    /// Snapshot of the mutated instance, action type included.
    pub instance: InstanceInfo,
}

/// Append-only FIFO of recent changes, head-pruned by retention.
#[derive(Debug, Default)]
pub struct ChangeLog {
    records: Mutex<VecDeque<ChangeRecord>>,
}

impl ChangeLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record at the tail.
    pub fn push(&self, record: ChangeRecord) {
        self.records.lock().push_back(record);
    }

    /// Drop aged entries from the head.
    ///
    /// The log is ordered by append time, so pruning stops at the first
    /// entry still inside the window. Returns how many were dropped.
    pub fn prune(&self, now_ms: u64, retention_ms: u64) -> usize {
        let cutoff = now_ms.saturating_sub(retention_ms);
        let mut records = self.records.lock();
        let mut dropped = 0;
        while let Some(front) = records.front() {
            if front.update_ts_ms < cutoff {
                records.pop_front();
                dropped += 1;
            } else {
                break;
            }
        }
        dropped
    }

    /// Lock the log for a consistent scan.
    ///
    /// Held only by the delta read, which already owns the registry write
    /// gate at that point.
    pub fn lock(&self) -> MutexGuard<'_, VecDeque<ChangeRecord>> {
        self.records.lock()
    }

    /// Number of records currently retained.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// True when no records are retained.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Drop every record.
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use beacon_types::InstanceInfo;

    use super::*;

    fn record(id: &str, update_ts_ms: u64) -> ChangeRecord {
        ChangeRecord {
            update_ts_ms,
            instance: InstanceInfo::new("app", id),
        }
    }

    #[test]
    fn prune_drops_aged_heads_only() {
        let log = ChangeLog::new();
        log.push(record("i-1", 1_000));
        log.push(record("i-2", 5_000));
        log.push(record("i-3", 9_000));

        // Retention window of 4s at t=10s keeps everything from 6s on.
        let dropped = log.prune(10_000, 4_000);
        assert_eq!(dropped, 2);

        let records = log.lock();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].instance.instance_id, "i-3");
    }

    #[test]
    fn prune_stops_at_first_retained_entry() {
        let log = ChangeLog::new();
        log.push(record("i-1", 8_000));
        log.push(record("i-2", 1_000));

        // The second entry is older than the cutoff but sits behind a
        // retained head, so it stays (the log is append-ordered).
        assert_eq!(log.prune(10_000, 4_000), 0);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn records_keep_append_order() {
        let log = ChangeLog::new();
        log.push(record("a", 1));
        log.push(record("b", 2));
        let ids: Vec<_> = log.lock().iter().map(|r| r.instance.instance_id.clone()).collect();
        assert_eq!(ids, ["a", "b"]);
    }
}
