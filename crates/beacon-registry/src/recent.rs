//! Fixed-capacity rings of recent registrations and cancellations.
//!
//! Operator introspection only; never consulted by the discovery paths.

use std::collections::VecDeque;

use parking_lot::Mutex;

/// One recorded event: when it happened and `app(instance)` it concerned.
pub type ActivityEntry = (u64, String);

/// Bounded FIFO that overwrites its oldest entry on overflow.
#[derive(Debug)]
pub struct ActivityRing {
    capacity: usize,
    entries: Mutex<VecDeque<ActivityEntry>>,
}

impl ActivityRing {
    /// Create a ring holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Record an event, evicting the oldest entry if the ring is full.
    pub fn add(&self, ts_ms: u64, label: String) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back((ts_ms, label));
    }

    /// Snapshot of the ring, newest first.
    pub fn snapshot(&self) -> Vec<ActivityEntry> {
        let entries = self.entries.lock();
        entries.iter().rev().cloned().collect()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when nothing has been recorded.
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

    #[test]
    fn overflow_evicts_oldest() {
        let ring = ActivityRing::new(3);
        for i in 0..5u64 {
            ring.add(i, format!("app(i-{i})"));
        }

        assert_eq!(ring.len(), 3);
        let snapshot = ring.snapshot();
        // Newest first, oldest two gone.
        assert_eq!(snapshot[0].1, "app(i-4)");
        assert_eq!(snapshot[1].1, "app(i-3)");
        assert_eq!(snapshot[2].1, "app(i-2)");
    }

    #[test]
    fn snapshot_is_newest_first() {
        let ring = ActivityRing::new(10);
        ring.add(1, "a".into());
        ring.add(2, "b".into());
        let snapshot = ring.snapshot();
        assert_eq!(snapshot, vec![(2, "b".to_string()), (1, "a".to_string())]);
    }
}
