//! Renewal-rate accounting behind self-preservation.
//!
//! Two pieces: a sliding one-minute counter of observed renewals, and the
//! expected-rate / threshold pair derived from the registered population.
//! The eviction sweeper compares the two; when observed drops below
//! expected, the registry assumes it is the partitioned party and stops
//! evicting.

use parking_lot::Mutex;

/// Width of the measurement window.
const WINDOW_MS: u64 = 60_000;

#[derive(Debug, Default)]
struct MeterWindow {
    window_start_ms: u64,
    current: u64,
    previous: u64,
}

impl MeterWindow {
    /// Slide the window forward to cover `now_ms`.
    fn roll(&mut self, now_ms: u64) {
        if now_ms < self.window_start_ms + WINDOW_MS {
            return;
        }
        let elapsed_windows = (now_ms - self.window_start_ms) / WINDOW_MS;
        self.previous = if elapsed_windows == 1 { self.current } else { 0 };
        self.current = 0;
        self.window_start_ms += elapsed_windows * WINDOW_MS;
    }
}

/// Sliding one-minute counter of successful renewals.
///
/// Reports the previous completed window: self-preservation compares a
/// full minute of observed heartbeats against a full minute of expected
/// ones, never a partial window.
#[derive(Debug, Default)]
pub struct RenewalRateMeter {
    window: Mutex<MeterWindow>,
}

impl RenewalRateMeter {
    /// Create a meter with empty windows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one successful renewal.
    pub fn increment(&self, now_ms: u64) {
        let mut window = self.window.lock();
        window.roll(now_ms);
        window.current += 1;
    }

    /// Renewals observed in the previous completed window.
    pub fn count(&self, now_ms: u64) -> u64 {
        let mut window = self.window.lock();
        window.roll(now_ms);
        window.previous
    }

    /// Reset both windows.
    pub fn clear(&self) {
        *self.window.lock() = MeterWindow::default();
    }
}

#[derive(Debug, Default)]
struct CapacityInner {
    expected_per_min: u64,
    threshold: u64,
}

/// Expected renewals per minute and the derived self-preservation
/// threshold.
///
/// Serialized under its own small mutex; the pair must move together
/// (`threshold = floor(expected * renewal_percent_threshold)`).
#[derive(Debug, Default)]
pub struct RenewalCapacity {
    inner: Mutex<CapacityInner>,
}

impl RenewalCapacity {
    /// Create with zero expected renewals.
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for additional expected renewals and recompute the
    /// threshold. Each registered instance contributes two per minute.
    pub fn add_expected(&self, delta_per_min: u64, renewal_percent_threshold: f64) {
        let mut inner = self.inner.lock();
        inner.expected_per_min += delta_per_min;
        inner.threshold = (inner.expected_per_min as f64 * renewal_percent_threshold) as u64;
    }

    /// Expected renewals per minute.
    pub fn expected_per_min(&self) -> u64 {
        self.inner.lock().expected_per_min
    }

    /// Minimum observed renewals per minute before self-preservation
    /// trips.
    pub fn threshold(&self) -> u64 {
        self.inner.lock().threshold
    }

    /// Reset to zero expected renewals.
    pub fn clear(&self) {
        *self.inner.lock() = CapacityInner::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meter_reports_previous_window() {
        let meter = RenewalRateMeter::new();
        for _ in 0..5 {
            meter.increment(10_000);
        }
        // Still inside the first window: nothing completed yet.
        assert_eq!(meter.count(30_000), 0);

        // One full window later the five renewals become visible.
        assert_eq!(meter.count(70_000), 5);

        // Another silent window wipes them out.
        assert_eq!(meter.count(130_000), 0);
    }

    #[test]
    fn meter_drops_skipped_windows() {
        let meter = RenewalRateMeter::new();
        meter.increment(10_000);
        // Two windows of silence: the old count is stale, not previous.
        assert_eq!(meter.count(150_000), 0);
    }

    #[test]
    fn threshold_is_floor_of_expected_times_fraction() {
        let capacity = RenewalCapacity::new();
        for _ in 0..100 {
            capacity.add_expected(2, 0.85);
        }
        assert_eq!(capacity.expected_per_min(), 200);
        assert_eq!(capacity.threshold(), 170);

        capacity.add_expected(2, 0.85);
        // floor(202 * 0.85) = floor(171.7)
        assert_eq!(capacity.threshold(), 171);
    }
}
