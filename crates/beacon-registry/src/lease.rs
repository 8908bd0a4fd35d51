//! Lease records wrapping registered instances.

use beacon_types::InstanceInfo;

/// A time-bounded registration of one instance.
///
/// The registry owns every lease exclusively; read views hand back
/// decorated copies of the holder, never the lease itself.
#[derive(Debug, Clone)]
pub struct Lease {
    holder: InstanceInfo,
    duration_ms: u64,
    /// Expiry allowance: the lease survives `multiplier * duration_ms`
    /// past the last renewal. Inherited clock-skew compensation; kept
    /// configurable but never second-guessed.
    expiry_multiplier: u64,
    registration_ts_ms: u64,
    last_renewal_ts_ms: u64,
    eviction_ts_ms: u64,
    service_up_ts_ms: u64,
}

impl Lease {
    /// Create a fresh lease for `holder`, registered and last-renewed now.
    pub fn new(holder: InstanceInfo, duration_ms: u64, expiry_multiplier: u64, now_ms: u64) -> Self {
        Self {
            holder,
            duration_ms,
            expiry_multiplier,
            registration_ts_ms: now_ms,
            last_renewal_ts_ms: now_ms,
            eviction_ts_ms: 0,
            service_up_ts_ms: 0,
        }
    }

    /// Mark a successful heartbeat.
    pub fn renew(&mut self, now_ms: u64) {
        self.last_renewal_ts_ms = now_ms;
    }

    /// Mark the lease as cancelled. Idempotent.
    pub fn cancel(&mut self, now_ms: u64) {
        if self.eviction_ts_ms == 0 {
            self.eviction_ts_ms = now_ms;
        }
    }

    /// Record the first transition to UP. Later transitions are ignored so
    /// the timestamp keeps pointing at the original service start.
    pub fn service_up(&mut self, now_ms: u64) {
        if self.service_up_ts_ms == 0 {
            self.service_up_ts_ms = now_ms;
        }
    }

    /// Whether the lease is gone: cancelled, or silent past the allowance
    /// window.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        self.eviction_ts_ms > 0
            || now_ms > self.last_renewal_ts_ms + self.expiry_multiplier * self.duration_ms
    }

    /// The registered instance.
    pub fn holder(&self) -> &InstanceInfo {
        &self.holder
    }

    /// Mutable access to the registered instance.
    ///
    /// Only the registry mutator paths may use this.
    pub fn holder_mut(&mut self) -> &mut InstanceInfo {
        &mut self.holder
    }

    /// Configured lease duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// When the lease was created (Unix ms).
    pub fn registration_ts_ms(&self) -> u64 {
        self.registration_ts_ms
    }

    /// Last successful renewal (Unix ms).
    pub fn last_renewal_ts_ms(&self) -> u64 {
        self.last_renewal_ts_ms
    }

    /// When the lease was cancelled or evicted (Unix ms, 0 = live).
    pub fn eviction_ts_ms(&self) -> u64 {
        self.eviction_ts_ms
    }

    /// First transition to UP (Unix ms, 0 = never).
    pub fn service_up_ts_ms(&self) -> u64 {
        self.service_up_ts_ms
    }

    /// Carry forward the service-up timestamp from a replaced lease.
    pub fn set_service_up_ts_ms(&mut self, ts_ms: u64) {
        self.service_up_ts_ms = ts_ms;
    }
}
