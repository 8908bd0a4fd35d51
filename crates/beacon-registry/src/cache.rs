//! Response-cache contract consumed by the registry.
//!
//! The discovery layer keeps rendered responses in a cache keyed by
//! application and VIP addresses. The registry does not know how that
//! cache works; it only promises to invalidate the affected keys before
//! every mutator returns, and reads the cache's monotonic version counters
//! when building deltas.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

/// Invalidate-and-version interface of the response cache.
pub trait ResponseCache: Send + Sync {
    /// Drop the cached responses for an application and its VIPs.
    ///
    /// Called with the addresses captured at mutation time, after the
    /// mutation is visible to readers.
    fn invalidate(&self, app_name: &str, vip_address: Option<&str>, secure_vip_address: Option<&str>);

    /// Monotonic version of the single-region delta payload.
    fn version_delta(&self) -> u64;

    /// Monotonic version of the multi-region delta payload.
    fn version_delta_with_regions(&self) -> u64;
}

/// Cache stub for deployments and tests that run without a response
/// cache: invalidations are dropped, versions still advance.
#[derive(Debug, Default)]
pub struct NullResponseCache {
    version_delta: AtomicU64,
    version_delta_with_regions: AtomicU64,
}

impl NullResponseCache {
    /// Create a stub with both counters at zero.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResponseCache for NullResponseCache {
    fn invalidate(&self, _app_name: &str, _vip_address: Option<&str>, _secure_vip_address: Option<&str>) {}

    fn version_delta(&self) -> u64 {
        self.version_delta.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn version_delta_with_regions(&self) -> u64 {
        self.version_delta_with_regions.fetch_add(1, Ordering::SeqCst) + 1
    }
}
