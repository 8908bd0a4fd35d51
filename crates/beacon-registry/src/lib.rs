//! In-memory service registry core for a discovery control plane.
//!
//! The registry holds short-lived leases for live service instances,
//! accepts registration, heartbeat, cancellation, and status-override
//! mutations from many concurrent clients, expires dead leases on a
//! timer, and exposes point, snapshot, and delta read views — optionally
//! unioned with peer registries in other regions.
//!
//! # Architecture
//!
//! - A two-level concurrent map (application → instance id → lease) holds
//!   the authoritative state; read views hand back decorated value
//!   copies.
//! - Every mutation appends a value-copy record to a time-windowed change
//!   log that drives the delta views.
//! - A periodic sweeper cancels expired leases, gated by
//!   **self-preservation**: when the aggregate heartbeat rate drops below
//!   the expected floor, eviction is suppressed rather than mass-evicting
//!   healthy instances through a partition.
//! - The response cache above the core is invalidated before every
//!   mutator returns, so discovery reads never serve state older than an
//!   acknowledged write.
//!
//! The registry is volatile and AP by design: no durability, no
//! cross-peer consistency. The replication transport, the REST surface,
//! the response cache, and the autoscaling-group lookup live outside this
//! crate and are reached through the traits in [`cache`], [`remote`], and
//! [`arbiter`].

mod arbiter;
mod cache;
mod changelog;
mod clock;
mod config;
mod lease;
mod metrics;
mod overrides;
mod rate;
mod recent;
mod registry;
mod remote;

pub use arbiter::effective_status;
pub use arbiter::AlwaysEnabledAsg;
pub use arbiter::AsgStatusOracle;
pub use cache::NullResponseCache;
pub use cache::ResponseCache;
pub use changelog::ChangeLog;
pub use changelog::ChangeRecord;
pub use clock::Clock;
pub use clock::ManualClock;
pub use clock::SystemClock;
pub use config::ConfigError;
pub use config::RegistryConfig;
pub use lease::Lease;
pub use metrics::RegistryMetrics;
pub use metrics::RegistryMetricsSnapshot;
pub use overrides::StatusOverrides;
pub use rate::RenewalCapacity;
pub use rate::RenewalRateMeter;
pub use recent::ActivityEntry;
pub use recent::ActivityRing;
pub use registry::InstanceRegistry;
pub use remote::RemoteRegionRegistry;
pub use remote::RemoteRegions;
