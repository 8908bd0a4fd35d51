//! Instance descriptor, status model, and lease summary.

use std::collections::HashMap;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Default client heartbeat interval, in seconds.
pub const DEFAULT_LEASE_RENEWAL_INTERVAL_SECS: u32 = 30;

/// Default lease duration granted when the client does not specify one,
/// in seconds.
pub const DEFAULT_LEASE_DURATION_SECS: u32 = 90;

/// Status of a registered service instance.
///
/// Closed set shared with clients over the wire; the serialized names are
/// load-bearing (they feed the reconcile hash).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    /// Ready to receive traffic.
    Up,
    /// The instance reported itself unhealthy.
    Down,
    /// Still initializing, not ready for traffic.
    Starting,
    /// Taken out of traffic, usually by an operator.
    OutOfService,
    /// No authoritative status is known.
    #[default]
    Unknown,
}

impl InstanceStatus {
    /// Wire-format name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
            Self::Starting => "STARTING",
            Self::OutOfService => "OUT_OF_SERVICE",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Parse from the wire-format name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "UP" => Some(Self::Up),
            "DOWN" => Some(Self::Down),
            "STARTING" => Some(Self::Starting),
            "OUT_OF_SERVICE" => Some(Self::OutOfService),
            "UNKNOWN" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a status string is not in the closed set.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid instance status: {0}")]
pub struct InvalidInstanceStatus(pub String);

impl FromStr for InstanceStatus {
    type Err = InvalidInstanceStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| InvalidInstanceStatus(s.to_string()))
    }
}

/// Kind of registry mutation, recorded on instances flowing through the
/// change log so delta clients can replay them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    /// The instance was registered.
    Added,
    /// The instance status or override changed.
    Modified,
    /// The instance was cancelled or evicted.
    Deleted,
}

impl ActionType {
    /// Wire-format name of this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "ADDED",
            Self::Modified => "MODIFIED",
            Self::Deleted => "DELETED",
        }
    }
}

/// Summary of an instance's lease, rebuilt freshly on every read view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseInfo {
    /// Client heartbeat interval in seconds.
    pub renewal_interval_secs: u32,
    /// Lease duration in seconds.
    pub duration_secs: u32,
    /// When the lease was created (Unix ms).
    pub registration_ts_ms: u64,
    /// Last successful renewal (Unix ms).
    pub last_renewal_ts_ms: u64,
    /// When the lease was cancelled or evicted (Unix ms, 0 = never).
    pub eviction_ts_ms: u64,
    /// First transition to UP (Unix ms, 0 = never).
    pub service_up_ts_ms: u64,
}

impl Default for LeaseInfo {
    fn default() -> Self {
        Self {
            renewal_interval_secs: DEFAULT_LEASE_RENEWAL_INTERVAL_SECS,
            duration_secs: DEFAULT_LEASE_DURATION_SECS,
            registration_ts_ms: 0,
            last_renewal_ts_ms: 0,
            eviction_ts_ms: 0,
            service_up_ts_ms: 0,
        }
    }
}

/// Descriptor of one service instance.
///
/// The registry core is the only writer of the authoritative copy; the
/// dirty timestamp is the client-supplied version used for conflict
/// resolution and must never move backwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct InstanceInfo {
    /// Application this instance belongs to.
    pub app_name: String,
    /// Unique instance identifier within the application.
    pub instance_id: String,
    /// Network address, host:port.
    pub address: String,
    /// Virtual address this instance serves, if any.
    pub vip_address: Option<String>,
    /// Secure virtual address this instance serves, if any.
    pub secure_vip_address: Option<String>,
    /// Autoscaling group the instance belongs to, if any.
    pub asg_name: Option<String>,
    /// Effective status.
    pub status: InstanceStatus,
    /// Operator-imposed status, `Unknown` when none.
    pub overridden_status: InstanceStatus,
    /// Mutation kind, present on instances emitted through the change log.
    pub action_type: Option<ActionType>,
    /// Client-supplied monotonic version (Unix ms).
    pub last_dirty_ts_ms: u64,
    /// Server-assigned time of the last mutation (Unix ms).
    pub last_updated_ts_ms: u64,
    /// Lease summary, decorated onto read copies.
    pub lease_info: Option<LeaseInfo>,
    /// True on copies handed out by the server coordinating discovery.
    pub is_coordinating_discovery_server: bool,
    /// Free-form instance metadata.
    pub metadata: HashMap<String, String>,
}

impl InstanceInfo {
    /// Create a minimal descriptor for the given identity.
    pub fn new(app_name: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            instance_id: instance_id.into(),
            ..Self::default()
        }
    }

    /// Set the status, bumping the dirty timestamp if it actually changed.
    pub fn set_status(&mut self, status: InstanceStatus, now_ms: u64) {
        if self.status != status {
            self.status = status;
            self.last_dirty_ts_ms = now_ms;
        }
    }

    /// Set the status without touching the dirty timestamp.
    ///
    /// Used when the server reconciles its own opinion onto the instance;
    /// the client's version must stay authoritative for conflict
    /// resolution.
    pub fn set_status_without_dirty(&mut self, status: InstanceStatus) {
        self.status = status;
    }

    /// Stamp the server-assigned last-updated time.
    pub fn set_last_updated(&mut self, now_ms: u64) {
        self.last_updated_ts_ms = now_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_names_round_trip() {
        assert_eq!(serde_json::to_string(&InstanceStatus::OutOfService).unwrap(), "\"OUT_OF_SERVICE\"");
        assert_eq!(serde_json::from_str::<InstanceStatus>("\"UP\"").unwrap(), InstanceStatus::Up);
        assert_eq!(InstanceStatus::parse("out_of_service"), Some(InstanceStatus::OutOfService));
        assert_eq!(InstanceStatus::parse("bogus"), None);
        assert!("bogus".parse::<InstanceStatus>().is_err());
    }

    #[test]
    fn set_status_bumps_dirty_only_on_change() {
        let mut info = InstanceInfo::new("app", "i-1");
        info.last_dirty_ts_ms = 100;

        info.set_status(InstanceStatus::Up, 200);
        assert_eq!(info.last_dirty_ts_ms, 200);

        // Same status again: no bump.
        info.set_status(InstanceStatus::Up, 300);
        assert_eq!(info.last_dirty_ts_ms, 200);

        info.set_status_without_dirty(InstanceStatus::Down);
        assert_eq!(info.status, InstanceStatus::Down);
        assert_eq!(info.last_dirty_ts_ms, 200);
    }

    #[test]
    fn default_status_is_unknown() {
        let info = InstanceInfo::new("app", "i-1");
        assert_eq!(info.status, InstanceStatus::Unknown);
        assert_eq!(info.overridden_status, InstanceStatus::Unknown);
        assert!(info.action_type.is_none());
    }
}
