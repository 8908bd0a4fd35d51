//! Registry configuration.

use std::collections::BTreeSet;
use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Error raised by [`RegistryConfig::validate`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// A fraction-valued field is outside `(0, 1]`.
    #[error("{field} must be within (0, 1], got {value}")]
    FractionOutOfRange {
        /// Offending field name.
        field: &'static str,
        /// Offending value.
        value: f64,
    },

    /// A duration or multiplier field is zero.
    #[error("{field} must be positive")]
    ZeroDuration {
        /// Offending field name.
        field: &'static str,
    },
}

/// All tunables of the registry core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Fraction of the expected renewal rate under which
    /// self-preservation trips and eviction is suppressed.
    pub renewal_percent_threshold: f64,
    /// Eviction sweeper period in milliseconds.
    pub eviction_interval_ms: u64,
    /// How long a change stays replayable through delta reads.
    pub delta_retention_ms: u64,
    /// Change-log pruner period in milliseconds.
    pub delta_pruner_interval_ms: u64,
    /// Capacity of each recent-activity ring.
    pub recent_activity_capacity: usize,
    /// Per-entry access TTL of the operator overrides map.
    pub override_entry_ttl_ms: u64,
    /// Multiplier applied to the lease duration when judging expiry.
    /// Clock-skew allowance inherited from the wire contract; leave at 2.
    pub expiry_duration_multiplier: u64,
    /// Master switch for the eviction circuit breaker.
    pub self_preservation_enabled: bool,
    /// Suppress falling back to remote regions when a local lookup comes
    /// up empty.
    pub disable_transparent_fallback_to_other_region: bool,
    /// Region name to peer URL; consumed by the transport layer that
    /// builds the remote-region handles.
    pub remote_region_urls_with_name: HashMap<String, String>,
    /// Per-region application whitelists for cross-region union views.
    /// An empty set allows every application.
    pub remote_region_app_whitelist: HashMap<String, BTreeSet<String>>,
    /// Whitelist applied to regions without one of their own.
    pub global_app_whitelist: Option<BTreeSet<String>>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            renewal_percent_threshold: 0.85,
            eviction_interval_ms: 60_000,
            delta_retention_ms: 180_000,
            delta_pruner_interval_ms: 30_000,
            recent_activity_capacity: 1_000,
            override_entry_ttl_ms: 3_600_000,
            expiry_duration_multiplier: 2,
            self_preservation_enabled: true,
            disable_transparent_fallback_to_other_region: false,
            remote_region_urls_with_name: HashMap::new(),
            remote_region_app_whitelist: HashMap::new(),
            global_app_whitelist: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl RegistryConfig {
    /// Load scalar fields from `BEACON_*` environment variables, falling
    /// back to the defaults. Region maps and whitelists are wired
    /// programmatically by the embedding server.
    pub fn load() -> Self {
        let defaults = Self::default();
        Self {
            renewal_percent_threshold: env_parse(
                "BEACON_RENEWAL_PERCENT_THRESHOLD",
                defaults.renewal_percent_threshold,
            ),
            eviction_interval_ms: env_parse("BEACON_EVICTION_INTERVAL_MS", defaults.eviction_interval_ms),
            delta_retention_ms: env_parse("BEACON_DELTA_RETENTION_MS", defaults.delta_retention_ms),
            delta_pruner_interval_ms: env_parse(
                "BEACON_DELTA_PRUNER_INTERVAL_MS",
                defaults.delta_pruner_interval_ms,
            ),
            recent_activity_capacity: env_parse(
                "BEACON_RECENT_ACTIVITY_CAPACITY",
                defaults.recent_activity_capacity,
            ),
            override_entry_ttl_ms: env_parse("BEACON_OVERRIDE_ENTRY_TTL_MS", defaults.override_entry_ttl_ms),
            expiry_duration_multiplier: env_parse(
                "BEACON_EXPIRY_DURATION_MULTIPLIER",
                defaults.expiry_duration_multiplier,
            ),
            self_preservation_enabled: env_parse(
                "BEACON_SELF_PRESERVATION_ENABLED",
                defaults.self_preservation_enabled,
            ),
            disable_transparent_fallback_to_other_region: env_parse(
                "BEACON_DISABLE_TRANSPARENT_FALLBACK",
                defaults.disable_transparent_fallback_to_other_region,
            ),
            ..defaults
        }
    }

    /// Check field ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.renewal_percent_threshold > 0.0 && self.renewal_percent_threshold <= 1.0) {
            return Err(ConfigError::FractionOutOfRange {
                field: "renewal_percent_threshold",
                value: self.renewal_percent_threshold,
            });
        }
        for (field, value) in [
            ("eviction_interval_ms", self.eviction_interval_ms),
            ("delta_retention_ms", self.delta_retention_ms),
            ("delta_pruner_interval_ms", self.delta_pruner_interval_ms),
            ("override_entry_ttl_ms", self.override_entry_ttl_ms),
            ("expiry_duration_multiplier", self.expiry_duration_multiplier),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroDuration { field });
            }
        }
        Ok(())
    }

    /// Whitelist applying to `region`: its own, else the global one.
    pub fn app_whitelist(&self, region: &str) -> Option<&BTreeSet<String>> {
        self.remote_region_app_whitelist.get(region).or(self.global_app_whitelist.as_ref())
    }

    /// Whether `app_name` may be pulled from `region` into union views.
    /// A missing or empty whitelist allows everything.
    pub fn allows_remote_app(&self, region: &str, app_name: &str) -> bool {
        match self.app_whitelist(region) {
            None => true,
            Some(set) if set.is_empty() => true,
            Some(set) => set.contains(app_name),
        }
    }
}
