//! Self-preservation: the rate-gated circuit breaker around eviction.

mod support;

use beacon_registry::RegistryConfig;
use beacon_types::InstanceStatus;

use support::harness;
use support::instance;
use support::T0;

#[test]
fn threshold_tracks_registered_population() {
    let h = harness(RegistryConfig::default());
    for i in 0..100 {
        h.registry.register(instance("shop", &format!("i-{i}"), InstanceStatus::Up), 30, false);
    }

    // Two heartbeats per instance per minute, 85% floor.
    assert_eq!(h.registry.expected_renewals_per_minute(), 200);
    assert_eq!(h.registry.renewal_threshold(), 170);
}

#[test]
fn reregistration_does_not_inflate_expected_rate() {
    let h = harness(RegistryConfig::default());
    h.registry.register(instance("shop", "i-1", InstanceStatus::Up), 30, false);
    h.registry.register(instance("shop", "i-1", InstanceStatus::Up), 30, false);
    assert_eq!(h.registry.expected_renewals_per_minute(), 2);
}

#[test]
fn eviction_suppressed_when_renewals_stop() {
    let h = harness(RegistryConfig::default());
    for i in 0..100 {
        h.registry.register(instance("shop", &format!("i-{i}"), InstanceStatus::Up), 15, false);
    }

    // Heartbeats stop entirely; every lease is long past its window.
    h.clock.set(T0 + 400_000);
    assert_eq!(h.registry.renews_last_minute(), 0);
    assert!(!h.registry.lease_expiration_enabled());
    assert_eq!(h.registry.evict(), 0);
    assert_eq!(h.registry.instance_count(), 100);
}

#[test]
fn eviction_proceeds_when_renewals_meet_threshold() {
    let h = harness(RegistryConfig::default());
    h.registry.register(instance("shop", "i-1", InstanceStatus::Up), 5, false);
    assert_eq!(h.registry.renewal_threshold(), 1);

    h.clock.set(T0 + 10_000);
    assert!(h.registry.renew("shop", "i-1", false));
    assert!(h.registry.renew("shop", "i-1", false));

    // A window later the meter shows two renewals, above the floor, and
    // the lease (renewed at +10s, doubled 5s duration) is long expired.
    h.clock.set(T0 + 70_000);
    assert!(h.registry.lease_expiration_enabled());
    assert_eq!(h.registry.evict(), 1);
    assert_eq!(h.registry.instance_count(), 0);
}

#[test]
fn switch_off_always_allows_expiration() {
    let config = RegistryConfig {
        self_preservation_enabled: false,
        ..RegistryConfig::default()
    };
    let h = harness(config);
    for i in 0..10 {
        h.registry.register(instance("shop", &format!("i-{i}"), InstanceStatus::Up), 15, false);
    }

    h.clock.set(T0 + 400_000);
    assert!(h.registry.lease_expiration_enabled());
    assert_eq!(h.registry.evict(), 10);
}

#[test]
fn zero_threshold_keeps_expiration_disabled() {
    // Nothing registered: no expected rate, no basis to evict.
    let h = harness(RegistryConfig::default());
    assert_eq!(h.registry.renewal_threshold(), 0);
    assert!(!h.registry.lease_expiration_enabled());
}
