//! Background eviction and pruning tasks.

mod support;

use std::sync::Arc;
use std::time::Duration;

use beacon_registry::RegistryConfig;
use beacon_types::InstanceStatus;

use support::harness;
use support::instance;
use support::T0;

fn fast_config() -> RegistryConfig {
    RegistryConfig {
        eviction_interval_ms: 20,
        delta_pruner_interval_ms: 20,
        self_preservation_enabled: false,
        ..RegistryConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn background_tasks_evict_and_prune() {
    let h = harness(fast_config());
    h.registry.register(instance("shop", "i-1", InstanceStatus::Up), 5, false);

    // Move far past both the lease window and the delta retention.
    h.clock.set(T0 + 400_000);

    Arc::clone(&h.registry).start().await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    h.registry.stop().await;

    assert_eq!(h.registry.instance_count(), 0);
    let delta = h.registry.get_application_deltas_from_multiple_regions(Some(&[]));
    // The registration record aged out; the eviction record from the
    // sweep is fresh relative to the (manual) clock and stays.
    let records = delta.get_registered_application("shop").map(|app| app.len()).unwrap_or(0);
    assert!(records <= 1, "stale records survived pruning: {records}");
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_is_safe_without_start() {
    let h = harness(fast_config());
    h.registry.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn tasks_shut_down_promptly() {
    let h = harness(fast_config());
    Arc::clone(&h.registry).start().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    tokio::time::timeout(Duration::from_secs(5), h.registry.stop())
        .await
        .expect("maintenance tasks failed to stop");
}
