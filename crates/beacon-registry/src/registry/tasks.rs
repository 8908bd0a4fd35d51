//! Background maintenance: the eviction sweeper and the change-log
//! pruner.
//!
//! Both run on dedicated tokio intervals and shut down together through
//! the registry's shutdown channel. Neither holds the snapshot gate
//! across a whole pass; eviction reacquires the read side per victim
//! through cancel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;
use tracing::info;

use super::InstanceRegistry;

impl InstanceRegistry {
    /// Spawn the maintenance tasks.
    ///
    /// Takes an owned handle so the tasks can keep the registry alive;
    /// call as `Arc::clone(&registry).start().await`.
    pub async fn start(self: Arc<Self>) {
        let mut tasks = self.tasks.lock().await;

        let registry = Arc::clone(&self);
        let shutdown = self.shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            registry.eviction_loop(shutdown).await;
        }));

        let registry = Arc::clone(&self);
        let shutdown = self.shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            registry.pruner_loop(shutdown).await;
        }));

        info!("registry maintenance tasks started");
    }

    /// Stop the maintenance tasks and wait for them to finish.
    ///
    /// Registry state is not persisted; whatever is in memory is simply
    /// abandoned.
    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);
        let mut tasks = self.tasks.lock().await;
        for handle in tasks.drain(..) {
            let _ = handle.await;
        }
        info!("registry maintenance tasks stopped");
    }

    /// Drop change-log entries older than the retention window.
    ///
    /// Returns how many were dropped. The pruner task calls this on its
    /// interval; it is public so operators can force a prune.
    pub fn prune_change_log(&self) -> usize {
        self.change_log.prune(self.clock.now_ms(), self.config.delta_retention_ms)
    }

    async fn eviction_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        if *shutdown.borrow() {
            return;
        }
        let mut interval = tokio::time::interval(Duration::from_millis(self.config.eviction_interval_ms));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let evicted = self.evict();
                    if evicted > 0 {
                        debug!(evicted, "eviction sweep finished");
                    }
                }
                _ = shutdown.changed() => {
                    debug!("eviction task shutting down");
                    break;
                }
            }
        }
    }

    async fn pruner_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        if *shutdown.borrow() {
            return;
        }
        let mut interval = tokio::time::interval(Duration::from_millis(self.config.delta_pruner_interval_ms));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let pruned = self.prune_change_log();
                    let lapsed = self.overrides.purge_expired(self.clock.now_ms());
                    if pruned > 0 || lapsed > 0 {
                        debug!(pruned, lapsed, "retention windows pruned");
                    }
                }
                _ = shutdown.changed() => {
                    debug!("pruner task shutting down");
                    break;
                }
            }
        }
    }
}
