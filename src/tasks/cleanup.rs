//! Cleanup Tasks
//!
//! Background loops that sweep expired memory cache entries and prune old
//! monitoring data.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::MemoryCache;
use crate::monitoring::MonitoringService;

/// Spawns a task that removes expired memory cache entries every `interval`.
///
/// The returned handle is aborted on shutdown.
pub fn spawn_sweep_task(cache: MemoryCache, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Starting cache sweep task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.sweep_expired().await;
            if removed > 0 {
                info!("Cache sweep: removed {} expired entries", removed);
            } else {
                debug!("Cache sweep: no expired entries found");
            }
        }
    })
}

/// Spawns a task that prunes monitoring data older than its retention every `interval`.
pub fn spawn_prune_task(monitoring: Arc<MonitoringService>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Starting metrics prune task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let summary = monitoring.prune();
            let removed = summary.metrics_removed + summary.queries_removed;
            if removed > 0 {
                info!("Metrics prune: removed {} old samples", removed);
            } else {
                debug!("Metrics prune: nothing older than retention");
            }
        }
    })
}
