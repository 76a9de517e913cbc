//! Cache statistics export task.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::MemoryCache;
use crate::monitoring::{MonitoringService, Tags};

/// Spawns a task that exports memory cache statistics every `interval` as
/// the `cache.hit_ratio` and `cache.keys` metrics.
pub fn spawn_stats_export_task(
    cache: MemoryCache,
    monitoring: Arc<MonitoringService>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Starting cache stats export task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let stats = cache.stats().await;
            monitoring.track_metric("cache.hit_ratio", stats.hit_ratio, Tags::new());
            monitoring.track_metric("cache.keys", stats.keys as f64, Tags::new());
            debug!(
                hit_ratio = stats.hit_ratio,
                keys = stats.keys,
                "Cache stats exported"
            );
        }
    })
}
