//! Background Tasks Module
//!
//! Periodic maintenance owned by an explicit lifecycle handle.
//!
//! # Tasks
//! - Cache sweep: removes expired memory cache entries
//! - Stats export: records memory cache statistics as metrics
//! - Metrics prune: drops monitoring data older than the retention window

mod cleanup;
mod stats;

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api::AppState;
use crate::config::Config;

pub use cleanup::{spawn_prune_task, spawn_sweep_task};
pub use stats::spawn_stats_export_task;

/// Handles of the running maintenance tasks.
#[derive(Debug, Default)]
pub struct BackgroundTasks {
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Spawns every maintenance task for `state`.
    pub fn start(state: &AppState, config: &Config) -> Self {
        let memory = state.cache.memory_cache().clone();
        let handles = vec![
            spawn_sweep_task(memory.clone(), secs(config.sweep_interval)),
            spawn_stats_export_task(
                memory,
                state.monitoring.clone(),
                secs(config.stats_interval),
            ),
            spawn_prune_task(
                state.monitoring.clone(),
                secs(config.metrics_prune_interval),
            ),
        ];
        info!(count = handles.len(), "Background tasks started");
        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Aborts every task.
    pub fn shutdown(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
        warn!("Background tasks aborted");
    }
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

/// Interval in seconds, never zero.
fn secs(value: u64) -> Duration {
    Duration::from_secs(value.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheImplementation;

    fn memory_config() -> Config {
        Config {
            cache_implementation: CacheImplementation::Memory,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let config = memory_config();
        let state = AppState::from_config(&config);

        let mut tasks = BackgroundTasks::start(&state, &config);
        assert_eq!(tasks.len(), 3);

        tasks.shutdown();
        assert!(tasks.is_empty());
    }
}
