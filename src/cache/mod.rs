//! Upstream response cache
//!
//! - `config`: per-namespace TTL and capacity presets
//! - `store`: namespaced TTL store with LRU eviction
//! - `orchestrator`: get-or-populate wrapper (`cache_wrapper`)
//!
//! Expired entries are invisible on read; `spawn_sweeper` additionally frees
//! their memory in the background.

pub mod config;
pub mod orchestrator;
pub mod store;

pub use config::NamespaceConfig;
pub use orchestrator::{CacheOrchestrator, CacheValue, OrchestratorStats};
pub use store::{CacheStats, CacheStore};

use crate::logger::{self, LogTag};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::interval;

/// Periodically drop expired entries until `shutdown` is notified
pub fn spawn_sweeper<V>(
    store: Arc<CacheStore<V>>,
    sweep_interval: Duration,
    shutdown: Arc<Notify>,
) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut timer = interval(sweep_interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // First tick completes immediately, nothing has expired yet
        timer.tick().await;

        logger::debug(
            LogTag::Cache,
            &format!("Cache sweeper started (interval={}s)", sweep_interval.as_secs()),
        );

        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    logger::debug(LogTag::Cache, "Cache sweeper shutting down");
                    break;
                }
                _ = timer.tick() => {
                    let removed = store.sweep_expired();
                    if removed > 0 {
                        logger::debug(
                            LogTag::Cache,
                            &format!("Swept {} expired cache entries", removed),
                        );
                    }
                }
            }
        }
    })
}
