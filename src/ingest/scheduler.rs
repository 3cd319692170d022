// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::cache::NewsCache;

/// Periodically ask the cache for data; it refreshes only when stale or cold.
/// The first tick fires immediately.
pub fn spawn_refresh_scheduler(cache: Arc<NewsCache>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let view = cache.get().await;
            tracing::info!(
                target: "ingest",
                items = view.count(),
                last_update = view.last_update,
                status = ?cache.status(),
                "scheduled refresh tick"
            );
        }
    })
}
