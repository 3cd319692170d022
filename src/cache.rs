// src/cache.rs
//! Snapshot cache in front of the scrape pipeline.
//!
//! - Fresh snapshots are served as-is.
//! - Stale or cold snapshots trigger one refresh; callers arriving while it
//!   runs get the current snapshot immediately (possibly empty) and never wait.
//! - A failed or panicking refresh leaves the previous snapshot in place.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::FutureExt;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::ingest::time::now_ms;
use crate::ingest::types::{AggregateResult, NewsItem};

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Whatever produces a full aggregate on demand.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn refresh(&self) -> Result<AggregateResult>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// No data held.
    Cold,
    Fresh,
    /// Data held, older than the TTL.
    Stale,
}

/// Read-only view handed to callers. Cloning shares the item list.
#[derive(Debug, Clone, Default)]
pub struct CacheView {
    pub data: Arc<Vec<NewsItem>>,
    /// Unix ms of the last successful refresh; 0 if never or invalidated.
    pub last_update: i64,
}

impl CacheView {
    pub fn count(&self) -> usize {
        self.data.len()
    }

    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.last_update)
    }
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("news_cache_refresh_total", "Successful cache refreshes.");
        describe_counter!(
            "news_cache_refresh_failures_total",
            "Refreshes that failed or panicked (previous snapshot kept)."
        );
        describe_counter!(
            "news_cache_stale_served_total",
            "Requests answered with the current snapshot while a refresh was running."
        );
        describe_gauge!("news_cache_items", "Items held by the news cache.");
        describe_gauge!(
            "news_cache_last_refresh_ts",
            "Unix ts (ms) of the last successful refresh."
        );
    });
}

/// Clears the in-flight flag when dropped, including on panic or cancellation.
struct RefreshGuard<'a>(&'a AtomicBool);

impl<'a> RefreshGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct NewsCache {
    source: Arc<dyn FeedSource>,
    ttl: Duration,
    state: RwLock<CacheView>,
    updating: AtomicBool,
}

impl NewsCache {
    pub fn new(source: Arc<dyn FeedSource>, ttl: Duration) -> Self {
        ensure_metrics_described();
        Self {
            source,
            ttl,
            state: RwLock::new(CacheView::default()),
            updating: AtomicBool::new(false),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current snapshot without triggering anything.
    pub fn view(&self) -> CacheView {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_updating(&self) -> bool {
        self.updating.load(Ordering::Acquire)
    }

    pub fn status_at(&self, now_ms: i64) -> CacheStatus {
        let view = self.view();
        if view.data.is_empty() {
            CacheStatus::Cold
        } else if view.age_ms(now_ms) >= self.ttl.as_millis() as i64 {
            CacheStatus::Stale
        } else {
            CacheStatus::Fresh
        }
    }

    pub fn status(&self) -> CacheStatus {
        self.status_at(now_ms())
    }

    /// Force the next [`get`](Self::get) to refresh regardless of age.
    /// Data stays available to concurrent readers.
    pub fn invalidate(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.last_update = 0;
        debug!(target: "cache", "invalidated");
    }

    pub async fn get(&self) -> CacheView {
        if self.status() == CacheStatus::Fresh {
            return self.view();
        }

        let Some(_guard) = RefreshGuard::acquire(&self.updating) else {
            counter!("news_cache_stale_served_total").increment(1);
            debug!(target: "cache", "refresh in flight, serving current snapshot");
            return self.view();
        };

        // Another caller may have finished a refresh between the check and the acquire.
        if self.status() == CacheStatus::Fresh {
            return self.view();
        }

        self.refresh_now().await;
        self.view()
    }

    async fn refresh_now(&self) {
        info!(target: "cache", status = ?self.status(), "refreshing");
        match AssertUnwindSafe(self.source.refresh()).catch_unwind().await {
            Ok(Ok(result)) => self.store(result),
            Ok(Err(e)) => {
                counter!("news_cache_refresh_failures_total").increment(1);
                warn!(target: "cache", error = ?e, "refresh failed, keeping previous snapshot");
            }
            Err(_) => {
                counter!("news_cache_refresh_failures_total").increment(1);
                error!(target: "cache", "refresh panicked, keeping previous snapshot");
            }
        }
    }

    fn store(&self, result: AggregateResult) {
        let now = now_ms();
        let count = result.data.len();
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.data = Arc::new(result.data);
            state.last_update = now;
        }
        counter!("news_cache_refresh_total").increment(1);
        gauge!("news_cache_items").set(count as f64);
        gauge!("news_cache_last_refresh_ts").set(now as f64);
        info!(target: "cache", count, "snapshot stored");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Counting {
        calls: AtomicUsize,
        items: usize,
    }

    #[async_trait]
    impl FeedSource for Counting {
        async fn refresh(&self) -> Result<AggregateResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let data = (0..self.items)
                .map(|i| NewsItem {
                    title: format!("Headline number {i}"),
                    content: String::new(),
                    link: String::new(),
                    source: "Test".into(),
                    source_color: "#000000".into(),
                    is_important: false,
                    timestamp: 1_000 - i as i64,
                })
                .collect::<Vec<_>>();
            Ok(AggregateResult {
                update_time: now_ms(),
                count: data.len(),
                data,
            })
        }
    }

    fn cache(items: usize, ttl: Duration) -> (Arc<Counting>, NewsCache) {
        let src = Arc::new(Counting {
            calls: AtomicUsize::new(0),
            items,
        });
        let cache = NewsCache::new(src.clone(), ttl);
        (src, cache)
    }

    #[tokio::test]
    async fn cold_then_fresh() {
        let (src, cache) = cache(3, DEFAULT_TTL);
        assert_eq!(cache.status(), CacheStatus::Cold);

        let first = cache.get().await;
        assert_eq!(first.count(), 3);
        assert!(first.last_update > 0);
        assert_eq!(cache.status(), CacheStatus::Fresh);

        let second = cache.get().await;
        assert!(Arc::ptr_eq(&first.data, &second.data));
        assert_eq!(src.calls.load(Ordering::SeqCst), 1);
        assert!(!cache.is_updating());
    }

    #[tokio::test]
    async fn stale_after_ttl() {
        let (src, cache) = cache(2, Duration::from_millis(50));
        let v = cache.get().await;
        assert_eq!(cache.status_at(v.last_update + 10), CacheStatus::Fresh);
        assert_eq!(cache.status_at(v.last_update + 50), CacheStatus::Stale);

        tokio::time::sleep(Duration::from_millis(60)).await;
        cache.get().await;
        assert_eq!(src.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_refresh_stays_cold() {
        let (src, cache) = cache(0, DEFAULT_TTL);
        assert_eq!(cache.get().await.count(), 0);
        assert_eq!(cache.status(), CacheStatus::Cold);
        cache.get().await;
        assert_eq!(src.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_keeps_data_but_forces_refresh() {
        let (src, cache) = cache(1, DEFAULT_TTL);
        cache.get().await;
        cache.invalidate();

        let v = cache.view();
        assert_eq!(v.last_update, 0);
        assert_eq!(v.count(), 1);
        assert_eq!(cache.status(), CacheStatus::Stale);

        cache.get().await;
        assert_eq!(src.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn guard_is_exclusive_and_released_on_drop() {
        let flag = AtomicBool::new(false);
        let g = RefreshGuard::acquire(&flag).expect("first acquire");
        assert!(RefreshGuard::acquire(&flag).is_none());
        drop(g);
        assert!(RefreshGuard::acquire(&flag).is_some());
    }
}
