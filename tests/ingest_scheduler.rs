// tests/ingest_scheduler.rs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use web3_news_aggregator::cache::{FeedSource, NewsCache};
use web3_news_aggregator::ingest::finalize;
use web3_news_aggregator::ingest::scheduler::spawn_refresh_scheduler;
use web3_news_aggregator::ingest::time::now_ms;
use web3_news_aggregator::{AggregateResult, NewsItem};

struct Ticking(AtomicUsize);

#[async_trait]
impl FeedSource for Ticking {
    async fn refresh(&self) -> Result<AggregateResult> {
        let n = self.0.fetch_add(1, Ordering::SeqCst);
        let now = now_ms();
        let item = NewsItem {
            title: format!("Scheduled headline {n}"),
            content: String::new(),
            link: String::new(),
            source: "Ticker".into(),
            source_color: "#000000".into(),
            is_important: false,
            timestamp: now,
        };
        Ok(finalize(vec![item], now))
    }
}

#[tokio::test]
async fn ticks_refresh_a_stale_cache() {
    let src = Arc::new(Ticking(AtomicUsize::new(0)));
    let cache = Arc::new(NewsCache::new(src.clone(), Duration::from_millis(1)));

    let handle = spawn_refresh_scheduler(cache.clone(), Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(150)).await;
    handle.abort();

    assert!(src.0.load(Ordering::SeqCst) >= 2);
    assert_eq!(cache.view().count(), 1);
}

#[tokio::test]
async fn ticks_leave_a_fresh_cache_alone() {
    let src = Arc::new(Ticking(AtomicUsize::new(0)));
    let cache = Arc::new(NewsCache::new(src.clone(), Duration::from_secs(3600)));

    let handle = spawn_refresh_scheduler(cache.clone(), Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(150)).await;
    handle.abort();

    assert_eq!(src.0.load(Ordering::SeqCst), 1, "only the first tick found it cold");
}
