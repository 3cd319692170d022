// src/lib.rs
// Public library surface for the server binary, the snapshot tool and integration tests.

pub mod api;
pub mod cache;
pub mod config;
pub mod ingest;
pub mod metrics;

use std::sync::Arc;

use axum::Router;

pub use crate::api::{create_router, AppState};
pub use crate::cache::{CacheStatus, CacheView, FeedSource, NewsCache};
pub use crate::config::AppConfig;
pub use crate::ingest::types::{AggregateResult, NewsItem};

use crate::ingest::providers::default_batches;
use crate::ingest::session::{HttpSession, PageSession};
use crate::ingest::ScrapePipeline;

/// Production pipeline: every configured producer over one pooled HTTP session.
pub fn scrape_pipeline(cfg: &AppConfig) -> anyhow::Result<ScrapePipeline> {
    let session: Arc<dyn PageSession> = Arc::new(HttpSession::new()?);
    Ok(ScrapePipeline::new(session, default_batches(&cfg.twitter_handle)))
}

/// API routes plus `/metrics`, over a caller-supplied cache.
pub fn app(cfg: &AppConfig, cache: Arc<NewsCache>) -> anyhow::Result<Router> {
    let metrics = crate::metrics::Metrics::init(cfg.cache_ttl)?;
    let state = AppState::new(cache, cfg.public_dir.clone());
    Ok(create_router(state).merge(metrics.router()))
}
