// src/ingest/mod.rs
pub mod config;
pub mod extract;
pub mod normalize;
pub mod providers;
pub mod scheduler;
pub mod session;
pub mod snapshot;
pub mod time;
pub mod types;

use crate::cache::FeedSource;
use crate::ingest::session::PageSession;
use crate::ingest::types::{AggregateResult, NewsItem, ProducerOutcome, ProducerReport, SourceProvider};
use anyhow::{bail, Result};
use futures::future::join_all;
use futures::FutureExt;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_items_total", "Items produced after normalization.");
        describe_counter!(
            "ingest_rejected_total",
            "Raw records dropped by the record normalizer."
        );
        describe_counter!(
            "ingest_dedup_total",
            "Items removed as near-duplicate titles."
        );
        describe_counter!(
            "ingest_provider_errors_total",
            "Producer failures converted to empty results."
        );
        describe_histogram!("ingest_provider_ms", "Producer run time in milliseconds.");
    });
}

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[a-z][^>]*>").expect("tag regex"));

/// Normalize display text: decode entities, strip tags, collapse whitespace.
pub fn clean_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    out = RE_TAGS.replace_all(&out, "").to_string();

    // 3) Collapse whitespace (incl. nbsp and full-width spaces)
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cross-source duplicate key: lowercase, no whitespace, first 40 chars.
pub fn dedup_key(title: &str) -> String {
    title
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .take(40)
        .collect()
}

/// Stable sort by timestamp (newest first), then keep the first item per
/// [`dedup_key`]. Returns (kept, removed).
pub fn sort_and_dedup(mut items: Vec<NewsItem>) -> (Vec<NewsItem>, usize) {
    items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let mut seen: HashSet<String> = HashSet::with_capacity(items.len());
    let mut keep = Vec::with_capacity(items.len());
    let mut dropped = 0usize;
    for item in items {
        if seen.insert(dedup_key(&item.title)) {
            keep.push(item);
        } else {
            dropped += 1;
        }
    }
    (keep, dropped)
}

pub fn finalize(items: Vec<NewsItem>, now_ms: i64) -> AggregateResult {
    let (data, dropped) = sort_and_dedup(items);
    counter!("ingest_dedup_total").increment(dropped as u64);
    AggregateResult {
        update_time: now_ms,
        count: data.len(),
        data,
    }
}

/// Run one producer behind its own deadline. Never fails: errors, panics
/// and timeouts become an empty result with a reason.
pub async fn produce(provider: &dyn SourceProvider, session: &dyn PageSession) -> (Vec<NewsItem>, ProducerReport) {
    let t0 = Instant::now();
    let name = provider.name().to_string();

    let guarded = AssertUnwindSafe(provider.fetch_latest(session)).catch_unwind();
    let (items, outcome) =
        match tokio::time::timeout(provider.timeout(), guarded).await {
            Ok(Ok(Ok(items))) if items.is_empty() => (
                items,
                ProducerOutcome::Empty {
                    reason: "no records matched".to_string(),
                },
            ),
            Ok(Ok(Ok(items))) => {
                let n = items.len();
                (items, ProducerOutcome::Fetched(n))
            }
            Ok(Ok(Err(e))) => {
                tracing::warn!(target: "ingest", provider = %name, error = ?e, "provider error");
                counter!("ingest_provider_errors_total").increment(1);
                (Vec::new(), ProducerOutcome::Empty { reason: format!("{e:#}") })
            }
            Ok(Err(_panic)) => {
                tracing::warn!(target: "ingest", provider = %name, "provider panicked");
                counter!("ingest_provider_errors_total").increment(1);
                (
                    Vec::new(),
                    ProducerOutcome::Empty {
                        reason: "panicked".to_string(),
                    },
                )
            }
            Err(_) => {
                tracing::warn!(
                    target: "ingest",
                    provider = %name,
                    timeout_ms = provider.timeout().as_millis() as u64,
                    "provider timed out"
                );
                counter!("ingest_provider_errors_total").increment(1);
                (
                    Vec::new(),
                    ProducerOutcome::Empty {
                        reason: "timed out".to_string(),
                    },
                )
            }
        };

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("ingest_provider_ms").record(ms);
    counter!("ingest_items_total").increment(items.len() as u64);

    let report = ProducerReport {
        source: name,
        outcome,
        elapsed_ms: ms as u64,
    };
    (items, report)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    Concurrent,
    Sequential,
}

/// Group of producers sharing a concurrency policy.
pub struct ProviderBatch {
    pub label: &'static str,
    pub mode: BatchMode,
    pub providers: Vec<Box<dyn SourceProvider>>,
}

impl ProviderBatch {
    pub fn concurrent(label: &'static str, providers: Vec<Box<dyn SourceProvider>>) -> Self {
        Self {
            label,
            mode: BatchMode::Concurrent,
            providers,
        }
    }

    pub fn sequential(label: &'static str, providers: Vec<Box<dyn SourceProvider>>) -> Self {
        Self {
            label,
            mode: BatchMode::Sequential,
            providers,
        }
    }
}

#[derive(Debug, Default)]
pub struct Aggregation {
    pub items: Vec<NewsItem>,
    pub reports: Vec<ProducerReport>,
}

/// Invoke every producer, batch by batch, and concatenate what they return.
/// No ordering, no normalization; one producer failing costs only its own items.
pub async fn aggregate_all(batches: &[ProviderBatch], session: &dyn PageSession) -> Aggregation {
    ensure_metrics_described();

    let mut agg = Aggregation::default();
    for batch in batches {
        let results = match batch.mode {
            BatchMode::Concurrent => {
                join_all(batch.providers.iter().map(|p| produce(p.as_ref(), session))).await
            }
            BatchMode::Sequential => {
                let mut out = Vec::with_capacity(batch.providers.len());
                for p in &batch.providers {
                    out.push(produce(p.as_ref(), session).await);
                }
                out
            }
        };

        let before = agg.items.len();
        for (mut items, report) in results {
            agg.items.append(&mut items);
            agg.reports.push(report);
        }
        tracing::debug!(
            target: "ingest",
            batch = batch.label,
            items = agg.items.len() - before,
            "batch done"
        );
    }
    agg
}

/// Run the full pipeline once: aggregate, sort, dedup.
pub async fn run_once(batches: &[ProviderBatch], session: &dyn PageSession) -> (AggregateResult, Vec<ProducerReport>) {
    let agg = aggregate_all(batches, session).await;
    let result = finalize(agg.items, time::now_ms());
    (result, agg.reports)
}

/// The production [`FeedSource`]: all configured producers over one shared session.
pub struct ScrapePipeline {
    session: Arc<dyn PageSession>,
    batches: Vec<ProviderBatch>,
}

impl ScrapePipeline {
    pub fn new(session: Arc<dyn PageSession>, batches: Vec<ProviderBatch>) -> Self {
        Self { session, batches }
    }
}

#[async_trait::async_trait]
impl FeedSource for ScrapePipeline {
    async fn refresh(&self) -> Result<AggregateResult> {
        let (result, reports) = run_once(&self.batches, self.session.as_ref()).await;

        let failed = reports.iter().filter(|r| r.is_empty()).count();
        for r in &reports {
            tracing::info!(
                target: "ingest",
                provider = %r.source,
                outcome = ?r.outcome,
                elapsed_ms = r.elapsed_ms,
                "provider finished"
            );
        }
        if !reports.is_empty() && failed == reports.len() {
            bail!("all {} producers came back empty", reports.len());
        }

        tracing::info!(
            target: "ingest",
            kept = result.count,
            producers = reports.len(),
            empty = failed,
            "pipeline run complete"
        );
        Ok(result)
    }
}
