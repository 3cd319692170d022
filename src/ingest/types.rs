// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ingest::session::PageSession;

/// Record as it comes out of a page, before any cleanup.
/// Producers may leave any field empty; the record normalizer decides what survives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub title: Option<String>,
    pub content: Option<String>,
    pub link: Option<String>,
    pub time: String, // free-form, producer specific
    pub is_important: Option<bool>,
    pub is_hot: Option<bool>,
    pub is_top: Option<bool>,
    pub source: String,
}

impl RawRecord {
    pub fn new(source: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            source: source.into(),
            ..Self::default()
        }
    }

    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.time = time.into();
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn important(mut self, flag: bool) -> Self {
        self.is_important = Some(flag);
        self
    }
}

/// Canonical feed entry served by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub title: String,
    pub content: String,
    pub link: String,
    pub source: String,
    pub source_color: String,
    pub is_important: bool,
    pub timestamp: i64, // ms since epoch, always resolved
}

/// Sorted + deduplicated output of one pipeline run.
/// Same shape as the persisted snapshot file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub update_time: i64,
    pub count: usize,
    pub data: Vec<NewsItem>,
}

/// Static per-source metadata attached during normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMeta {
    pub color: &'static str,
    /// Replaces whatever `source` the raw record carries.
    pub label: Option<String>,
    /// Stamp items with the capture time instead of parsing `time`
    /// (exchange listings rarely expose a reliable publish time).
    pub capture_time: bool,
}

impl SourceMeta {
    pub fn new(color: &'static str) -> Self {
        Self {
            color,
            label: None,
            capture_time: false,
        }
    }

    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn stamped_at_capture(mut self) -> Self {
        self.capture_time = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProducerOutcome {
    Fetched(usize),
    Empty { reason: String },
}

/// Per-producer result of one aggregation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerReport {
    pub source: String,
    pub outcome: ProducerOutcome,
    pub elapsed_ms: u64,
}

impl ProducerReport {
    pub fn is_empty(&self) -> bool {
        matches!(self.outcome, ProducerOutcome::Empty { .. })
    }
}

#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    /// Fetch, extract and normalize the latest items of one source.
    /// Errors never leave the aggregator: see [`crate::ingest::produce`].
    async fn fetch_latest(&self, session: &dyn PageSession) -> Result<Vec<NewsItem>>;

    fn name(&self) -> &str;

    /// Overall deadline for one invocation (navigation + extraction).
    fn timeout(&self) -> Duration {
        Duration::from_secs(45)
    }
}
