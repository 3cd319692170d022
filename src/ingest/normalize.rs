// src/ingest/normalize.rs
use chrono::{DateTime, Local};
use metrics::counter;

use crate::ingest::clean_text;
use crate::ingest::time::normalize_time_at;
use crate::ingest::types::{NewsItem, RawRecord, SourceMeta};

/// Titles shorter than this are DOM noise (buttons, tags, dates).
pub const MIN_TITLE_CHARS: usize = 6;
pub const MAX_TITLE_CHARS: usize = 300;

/// Map one raw record into a [`NewsItem`], or `None` when it has no usable title.
pub fn normalize_record(raw: RawRecord, meta: &SourceMeta, now: DateTime<Local>) -> Option<NewsItem> {
    let mut title = clean_text(raw.title.as_deref()?);
    if title.chars().count() < MIN_TITLE_CHARS {
        return None;
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        title = title.chars().take(MAX_TITLE_CHARS).collect();
    }

    let content = raw
        .content
        .as_deref()
        .map(clean_text)
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| title.clone());

    let link = raw
        .link
        .map(|l| l.trim().to_string())
        .unwrap_or_default();

    // No precedence between signals: any of them marks the item.
    let is_important = [raw.is_important, raw.is_hot, raw.is_top]
        .iter()
        .any(|s| s.unwrap_or(false));

    let timestamp = if meta.capture_time {
        now.timestamp_millis()
    } else {
        normalize_time_at(&raw.time, now)
    };

    Some(NewsItem {
        title,
        content,
        link,
        source: meta.label.clone().unwrap_or(raw.source),
        source_color: meta.color.to_string(),
        is_important,
        timestamp,
    })
}

/// Normalize a producer's batch, dropping rejected records.
pub fn normalize_records(raws: Vec<RawRecord>, meta: &SourceMeta) -> Vec<NewsItem> {
    let now = Local::now();
    let total = raws.len();
    let items: Vec<NewsItem> = raws
        .into_iter()
        .filter_map(|r| normalize_record(r, meta, now))
        .collect();

    let rejected = total - items.len();
    if rejected > 0 {
        counter!("ingest_rejected_total").increment(rejected as u64);
    }
    items
}
