use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::Html;
use std::time::Duration;
use url::Url;

use crate::ingest::config::FORESIGHT;
use crate::ingest::extract::{
    extract_dom_list, extract_payload_records, ContainerPick, DomListLayout, PayloadRules, Signal, TitleRule,
};
use crate::ingest::normalize::normalize_records;
use crate::ingest::session::{FetchOptions, PageSession, DESKTOP_UA};
use crate::ingest::types::{NewsItem, RawRecord, SourceMeta, SourceProvider};

const LIMIT: usize = 30;
const FETCH_TIMEOUT_SECS: u64 = 45;

const PAYLOAD: PayloadRules<'static> = PayloadRules {
    preferred_keys: &[],
    min_len: 4,
    max_depth: 6,
    link_prefix: Some("https://foresightnews.pro/news/"),
};

// No stable class names: take whichever candidate matches most, then scan divs.
const LIST: DomListLayout<'static> = DomListLayout {
    containers: &[
        r#"[class*="news-item"]"#,
        r#"[class*="flash-item"]"#,
        r#"[class*="list-item"]"#,
        r#"[class*="article-item"]"#,
        ".news-card",
        "article",
        r#"[class*="card"]"#,
    ],
    pick: ContainerPick::MostMatches,
    title: TitleRule {
        candidates: &["h1", "h2", "h3", "h4", ".title", r#"[class*="title"]"#, "a", "p"],
        min_chars: 10,
        max_chars: 300,
        whole_text_fallback: true,
        truncate_to: Some(200),
    },
    time: r#"time, .time, [class*="time"], [class*="date"], span"#,
    important: &[
        Signal::ClassContains("important"),
        Signal::ClassContains("hot"),
        Signal::ClassContains("top"),
        Signal::Descendant(r#"[class*="important"], [class*="hot"], [class*="top"]"#),
    ],
    heuristic_fallback: true,
    local_dedup_chars: Some(50),
    limit: LIMIT,
};

pub fn extract(html: &str, base: &Url) -> Vec<RawRecord> {
    let doc = Html::parse_document(html);
    match extract_payload_records(&doc, &PAYLOAD, FORESIGHT.name, LIMIT) {
        Some(records) if !records.is_empty() => records,
        _ => extract_dom_list(&doc, base, &LIST, FORESIGHT.name),
    }
}

pub struct ForesightProvider;

#[async_trait]
impl SourceProvider for ForesightProvider {
    async fn fetch_latest(&self, session: &dyn PageSession) -> Result<Vec<NewsItem>> {
        let base = Url::parse(FORESIGHT.url).context("foresight url")?;
        let opts = FetchOptions::default()
            .with_timeout(FETCH_TIMEOUT_SECS)
            .with_user_agent(DESKTOP_UA);
        let body = session.fetch_page(FORESIGHT.url, &opts).await?;
        let raws = extract(&body, &base);
        Ok(normalize_records(raws, &SourceMeta::new(FORESIGHT.color)))
    }

    fn name(&self) -> &str {
        FORESIGHT.name
    }

    // slow, script-heavy page
    fn timeout(&self) -> Duration {
        Duration::from_secs(60)
    }
}
