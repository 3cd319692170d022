use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::Html;
use url::Url;

use crate::ingest::config::BLOCKBEATS;
use crate::ingest::extract::{
    extract_dom_list, extract_payload_records, ContainerPick, DomListLayout, PayloadRules, Signal, TitleRule,
};
use crate::ingest::normalize::normalize_records;
use crate::ingest::session::{FetchOptions, PageSession};
use crate::ingest::types::{NewsItem, RawRecord, SourceMeta, SourceProvider};

const LIMIT: usize = 30;

const LIST: DomListLayout<'static> = DomListLayout {
    containers: &[
        ".news-flash-item",
        ".newsflash-item",
        r#"[class*="flash-item"]"#,
        r#"[class*="news-card"]"#,
        ".flash-list-item",
        "article",
        ".news-item",
    ],
    pick: ContainerPick::FirstAbove(0),
    title: TitleRule {
        candidates: &[r#"h3, h4, .title, [class*="title"], .content, p"#],
        min_chars: 5,
        max_chars: usize::MAX,
        whole_text_fallback: false,
        truncate_to: None,
    },
    time: r#"time, .time, [class*="time"], .date, span[class*="date"]"#,
    important: &[
        Signal::HasClass("important"),
        Signal::Descendant(r#".important, .hot, [class*="important"], [class*="hot"]"#),
        Signal::AttrEquals("data-important", "true"),
    ],
    heuristic_fallback: false,
    local_dedup_chars: None,
    limit: LIMIT,
};

// The flash page ships its list under a plain "list" key when the DOM is not rendered.
const PAYLOAD: PayloadRules<'static> = PayloadRules {
    preferred_keys: &["list"],
    min_len: 1,
    max_depth: 6,
    link_prefix: None,
};

/// Card list first; embedded payload only when no card matched.
pub fn extract(html: &str, base: &Url) -> Vec<RawRecord> {
    let doc = Html::parse_document(html);
    let records = extract_dom_list(&doc, base, &LIST, BLOCKBEATS.name);
    if !records.is_empty() {
        return records;
    }
    extract_payload_records(&doc, &PAYLOAD, BLOCKBEATS.name, LIMIT).unwrap_or_default()
}

pub struct BlockBeatsProvider;

#[async_trait]
impl SourceProvider for BlockBeatsProvider {
    async fn fetch_latest(&self, session: &dyn PageSession) -> Result<Vec<NewsItem>> {
        let base = Url::parse(BLOCKBEATS.url).context("blockbeats url")?;
        let body = session
            .fetch_page(BLOCKBEATS.url, &FetchOptions::default())
            .await?;
        let raws = extract(&body, &base);
        Ok(normalize_records(raws, &SourceMeta::new(BLOCKBEATS.color)))
    }

    fn name(&self) -> &str {
        BLOCKBEATS.name
    }
}
