use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::Html;
use url::Url;

use crate::ingest::config::CHAINCATCHER;
use crate::ingest::extract::{
    extract_dom_list, extract_payload_records, ContainerPick, DomListLayout, PayloadRules, Signal, TitleRule,
};
use crate::ingest::normalize::normalize_records;
use crate::ingest::session::{FetchOptions, PageSession};
use crate::ingest::types::{NewsItem, RawRecord, SourceMeta, SourceProvider};

const LIMIT: usize = 30;

const PAYLOAD: PayloadRules<'static> = PayloadRules {
    preferred_keys: &["newsFlashList", "list", "newsList"],
    min_len: 6,
    max_depth: 6,
    link_prefix: Some("https://www.chaincatcher.com/article/"),
};

const LIST: DomListLayout<'static> = DomListLayout {
    containers: &[r#"[class*="news-item"], [class*="flash-item"], article, .news-card"#],
    pick: ContainerPick::FirstAbove(0),
    title: TitleRule {
        candidates: &[r#"h3, h4, .title, [class*="title"]"#],
        min_chars: 0,
        max_chars: usize::MAX,
        whole_text_fallback: false,
        truncate_to: None,
    },
    time: r#"time, .time, [class*="time"]"#,
    important: &[
        Signal::Descendant(r#".hot, [class*="hot"]"#),
        Signal::Descendant(r#".top, [class*="top"], .topping"#),
    ],
    heuristic_fallback: false,
    local_dedup_chars: None,
    limit: LIMIT,
};

/// Nuxt state first; the rendered list is the fallback.
pub fn extract(html: &str, base: &Url) -> Vec<RawRecord> {
    let doc = Html::parse_document(html);
    if let Some(records) = extract_payload_records(&doc, &PAYLOAD, CHAINCATCHER.name, LIMIT) {
        if !records.is_empty() {
            return records;
        }
    }
    extract_dom_list(&doc, base, &LIST, CHAINCATCHER.name)
}

pub struct ChainCatcherProvider;

#[async_trait]
impl SourceProvider for ChainCatcherProvider {
    async fn fetch_latest(&self, session: &dyn PageSession) -> Result<Vec<NewsItem>> {
        let base = Url::parse(CHAINCATCHER.url).context("chaincatcher url")?;
        let body = session
            .fetch_page(CHAINCATCHER.url, &FetchOptions::default())
            .await?;
        let raws = extract(&body, &base);
        Ok(normalize_records(raws, &SourceMeta::new(CHAINCATCHER.color)))
    }

    fn name(&self) -> &str {
        CHAINCATCHER.name
    }
}
