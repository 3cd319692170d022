//! One producer per entry of the static source tables.

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html};
use std::collections::HashSet;
use url::Url;

use crate::ingest::config::{self, SourceConfig, Strategy};
use crate::ingest::extract::{element_text, first_in, resolve_link, selector};
use crate::ingest::normalize::normalize_records;
use crate::ingest::session::{FetchOptions, PageSession};
use crate::ingest::types::{NewsItem, RawRecord, SourceMeta, SourceProvider};

const ANNOUNCEMENT_CANDIDATES: &[&str] = &[
    "a.announcement-item",
    ".article-list-item a",
    ".announcement-list a",
    ".news-list-item a",
    r#"a[href*="announcement"]"#,
    r#"a[href*="article"]"#,
    ".list-item a",
    ".help-center-article a",
];
const ANNOUNCEMENT_MIN_MATCHES: usize = 5;
const ANNOUNCEMENT_TIME: &str = r#".time, .date, span[class*="date"], span[class*="time"]"#;

pub struct ConfiguredProvider {
    key: String,
    config: Option<&'static SourceConfig>,
}

impl ConfiguredProvider {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        let config = config::lookup(&key);
        Self { key, config }
    }
}

#[async_trait]
impl SourceProvider for ConfiguredProvider {
    async fn fetch_latest(&self, session: &dyn PageSession) -> Result<Vec<NewsItem>> {
        let Some(cfg) = self.config else {
            tracing::warn!(target: "ingest", key = %self.key, "unknown source key");
            return Ok(Vec::new());
        };

        let base = Url::parse(cfg.url).with_context(|| format!("{} url", cfg.key))?;
        let body = session.fetch_page(cfg.url, &FetchOptions::default()).await?;
        let raws = extract(&body, &base, cfg);

        let mut meta = SourceMeta::new(cfg.color).labeled(cfg.key);
        if cfg.capture_time() {
            meta = meta.stamped_at_capture();
        }
        Ok(normalize_records(raws, &meta))
    }

    fn name(&self) -> &str {
        &self.key
    }
}

pub fn extract(html: &str, base: &Url, cfg: &SourceConfig) -> Vec<RawRecord> {
    let doc = Html::parse_document(html);
    let records = match cfg.strategy {
        Strategy::DatedLinks { date } => dated_links(&doc, base, date, cfg.key),
        Strategy::Cards {
            containers,
            title,
            time,
        } => cards(&doc, base, containers, title, time, cfg.key),
        Strategy::Announcements => announcements(&doc, base, cfg.key),
    };
    records.into_iter().take(cfg.limit()).collect()
}

fn next_element_sibling(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.next_siblings().find_map(ElementRef::wrap)
}

fn dated_links(doc: &Html, base: &Url, date_css: &str, source: &str) -> Vec<RawRecord> {
    let Some(sel) = selector(date_css) else {
        return Vec::new();
    };
    doc.select(&sel)
        .filter_map(|date_el| {
            let link_el = next_element_sibling(date_el).filter(|e| e.value().name() == "a")?;
            let href = link_el.value().attr("href").unwrap_or_default();
            Some(
                RawRecord::new(source, element_text(link_el))
                    .with_link(resolve_link(base, href))
                    .with_time(element_text(date_el)),
            )
        })
        .collect()
}

fn cards(doc: &Html, base: &Url, containers: &str, title_css: &str, time_css: &str, source: &str) -> Vec<RawRecord> {
    let Some(sel) = selector(containers) else {
        return Vec::new();
    };
    doc.select(&sel)
        .filter_map(|card| {
            let title = first_in(card, title_css)?;
            let href = first_in(card, "a")?.value().attr("href").unwrap_or_default();
            let time = first_in(card, time_css).map(element_text).unwrap_or_default();
            Some(
                RawRecord::new(source, element_text(title))
                    .with_link(resolve_link(base, href))
                    .with_time(time),
            )
        })
        .collect()
}

fn announcement_anchors<'a>(doc: &'a Html) -> Vec<ElementRef<'a>> {
    for css in ANNOUNCEMENT_CANDIDATES {
        let Some(sel) = selector(css) else { continue };
        let found: Vec<_> = doc.select(&sel).collect();
        if found.len() > ANNOUNCEMENT_MIN_MATCHES {
            return found;
        }
    }

    let Some(all) = selector("a") else {
        return Vec::new();
    };
    doc.select(&all)
        .filter(|a| {
            let href = a.value().attr("href").unwrap_or_default();
            element_text(*a).chars().count() > 10 && (href.contains("announcement") || href.contains("article"))
        })
        .collect()
}

fn announcements(doc: &Html, base: &Url, source: &str) -> Vec<RawRecord> {
    let mut seen = HashSet::new();
    announcement_anchors(doc)
        .into_iter()
        .filter_map(|a| {
            let title = element_text(a);
            if title.chars().count() <= 5 || !seen.insert(title.clone()) {
                return None;
            }
            let time = a
                .parent()
                .and_then(ElementRef::wrap)
                .and_then(|p| first_in(p, ANNOUNCEMENT_TIME))
                .map(element_text)
                .unwrap_or_default();
            let href = a.value().attr("href").unwrap_or_default();
            Some(
                RawRecord::new(source, title)
                    .with_link(resolve_link(base, href))
                    .with_time(time),
            )
        })
        .collect()
}
