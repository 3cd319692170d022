use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html};
use url::Url;

use crate::ingest::config::{TWITTER_BASE_URL, TWITTER_COLOR};
use crate::ingest::extract::{element_text, first_in, resolve_link, selector};
use crate::ingest::normalize::normalize_records;
use crate::ingest::session::{FetchOptions, PageSession, DESKTOP_UA};
use crate::ingest::types::{NewsItem, RawRecord, SourceMeta, SourceProvider};

const LIMIT: usize = 20;
const TITLE_CHARS: usize = 100;

/// Latest posts of one public timeline.
pub struct TwitterProvider {
    handle: String,
    label: String,
}

impl TwitterProvider {
    pub fn new(handle: impl Into<String>) -> Self {
        let handle = handle.into();
        let label = format!("Twitter: {handle}");
        Self { handle, label }
    }

    pub fn url(&self) -> String {
        format!("{TWITTER_BASE_URL}{}", self.handle)
    }
}

fn title_from(text: &str) -> String {
    if text.chars().count() > TITLE_CHARS {
        let head: String = text.chars().take(TITLE_CHARS).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

fn permalink(time_el: ElementRef<'_>) -> Option<&str> {
    time_el
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "a")
        .and_then(|a| a.value().attr("href"))
}

pub fn extract(html: &str, base: &Url, label: &str) -> Vec<RawRecord> {
    let doc = Html::parse_document(html);
    let Some(tweets) = selector(r#"article[data-testid="tweet"]"#) else {
        return Vec::new();
    };
    doc.select(&tweets)
        .filter_map(|tweet| {
            let text = element_text(first_in(tweet, r#"div[data-testid="tweetText"]"#)?);
            let time_el = first_in(tweet, "time");
            let mut rec = RawRecord::new(label, title_from(&text))
                .with_content(text)
                .with_time(
                    time_el
                        .and_then(|t| t.value().attr("datetime"))
                        .unwrap_or_default(),
                );
            rec.link = time_el
                .and_then(permalink)
                .map(|href| resolve_link(base, href));
            Some(rec)
        })
        .take(LIMIT)
        .collect()
}

#[async_trait]
impl SourceProvider for TwitterProvider {
    async fn fetch_latest(&self, session: &dyn PageSession) -> Result<Vec<NewsItem>> {
        let url = self.url();
        let base = Url::parse(&url).with_context(|| format!("timeline url for {}", self.handle))?;
        let opts = FetchOptions::default().with_user_agent(DESKTOP_UA);
        let body = session.fetch_page(&url, &opts).await?;
        let raws = extract(&body, &base, &self.label);
        Ok(normalize_records(raws, &SourceMeta::new(TWITTER_COLOR)))
    }

    fn name(&self) -> &str {
        &self.label
    }
}
