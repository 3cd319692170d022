// src/ingest/session.rs
//! Page fetching shared by all producers of a refresh cycle.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT_LANGUAGE, USER_AGENT};
use std::collections::HashMap;
use std::time::Duration;

pub const DESKTOP_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub user_agent: Option<&'static str>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: None,
        }
    }
}

impl FetchOptions {
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_user_agent(mut self, ua: &'static str) -> Self {
        self.user_agent = Some(ua);
        self
    }
}

#[async_trait]
pub trait PageSession: Send + Sync {
    /// Return the body of `url`, or fail. Each call is independent of the others.
    async fn fetch_page(&self, url: &str, opts: &FetchOptions) -> Result<String>;
}

/// Long-lived HTTP session backed by one pooled `reqwest::Client`.
#[derive(Clone)]
pub struct HttpSession {
    client: reqwest::Client,
}

impl HttpSession {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(DESKTOP_UA)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("building http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageSession for HttpSession {
    async fn fetch_page(&self, url: &str, opts: &FetchOptions) -> Result<String> {
        let mut req = self
            .client
            .get(url)
            .timeout(opts.timeout)
            .header(ACCEPT_LANGUAGE, "zh-CN,zh;q=0.9,en;q=0.8");
        if let Some(ua) = opts.user_agent {
            req = req.header(USER_AGENT, ua);
        }

        let resp = req.send().await.with_context(|| format!("GET {url}"))?;
        let status = resp.status();
        if !status.is_success() {
            bail!("GET {url} returned {status}");
        }
        resp.text()
            .await
            .with_context(|| format!("reading body of {url}"))
    }
}

// --- Test helper ---
/// In-memory session serving fixed bodies per URL; unknown URLs fail.
#[derive(Default)]
pub struct StaticSession {
    pages: HashMap<String, String>,
}

impl StaticSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.pages.insert(url.into(), body.into());
        self
    }
}

#[async_trait]
impl PageSession for StaticSession {
    async fn fetch_page(&self, url: &str, _opts: &FetchOptions) -> Result<String> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("no page registered for {url}"))
    }
}
