// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /api/news      (shape, camelCase fields, cached second call)
// - GET /api/refresh   (always re-runs the pipeline)
// - GET /api/health
// - GET / and static files from the public dir
// - degraded pipeline still answers 200 with an empty list
// - ApiError renders 500 {success:false, error}

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    response::IntoResponse,
    Router,
};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use web3_news_aggregator::api::{create_router, ApiError, AppState};
use web3_news_aggregator::cache::{FeedSource, NewsCache};
use web3_news_aggregator::ingest::finalize;
use web3_news_aggregator::ingest::time::now_ms;
use web3_news_aggregator::{AggregateResult, NewsItem};

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

struct FixedSource {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl FeedSource for FixedSource {
    async fn refresh(&self) -> Result<AggregateResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("all 22 producers came back empty");
        }
        let now = now_ms();
        let items = vec![
            NewsItem {
                title: "Older flash item".into(),
                content: "Older flash item".into(),
                link: "https://example.test/1".into(),
                source: "BlockBeats".into(),
                source_color: "#1E88E5".into(),
                is_important: false,
                timestamp: now - 3_600_000,
            },
            NewsItem {
                title: "Newer flash item".into(),
                content: "Body of the newer item".into(),
                link: String::new(),
                source: "ChainCatcher".into(),
                source_color: "#FF6B35".into(),
                is_important: true,
                timestamp: now - 600_000,
            },
        ];
        Ok(finalize(items, now))
    }
}

struct TestApp {
    router: Router,
    source: Arc<FixedSource>,
    _public: tempfile::TempDir,
}

fn test_app(fail: bool) -> TestApp {
    let public = tempfile::tempdir().expect("tempdir");
    std::fs::write(public.path().join("index.html"), "<h1>Web3 News</h1>").expect("index");
    std::fs::write(public.path().join("app.js"), "console.log('ok')").expect("asset");

    let source = Arc::new(FixedSource {
        calls: AtomicUsize::new(0),
        fail,
    });
    let cache = Arc::new(NewsCache::new(source.clone(), Duration::from_secs(300)));
    let router = create_router(AppState::new(cache, public.path()));
    TestApp {
        router,
        source,
        _public: public,
    }
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Json) {
    let (status, bytes) = get(app, uri).await;
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

#[tokio::test]
async fn news_returns_sorted_camel_case_payload() {
    let app = test_app(false);

    let (status, v) = get_json(&app.router, "/api/news").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["success"], true);
    assert_eq!(v["count"], 2);
    assert!(v["lastUpdate"].as_i64().unwrap_or(0) > 0);

    let first = &v["data"][0];
    assert_eq!(first["title"], "Newer flash item");
    assert_eq!(first["sourceColor"], "#FF6B35");
    assert_eq!(first["isImportant"], true);
    assert!(first["timestamp"].is_i64());

    // second call is served from the cache
    let (_, again) = get_json(&app.router, "/api/news").await;
    assert_eq!(again["lastUpdate"], v["lastUpdate"]);
    assert_eq!(app.source.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn refresh_reruns_the_pipeline() {
    let app = test_app(false);
    get_json(&app.router, "/api/news").await;

    let (status, v) = get_json(&app.router, "/api/refresh").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["success"], true);
    assert_eq!(v["count"], 2);
    assert_eq!(app.source.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn health_reports_cache_state() {
    let app = test_app(false);

    let (status, v) = get_json(&app.router, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["status"], "ok");
    assert_eq!(v["newsCount"], 0);
    assert_eq!(app.source.calls.load(Ordering::SeqCst), 0, "health never refreshes");

    get_json(&app.router, "/api/news").await;
    let (_, v) = get_json(&app.router, "/api/health").await;
    assert_eq!(v["newsCount"], 2);
    let age = v["cacheAge"].as_i64().expect("cacheAge");
    assert!((0..60_000).contains(&age));
}

#[tokio::test]
async fn failing_pipeline_degrades_to_empty_list() {
    let app = test_app(true);
    let (status, v) = get_json(&app.router, "/api/news").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["success"], true);
    assert_eq!(v["count"], 0);
    assert_eq!(v["lastUpdate"], 0);
    assert_eq!(v["data"], serde_json::json!([]));
}

#[tokio::test]
async fn root_and_static_files_are_served() {
    let app = test_app(false);

    let (status, body) = get(&app.router, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body).expect("utf8"), "<h1>Web3 News</h1>");

    let (status, body) = get(&app.router, "/app.js").await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).expect("utf8").contains("console.log"));

    let (status, _) = get(&app.router, "/missing.css").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cors_is_permissive() {
    let app = test_app(false);
    let req = Request::builder()
        .method("GET")
        .uri("/api/health")
        .header("origin", "https://somewhere.test")
        .body(Body::empty())
        .expect("build request");
    let resp = app.router.clone().oneshot(req).await.expect("oneshot");
    assert!(resp.headers().contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn api_error_renders_500_json() {
    let resp = ApiError::from(anyhow::anyhow!("snapshot task died")).into_response();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.expect("body");
    let v: Json = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(v["success"], false);
    assert_eq!(v["error"], "snapshot task died");
}
