use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};

use crate::cache::{CacheView, NewsCache};
use crate::ingest::time::now_ms;
use crate::ingest::types::NewsItem;

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<NewsCache>,
    pub public_dir: PathBuf,
}

impl AppState {
    pub fn new(cache: Arc<NewsCache>, public_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache,
            public_dir: public_dir.into(),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let index = ServeFile::new(state.public_dir.join("index.html"));
    let assets = ServeDir::new(&state.public_dir);

    Router::new()
        .route("/api/news", get(news))
        .route("/api/refresh", get(refresh))
        .route("/api/health", get(health))
        .route_service("/", index)
        .fallback_service(assets)
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Serving-layer failure, rendered as `500 {success:false, error}`.
#[derive(Debug)]
pub struct ApiError(anyhow::Error);

impl<E: Into<anyhow::Error>> From<E> for ApiError {
    fn from(e: E) -> Self {
        Self(e.into())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(target: "api", error = ?self.0, "request failed");
        let body = ErrorBody {
            success: false,
            error: format!("{:#}", self.0),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewsBody<'a> {
    success: bool,
    count: usize,
    last_update: i64,
    data: &'a [NewsItem],
}

fn news_response(view: &CacheView) -> Response {
    Json(NewsBody {
        success: true,
        count: view.count(),
        last_update: view.last_update,
        data: &view.data,
    })
    .into_response()
}

// Run on its own task so a client disconnect cannot cancel a refresh midway.
async fn fetch_view(cache: Arc<NewsCache>) -> Result<CacheView, ApiError> {
    let view = tokio::spawn(async move { cache.get().await }).await?;
    Ok(view)
}

async fn news(State(state): State<AppState>) -> Result<Response, ApiError> {
    let view = fetch_view(state.cache).await?;
    Ok(news_response(&view))
}

async fn refresh(State(state): State<AppState>) -> Result<Response, ApiError> {
    tracing::info!(target: "api", "forced refresh requested");
    state.cache.invalidate();
    let view = fetch_view(state.cache).await?;
    Ok(news_response(&view))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthBody {
    status: &'static str,
    cache_age: i64,
    news_count: usize,
}

async fn health(State(state): State<AppState>) -> Json<HealthBody> {
    let view = state.cache.view();
    Json(HealthBody {
        status: "ok",
        cache_age: view.age_ms(now_ms()),
        news_count: view.count(),
    })
}
