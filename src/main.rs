//! Web3 news aggregator: HTTP server entrypoint.
//! Serves the cached feed, the static front page and `/metrics`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use web3_news_aggregator::ingest::scheduler::spawn_refresh_scheduler;
use web3_news_aggregator::{app, scrape_pipeline, AppConfig, NewsCache};

/// Compact logs by default; `NEWS_LOG_JSON=1` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("web3_news_aggregator=info,warn"));
    let json = std::env::var("NEWS_LOG_JSON").is_ok_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = ?e, "ctrl-c handler failed");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = ?e, "SIGTERM handler failed");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::from_env();
    tracing::info!(?cfg, "configuration loaded");

    let pipeline = scrape_pipeline(&cfg)?;
    let cache = Arc::new(NewsCache::new(Arc::new(pipeline), cfg.cache_ttl));
    let router = app(&cfg, cache.clone())?;

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "listening");

    // Warm-up: first load in the background.
    let warm = cache.clone();
    tokio::spawn(async move {
        let view = warm.get().await;
        tracing::info!(items = view.count(), "initial data loaded");
    });

    let scheduler = cfg
        .refresh_interval
        .map(|every| spawn_refresh_scheduler(cache.clone(), every));

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;

    if let Some(handle) = scheduler {
        handle.abort();
    }
    Ok(())
}
