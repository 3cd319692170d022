//! One-shot snapshot job: run every producer once and write the aggregate to disk.

use std::path::PathBuf;

use web3_news_aggregator::ingest::providers::default_batches;
use web3_news_aggregator::ingest::session::HttpSession;
use web3_news_aggregator::ingest::snapshot::write_snapshot;
use web3_news_aggregator::ingest::{run_once, types::ProducerOutcome};
use web3_news_aggregator::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let cfg = AppConfig::from_env();
    // optional positional override of the output path
    let out = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| cfg.snapshot_path.clone());

    let session = HttpSession::new()?;
    let batches = default_batches(&cfg.twitter_handle);
    let (result, reports) = run_once(&batches, &session).await;

    for r in &reports {
        match &r.outcome {
            ProducerOutcome::Fetched(n) => tracing::info!(source = %r.source, items = n, "fetched"),
            ProducerOutcome::Empty { reason } => tracing::warn!(source = %r.source, %reason, "empty"),
        }
    }

    write_snapshot(&out, &result).await?;
    println!("update-news: {} items written to {}", result.count, out.display());
    Ok(())
}
