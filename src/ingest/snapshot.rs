// src/ingest/snapshot.rs
use std::path::Path;

use anyhow::{Context, Result};

use crate::ingest::types::AggregateResult;

/// Write `{updateTime, count, data}` as pretty JSON, creating parent dirs.
pub async fn write_snapshot(path: &Path, result: &AggregateResult) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(result).context("serializing snapshot")?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub async fn read_snapshot(path: &Path) -> Result<AggregateResult> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}
