// src/config/app.rs
use std::path::PathBuf;
use std::time::Duration;

use crate::ingest::config::DEFAULT_TWITTER_HANDLE;

pub const ENV_PORT: &str = "PORT";
pub const ENV_CACHE_TTL_MS: &str = "NEWS_CACHE_TTL_MS";
pub const ENV_REFRESH_INTERVAL_SECS: &str = "NEWS_REFRESH_INTERVAL_SECS";
pub const ENV_PUBLIC_DIR: &str = "NEWS_PUBLIC_DIR";
pub const ENV_SNAPSHOT_PATH: &str = "NEWS_SNAPSHOT_PATH";
pub const ENV_TWITTER_HANDLE: &str = "NEWS_TWITTER_HANDLE";

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_CACHE_TTL_MS: u64 = 5 * 60 * 1000;

/// Process settings. Every field has a default; bad values fall back to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub cache_ttl: Duration,
    /// `None` disables the background ticker (refresh on demand only).
    pub refresh_interval: Option<Duration>,
    pub public_dir: PathBuf,
    pub snapshot_path: PathBuf,
    pub twitter_handle: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            cache_ttl: Duration::from_millis(DEFAULT_CACHE_TTL_MS),
            refresh_interval: None,
            public_dir: PathBuf::from("public"),
            snapshot_path: PathBuf::from("public/data.json"),
            twitter_handle: DEFAULT_TWITTER_HANDLE.to_string(),
        }
    }
}

fn parse_num<T: std::str::FromStr>(name: &str, raw: Option<String>) -> Option<T> {
    let raw = raw?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "invalid number, using default");
            None
        }
    }
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup (process env, a map in tests).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();

        let port = parse_num::<u16>(ENV_PORT, get(ENV_PORT)).unwrap_or(d.port);
        let cache_ttl = parse_num::<u64>(ENV_CACHE_TTL_MS, get(ENV_CACHE_TTL_MS))
            .map(Duration::from_millis)
            .unwrap_or(d.cache_ttl);
        let refresh_interval = parse_num::<u64>(ENV_REFRESH_INTERVAL_SECS, get(ENV_REFRESH_INTERVAL_SECS))
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Self {
            port,
            cache_ttl,
            refresh_interval,
            public_dir: non_empty(get(ENV_PUBLIC_DIR))
                .map(PathBuf::from)
                .unwrap_or(d.public_dir),
            snapshot_path: non_empty(get(ENV_SNAPSHOT_PATH))
                .map(PathBuf::from)
                .unwrap_or(d.snapshot_path),
            twitter_handle: non_empty(get(ENV_TWITTER_HANDLE))
                .map(|h| h.trim_start_matches('@').to_string())
                .unwrap_or(d.twitter_handle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_map(pairs: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn empty_env_gives_defaults() {
        assert_eq!(from_map(&[]), AppConfig::default());
    }

    #[test]
    fn overrides_and_fallbacks() {
        let cfg = from_map(&[
            (ENV_PORT, "8080"),
            (ENV_CACHE_TTL_MS, "abc"),
            (ENV_REFRESH_INTERVAL_SECS, "120"),
            (ENV_TWITTER_HANDLE, "@someone"),
            (ENV_PUBLIC_DIR, "  "),
        ]);
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.cache_ttl, Duration::from_secs(300));
        assert_eq!(cfg.refresh_interval, Some(Duration::from_secs(120)));
        assert_eq!(cfg.twitter_handle, "someone");
        assert_eq!(cfg.public_dir, PathBuf::from("public"));
    }

    #[test]
    fn zero_interval_disables_ticker() {
        let cfg = from_map(&[(ENV_REFRESH_INTERVAL_SECS, "0"), (ENV_PORT, "70000")]);
        assert_eq!(cfg.refresh_interval, None);
        assert_eq!(cfg.port, 3000);
    }
}
