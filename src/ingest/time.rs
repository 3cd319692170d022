// src/ingest/time.rs
//! Timestamp resolution for the free-form `time` strings producers emit:
//! Chinese/English relative phrases, ISO strings, bare clock times, dates in a
//! handful of site formats, epoch digits. Never fails; unparseable input resolves
//! to "now" and the result is never later than "now".

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 3_600_000;
const DAY_MS: i64 = 86_400_000;

static RE_MINUTES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s*(?:分钟前|分鐘前|mins?\s+ago|minutes?\s+ago)").expect("minutes regex")
});
static RE_HOURS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s*(?:小时前|小時前|hrs?\s+ago|hours?\s+ago)").expect("hours regex")
});
static RE_DAYS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)\s*(?:天前|days?\s+ago)").expect("days regex"));
static RE_CLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:今天\s*)?(\d{1,2}):(\d{2})(?::\d{2})?\s*$").expect("clock regex")
});
static RE_EPOCH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{10}(?:\d{3})?$").expect("epoch regex"));

/// Current time in ms since epoch.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Resolve `raw` against the current local time.
pub fn normalize_time(raw: &str) -> i64 {
    normalize_time_at(raw, Local::now())
}

/// Resolve `raw` against an explicit `now`. First matching rule wins.
pub fn normalize_time_at(raw: &str, now: DateTime<Local>) -> i64 {
    let now_ms = now.timestamp_millis();
    let s = raw.trim();
    if s.is_empty() {
        return now_ms;
    }

    let resolved = relative(s, &RE_MINUTES, MINUTE_MS, now_ms)
        .or_else(|| relative(s, &RE_HOURS, HOUR_MS, now_ms))
        .or_else(|| relative(s, &RE_DAYS, DAY_MS, now_ms))
        .or_else(|| {
            if s.contains('T') || s.contains('-') {
                parse_iso_like(s, now)
            } else {
                None
            }
        })
        .or_else(|| clock_today(s, now))
        .or_else(|| parse_generic(s))
        .unwrap_or(now_ms);

    resolved.clamp(0, now_ms)
}

fn relative(s: &str, re: &Regex, unit_ms: i64, now_ms: i64) -> Option<i64> {
    let caps = re.captures(s)?;
    let n: i64 = caps.get(1)?.as_str().parse().ok()?;
    Some(now_ms.saturating_sub(n.saturating_mul(unit_ms)))
}

fn local_ms(naive: NaiveDateTime) -> Option<i64> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp_millis())
}

fn parse_iso_like(s: &str, now: DateTime<Local>) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return local_ms(naive);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return local_ms(date.and_time(NaiveTime::MIN));
    }
    // "01-15 10:30": month-day listings without a year
    let with_year = format!("{}-{}", now.year(), s);
    NaiveDateTime::parse_from_str(&with_year, "%Y-%m-%d %H:%M")
        .ok()
        .and_then(local_ms)
}

fn clock_today(s: &str, now: DateTime<Local>) -> Option<i64> {
    let caps = RE_CLOCK.captures(s)?;
    let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = caps.get(2)?.as_str().parse().ok()?;
    let naive = now.date_naive().and_hms_opt(hour, minute, 0)?;
    local_ms(naive)
}

fn parse_generic(s: &str) -> Option<i64> {
    if RE_EPOCH.is_match(s) {
        let n: i64 = s.parse().ok()?;
        return Some(if s.len() == 10 { n.saturating_mul(1000) } else { n });
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.timestamp_millis());
    }
    const DATETIME_FORMATS: &[&str] = &[
        "%Y/%m/%d %H:%M:%S",
        "%Y/%m/%d %H:%M",
        "%Y年%m月%d日 %H:%M",
        "%b %d, %Y %H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return local_ms(naive);
        }
    }
    const DATE_FORMATS: &[&str] = &["%Y/%m/%d", "%Y年%m月%d日", "%b %d, %Y", "%B %d, %Y"];
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return local_ms(date.and_time(NaiveTime::MIN));
        }
    }
    None
}
