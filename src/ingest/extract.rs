// src/ingest/extract.rs
//! Extraction strategies shared by producers:
//! - DOM lists: ordered container candidates + per-element sub-selectors
//! - heuristic text scan for pages without stable structure
//! - embedded state payloads (`__NEXT_DATA__`, `__NUXT__`, ...) searched for a news array
//!
//! Everything here is synchronous; `scraper::Html` must not live across an await.

use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

use crate::ingest::types::RawRecord;

pub fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(s) => Some(s),
        Err(e) => {
            debug!(target: "ingest", css, error = ?e, "invalid selector");
            None
        }
    }
}

/// Concatenated text of an element with whitespace collapsed.
pub fn element_text(el: ElementRef<'_>) -> String {
    let raw: String = el.text().collect();
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First descendant of `el` matching `css`.
pub fn first_in<'a>(el: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let sel = selector(css)?;
    let found = el.select(&sel).next();
    found
}

pub fn resolve_link(base: &Url, href: &str) -> String {
    base.join(href.trim())
        .map(|u| u.to_string())
        .unwrap_or_default()
}

fn link_of(el: ElementRef<'_>, base: &Url) -> Option<String> {
    let anchor = if el.value().name() == "a" {
        Some(el)
    } else {
        first_in(el, "a[href]")
    };
    anchor
        .and_then(|a| a.value().attr("href"))
        .map(|href| resolve_link(base, href))
}

/// One way a page marks an entry as important/hot/pinned.
#[derive(Debug, Clone, Copy)]
pub enum Signal<'a> {
    HasClass(&'a str),
    ClassContains(&'a str),
    Descendant(&'a str),
    AttrEquals(&'a str, &'a str),
}

pub fn any_signal(el: ElementRef<'_>, signals: &[Signal<'_>]) -> bool {
    signals.iter().any(|s| match *s {
        Signal::HasClass(class) => el.value().classes().any(|c| c == class),
        Signal::ClassContains(needle) => el
            .value()
            .attr("class")
            .is_some_and(|c| c.contains(needle)),
        Signal::Descendant(css) => first_in(el, css).is_some(),
        Signal::AttrEquals(name, value) => el.value().attr(name) == Some(value),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerPick {
    /// First candidate with more than N matches.
    FirstAbove(usize),
    /// Candidate with the most matches (earliest wins ties).
    MostMatches,
}

pub fn pick_containers<'a>(doc: &'a Html, candidates: &[&str], pick: ContainerPick) -> Vec<ElementRef<'a>> {
    let mut best: Vec<ElementRef<'a>> = Vec::new();
    for css in candidates {
        let Some(sel) = selector(css) else { continue };
        let found: Vec<ElementRef<'a>> = doc.select(&sel).collect();
        match pick {
            ContainerPick::FirstAbove(n) if found.len() > n => return found,
            ContainerPick::FirstAbove(_) => {}
            ContainerPick::MostMatches => {
                if found.len() > best.len() {
                    best = found;
                }
            }
        }
    }
    best
}

pub const HEURISTIC_MAX_CANDIDATES: usize = 50;

/// Generic `div`s whose text carries a time-like marker and has a plausible length.
pub fn heuristic_candidates(doc: &Html) -> Vec<ElementRef<'_>> {
    let Some(sel) = selector("div") else {
        return Vec::new();
    };
    doc.select(&sel)
        .filter(|div| {
            let text = element_text(*div);
            let len = text.chars().count();
            len > 20
                && len < 500
                && (text.contains("分钟前") || text.contains("小时前") || text.contains(':'))
        })
        .take(HEURISTIC_MAX_CANDIDATES)
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct TitleRule<'a> {
    /// Tried in order; the first match of each is checked against the bounds.
    pub candidates: &'a [&'a str],
    /// Exclusive bounds on the character count.
    pub min_chars: usize,
    pub max_chars: usize,
    pub whole_text_fallback: bool,
    pub truncate_to: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
pub struct DomListLayout<'a> {
    pub containers: &'a [&'a str],
    pub pick: ContainerPick,
    pub title: TitleRule<'a>,
    pub time: &'a str,
    pub important: &'a [Signal<'a>],
    pub heuristic_fallback: bool,
    /// Drop entries whose title shares its first N chars with an earlier one.
    pub local_dedup_chars: Option<usize>,
    pub limit: usize,
}

fn pick_title(el: ElementRef<'_>, rule: &TitleRule<'_>) -> Option<String> {
    let in_bounds = |t: &String| {
        let n = t.chars().count();
        n > rule.min_chars && n < rule.max_chars
    };
    let mut title = rule
        .candidates
        .iter()
        .filter_map(|css| first_in(el, css))
        .map(element_text)
        .find(in_bounds);
    if title.is_none() && rule.whole_text_fallback {
        title = Some(element_text(el)).filter(in_bounds);
    }
    title.map(|t| match rule.truncate_to {
        Some(n) => t.chars().take(n).collect(),
        None => t,
    })
}

fn time_of(el: ElementRef<'_>, css: &str) -> String {
    first_in(el, css)
        .map(|t| {
            let text = element_text(t);
            if text.is_empty() {
                t.value().attr("datetime").unwrap_or_default().to_string()
            } else {
                text
            }
        })
        .unwrap_or_default()
}

pub fn extract_dom_list(doc: &Html, base: &Url, layout: &DomListLayout<'_>, source: &str) -> Vec<RawRecord> {
    let mut elements = pick_containers(doc, layout.containers, layout.pick);
    if elements.is_empty() && layout.heuristic_fallback {
        elements = heuristic_candidates(doc);
        debug!(target: "ingest", source, count = elements.len(), "heuristic candidates");
    }

    let records = elements
        .into_iter()
        .filter_map(|el| {
            let title = pick_title(el, &layout.title)?;
            let mut rec = RawRecord::new(source, title).with_time(time_of(el, layout.time));
            rec.link = link_of(el, base);
            rec.is_important = Some(any_signal(el, layout.important));
            Some(rec)
        })
        .collect::<Vec<_>>();

    let records = match layout.local_dedup_chars {
        Some(n) => dedup_local(records, n),
        None => records,
    };
    records.into_iter().take(layout.limit).collect()
}

/// Within-invocation noise filter: first record per truncated title wins.
pub fn dedup_local(records: Vec<RawRecord>, chars: usize) -> Vec<RawRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| {
            let key: String = r
                .title
                .as_deref()
                .unwrap_or_default()
                .chars()
                .take(chars)
                .collect();
            seen.insert(key)
        })
        .collect()
}

/* ----------------------------
Embedded state payloads
---------------------------- */

const PAYLOAD_MARKERS: &[&str] = &["__NUXT__", "__INITIAL_STATE__", "window.__data"];

const TITLE_KEYS: &[&str] = &["title", "content", "description"];
const CONTENT_KEYS: &[&str] = &["content", "description", "summary"];
const TIME_KEYS: &[&str] = &[
    "time",
    "createTime",
    "publishTime",
    "releaseTime",
    "add_time",
    "created_at",
    "createdAt",
];

/// Every JSON document a page embeds in its `<script>` tags.
pub fn embedded_payloads(doc: &Html) -> Vec<Value> {
    let Some(sel) = selector("script") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for script in doc.select(&sel) {
        let text: String = script.text().collect();
        if script.value().id() == Some("__NEXT_DATA__") {
            if let Some(v) = parse_json_blob(&text) {
                out.push(v);
            }
            continue;
        }
        if let Some(v) = PAYLOAD_MARKERS.iter().find_map(|m| assigned_json(&text, m)) {
            out.push(v);
            continue;
        }
        if text.contains("\"list\"") {
            if let Some(v) = brace_slice(&text) {
                out.push(v);
            }
        }
    }
    out
}

/// `marker = {...};` → the JSON on the right-hand side.
fn assigned_json(text: &str, marker: &str) -> Option<Value> {
    let idx = text.find(marker)?;
    let rest = &text[idx + marker.len()..];
    let eq = rest.find('=')?;
    if !rest[..eq].trim().is_empty() {
        return None;
    }
    parse_json_blob(&rest[eq + 1..])
}

fn parse_json_blob(s: &str) -> Option<Value> {
    let s = s.trim().trim_end_matches(';').trim();
    serde_json::from_str(s).ok().or_else(|| brace_slice(s))
}

fn brace_slice(s: &str) -> Option<Value> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&s[start..=end]).ok()
}

#[derive(Debug, Clone, Copy)]
pub struct PayloadRules<'a> {
    /// Keys whose non-empty array value is taken without further checks.
    pub preferred_keys: &'a [&'a str],
    /// Minimum length for an anonymous array to qualify.
    pub min_len: usize,
    pub max_depth: usize,
    /// Link built from `id` when an entry carries no url.
    pub link_prefix: Option<&'a str>,
}

/// An object with a non-empty title-like field and any time-like field.
pub fn looks_like_news(v: &Value) -> bool {
    let Some(obj) = v.as_object() else {
        return false;
    };
    text_field(obj, TITLE_KEYS).is_some()
        && TIME_KEYS
            .iter()
            .any(|k| obj.get(*k).is_some_and(|t| !t.is_null()))
}

/// Depth-first search for the first array that looks like a news list.
/// Stops descending past `rules.max_depth`.
pub fn find_news_array<'v>(value: &'v Value, rules: &PayloadRules<'_>, depth: usize) -> Option<&'v [Value]> {
    if depth > rules.max_depth {
        return None;
    }
    match value {
        Value::Array(items) => {
            if items.len() >= rules.min_len && items.iter().any(looks_like_news) {
                return Some(items.as_slice());
            }
            items
                .iter()
                .find_map(|v| find_news_array(v, rules, depth + 1))
        }
        Value::Object(map) => {
            for (key, child) in map {
                if rules.preferred_keys.contains(&key.as_str()) {
                    if let Value::Array(items) = child {
                        if items.iter().any(Value::is_object) {
                            return Some(items.as_slice());
                        }
                    }
                }
                if let Some(found) = find_news_array(child, rules, depth + 1) {
                    return Some(found);
                }
            }
            None
        }
        _ => None,
    }
}

fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match obj.get(*k) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    })
}

fn scalar_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match obj.get(*k) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|x| x > 0.0),
        Value::String(s) => matches!(s.as_str(), "true" | "1"),
        _ => false,
    }
}

fn flag(obj: &Map<String, Value>, keys: &[&str]) -> Option<bool> {
    let mut seen = false;
    let mut any = false;
    for v in keys.iter().filter_map(|k| obj.get(*k)) {
        seen = true;
        any |= truthy(v);
    }
    seen.then_some(any)
}

pub fn record_from_payload(item: &Value, source: &str, rules: &PayloadRules<'_>) -> Option<RawRecord> {
    let obj = item.as_object()?;
    let title = text_field(obj, TITLE_KEYS)?;

    let mut rec = RawRecord::new(source, title)
        .with_time(scalar_field(obj, TIME_KEYS).unwrap_or_default());
    rec.content = text_field(obj, CONTENT_KEYS);
    rec.link = text_field(obj, &["url", "link"]).or_else(|| {
        let prefix = rules.link_prefix?;
        scalar_field(obj, &["id"]).map(|id| format!("{prefix}{id}"))
    });
    rec.is_important = flag(obj, &["isImportant", "important", "is_important", "importance"]);
    rec.is_hot = flag(obj, &["isHot", "hot"]);
    rec.is_top = flag(obj, &["isTop", "top", "topping"]);
    Some(rec)
}

/// Records from the first embedded payload holding a news array, if any.
pub fn extract_payload_records(
    doc: &Html,
    rules: &PayloadRules<'_>,
    source: &str,
    limit: usize,
) -> Option<Vec<RawRecord>> {
    embedded_payloads(doc).iter().find_map(|payload| {
        let list = find_news_array(payload, rules, 0)?;
        Some(
            list.iter()
                .take(limit)
                .filter_map(|it| record_from_payload(it, source, rules))
                .collect(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const RULES: PayloadRules<'static> = PayloadRules {
        preferred_keys: &["newsFlashList"],
        min_len: 2,
        max_depth: 6,
        link_prefix: Some("https://example.test/n/"),
    };

    #[test]
    fn finds_nested_news_array() {
        let v = json!({
            "props": { "pageProps": { "menu": [1, 2, 3], "feed": { "items": [
                { "title": "ETH hits new high", "createTime": 1700000000 },
                { "title": "SOL upgrade ships", "createTime": 1700000100 }
            ]}}}
        });
        let list = find_news_array(&v, &RULES, 0).expect("found");
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn search_is_depth_bounded() {
        let mut v = json!([
            { "title": "Deep item one", "time": "1分钟前" },
            { "title": "Deep item two", "time": "2分钟前" }
        ]);
        for _ in 0..8 {
            v = json!({ "wrap": v });
        }
        assert!(find_news_array(&v, &RULES, 0).is_none());
        let shallow = PayloadRules { max_depth: 10, ..RULES };
        assert!(find_news_array(&v, &shallow, 0).is_some());
    }

    #[test]
    fn preferred_key_wins_without_time_fields() {
        let v = json!({ "data": { "newsFlashList": [ { "title": "No time field here" } ] } });
        assert_eq!(find_news_array(&v, &RULES, 0).map(|l| l.len()), Some(1));
    }

    #[test]
    fn payload_record_mapping() {
        let item = json!({
            "description": "Fallback title from description",
            "releaseTime": 1700000000,
            "id": 42,
            "topping": 1,
            "isHot": false
        });
        let rec = record_from_payload(&item, "ChainCatcher", &RULES).expect("record");
        assert_eq!(rec.title.as_deref(), Some("Fallback title from description"));
        assert_eq!(rec.time, "1700000000");
        assert_eq!(rec.link.as_deref(), Some("https://example.test/n/42"));
        assert_eq!(rec.is_top, Some(true));
        assert_eq!(rec.is_hot, Some(false));
        assert_eq!(rec.is_important, None);
    }

    #[test]
    fn next_data_and_assigned_payloads_are_found() {
        let html = r#"<html><head>
            <script id="__NEXT_DATA__" type="application/json">{"a":{"b":1}}</script>
            <script>window.__NUXT__ = {"data":[{"x":1}]};</script>
            <script>var config = {"list": [1]}; init();</script>
            <script>console.log("nothing")</script>
        </head><body></body></html>"#;
        let doc = Html::parse_document(html);
        let payloads = embedded_payloads(&doc);
        assert_eq!(payloads.len(), 3);
        assert_eq!(payloads[0]["a"]["b"], json!(1));
        assert_eq!(payloads[1]["data"][0]["x"], json!(1));
        assert_eq!(payloads[2]["list"][0], json!(1));
    }

    #[test]
    fn container_pick_modes() {
        let html = r#"<div class="a">1</div><div class="b">1</div><div class="b">2</div>"#;
        let doc = Html::parse_document(html);
        let first = pick_containers(&doc, &[".missing", ".a", ".b"], ContainerPick::FirstAbove(0));
        assert_eq!(first.len(), 1);
        let most = pick_containers(&doc, &[".a", ".b"], ContainerPick::MostMatches);
        assert_eq!(most.len(), 2);
        let none = pick_containers(&doc, &[".a", ".b"], ContainerPick::FirstAbove(5));
        assert!(none.is_empty());
    }

    #[test]
    fn dom_list_extracts_fields_and_resolves_links() {
        let html = r#"<ul>
            <li class="item important"><h3>Fed holds rates steady today</h3><time datetime="2025-01-01T00:00:00Z"></time><a href="/n/1">x</a></li>
            <li class="item"><h3>short</h3><span class="time">5分钟前</span></li>
            <li class="item"><h3>Bitcoin climbs past resistance</h3><span class="time">5分钟前</span><a href="https://other.test/2">y</a></li>
        </ul>"#;
        let doc = Html::parse_document(html);
        let base = Url::parse("https://news.test/flash").unwrap();
        let layout = DomListLayout {
            containers: &[".item"],
            pick: ContainerPick::FirstAbove(0),
            title: TitleRule {
                candidates: &["h3"],
                min_chars: 5,
                max_chars: usize::MAX,
                whole_text_fallback: false,
                truncate_to: None,
            },
            time: "time, .time",
            important: &[Signal::HasClass("important")],
            heuristic_fallback: false,
            local_dedup_chars: None,
            limit: 30,
        };
        let recs = extract_dom_list(&doc, &base, &layout, "Test");
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].time, "2025-01-01T00:00:00Z");
        assert_eq!(recs[0].link.as_deref(), Some("https://news.test/n/1"));
        assert_eq!(recs[0].is_important, Some(true));
        assert_eq!(recs[1].time, "5分钟前");
        assert_eq!(recs[1].link.as_deref(), Some("https://other.test/2"));
        assert_eq!(recs[1].is_important, Some(false));
    }

    #[test]
    fn heuristic_scan_and_local_dedup() {
        let html = r#"<body>
            <div><p>Layer-2 network announces token airdrop details</p><span>3分钟前</span></div>
            <div><p>Layer-2 network announces token airdrop details</p><span>4分钟前</span></div>
            <div>too short 1:00</div>
        </body>"#;
        let doc = Html::parse_document(html);
        let base = Url::parse("https://news.test/").unwrap();
        let layout = DomListLayout {
            containers: &[".nothing-matches"],
            pick: ContainerPick::MostMatches,
            title: TitleRule {
                candidates: &["h3", "p"],
                min_chars: 10,
                max_chars: 300,
                whole_text_fallback: true,
                truncate_to: Some(200),
            },
            time: "span",
            important: &[],
            heuristic_fallback: true,
            local_dedup_chars: Some(50),
            limit: 30,
        };
        let recs = extract_dom_list(&doc, &base, &layout, "Test");
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].time, "3分钟前");
    }
}
