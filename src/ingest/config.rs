// src/ingest/config.rs
//! Static source tables. URLs and colors are compiled in, not runtime-configurable.

/// Flash-news sites with a dedicated producer.
#[derive(Debug, Clone, Copy)]
pub struct FlashSource {
    pub name: &'static str,
    pub url: &'static str,
    pub color: &'static str,
}

pub const BLOCKBEATS: FlashSource = FlashSource {
    name: "BlockBeats",
    url: "https://www.theblockbeats.info/newsflash",
    color: "#1E88E5",
};

pub const CHAINCATCHER: FlashSource = FlashSource {
    name: "ChainCatcher",
    url: "https://www.chaincatcher.com/news",
    color: "#FF6B35",
};

pub const FORESIGHT: FlashSource = FlashSource {
    name: "Foresight",
    url: "https://foresightnews.pro/news",
    color: "#9C27B0",
};

pub const TWITTER_COLOR: &str = "#1DA1F2";
pub const TWITTER_BASE_URL: &str = "https://x.com/";
pub const DEFAULT_TWITTER_HANDLE: &str = "_FORAB_";

/// How a configured page lays out its entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// A date label immediately followed by the headline link.
    DatedLinks { date: &'static str },
    /// Card containers; title and link are required, time is optional.
    Cards {
        containers: &'static str,
        title: &'static str,
        time: &'static str,
    },
    /// Announcement link lists, as exchanges publish them.
    Announcements,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Media,
    Exchange,
}

#[derive(Debug, Clone, Copy)]
pub struct SourceConfig {
    pub key: &'static str,
    pub url: &'static str,
    pub color: &'static str,
    pub kind: SourceKind,
    pub strategy: Strategy,
}

impl SourceConfig {
    /// Per-invocation cap on extracted records.
    pub fn limit(&self) -> usize {
        match self.kind {
            SourceKind::Media => 30,
            SourceKind::Exchange => 15,
        }
    }

    /// Exchange listings are stamped with the capture time.
    pub fn capture_time(&self) -> bool {
        self.kind == SourceKind::Exchange
    }
}

const fn media(key: &'static str, url: &'static str, color: &'static str, strategy: Strategy) -> SourceConfig {
    SourceConfig {
        key,
        url,
        color,
        kind: SourceKind::Media,
        strategy,
    }
}

const fn exchange(key: &'static str, url: &'static str, color: &'static str) -> SourceConfig {
    SourceConfig {
        key,
        url,
        color,
        kind: SourceKind::Exchange,
        strategy: Strategy::Announcements,
    }
}

pub static MEDIA_SOURCES: &[SourceConfig] = &[
    media(
        "PR Newswire",
        "https://www.prnewswire.com/apac/news-releases/consumer-technology-latest-news/cryptocurrency-list/?page=1&pagesize=25",
        "#3498db",
        Strategy::DatedLinks {
            date: ".news-release-date",
        },
    ),
    media(
        "MetaEra",
        "https://www.me.news/hk",
        "#f1c40f",
        Strategy::Cards {
            containers: r#"article, .list-item, [class*="item"]"#,
            title: "h1, h2, h3, .title",
            time: ".time, .date",
        },
    ),
    media(
        "Techub News",
        "https://www.techub.news/hongkong",
        "#e67e22",
        Strategy::Cards {
            containers: r#".news-item, [class*="news-card"]"#,
            title: ".title, h3",
            time: ".time, .date",
        },
    ),
    media(
        "WuBlockchain",
        "https://www.wublock123.com/html/search/index.html?key=%u9999%u6E2F",
        "#e74c3c",
        Strategy::Cards {
            containers: ".search-list-item, .news-item",
            title: ".title, a",
            time: ".time, .date",
        },
    ),
    media(
        "TechFlow",
        "https://www.techflowpost.com/zh-CN/article",
        "#9b59b6",
        Strategy::Cards {
            containers: r#".article-item, [class*="article"]"#,
            title: ".title, h2, h3",
            time: ".time",
        },
    ),
];

pub static EXCHANGE_SOURCES: &[SourceConfig] = &[
    exchange("Binance", "https://www.binance.com/zh-CN/support/announcement/c-48?navId=48", "#F3BA2F"),
    exchange("OKX", "https://www.okx.com/zh-hans/help/section/announcements-latest-announcements", "#000000"),
    exchange("Bybit", "https://announcements.bybit.com/zh-MY/", "#f7a600"),
    exchange("Bitget", "https://www.bitget.com/zh-CN/support/announcements", "#00F0FF"),
    exchange("Gate.io", "https://www.gate.com/zh/announcements/lastest", "#e91e63"),
    exchange("Kucoin", "https://www.kucoin.com/zh-hant/announcement/latest-announcements", "#24ae8f"),
    exchange("MEXC", "https://www.mexc.com/zh-MY/support/announcements", "#00d285"),
    exchange("HTX", "https://www.htx.com/zh-cn/support/list/announcements", "#0052ff"),
    exchange(
        "HashKey Exchange",
        "https://support.hashkey.com/hc/en-gb/categories/900001209743-Announcement",
        "#121212",
    ),
    exchange("HashKey Group", "https://group.hashkey.com/en/news/categories/announcement-1", "#121212"),
    exchange("OSL", "https://www.osl.com/zh-Hans/announcement", "#000000"),
    exchange(
        "Matrixport",
        "https://helpcenter.matrixport.com/zh-CN/collections/10411294-%E5%AE%98%E6%96%B9%E5%85%AC%E5%91%8A",
        "#1e3d59",
    ),
    exchange("Ex.io", "https://www.ex.io/zh/support/announcements", "#0052ff"),
];

/// Find a configured source by its key (media first, then exchanges).
pub fn lookup(key: &str) -> Option<&'static SourceConfig> {
    MEDIA_SOURCES
        .iter()
        .chain(EXCHANGE_SOURCES.iter())
        .find(|c| c.key == key)
}
