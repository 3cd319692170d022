pub mod blockbeats;
pub mod chaincatcher;
pub mod configured;
pub mod foresight;
pub mod twitter;

use crate::ingest::config::{EXCHANGE_SOURCES, MEDIA_SOURCES};
use crate::ingest::types::SourceProvider;
use crate::ingest::ProviderBatch;

pub use blockbeats::BlockBeatsProvider;
pub use chaincatcher::ChainCatcherProvider;
pub use configured::ConfiguredProvider;
pub use foresight::ForesightProvider;
pub use twitter::TwitterProvider;

fn configured(keys: impl Iterator<Item = &'static str>) -> Vec<Box<dyn SourceProvider>> {
    keys.map(|k| Box::new(ConfiguredProvider::new(k)) as Box<dyn SourceProvider>)
        .collect()
}

/// Production line-up: flash feeds together, then media, exchanges and the
/// social timeline one page at a time.
pub fn default_batches(twitter_handle: &str) -> Vec<ProviderBatch> {
    vec![
        ProviderBatch::concurrent(
            "flash",
            vec![
                Box::new(BlockBeatsProvider),
                Box::new(ChainCatcherProvider),
                Box::new(ForesightProvider),
            ],
        ),
        ProviderBatch::sequential("media", configured(MEDIA_SOURCES.iter().map(|c| c.key))),
        ProviderBatch::sequential("exchanges", configured(EXCHANGE_SOURCES.iter().map(|c| c.key))),
        ProviderBatch::sequential("social", vec![Box::new(TwitterProvider::new(twitter_handle))]),
    ]
}
