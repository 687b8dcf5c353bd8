// src/ingest/types.rs
use anyhow::Result;

use crate::record::ScrapedCard;

/// Anything that yields scraped cards: a live scraper, a saved snapshot, a fixture.
#[async_trait::async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<ScrapedCard>>;
    fn name(&self) -> &'static str;
}
