// src/ingest/providers/fixed.rs
use anyhow::Result;
use async_trait::async_trait;

use crate::ingest::types::RecordSource;
use crate::record::ScrapedCard;

/// In-memory cards, handed out on every fetch. Used for request bodies and fixtures.
pub struct StaticSource {
    name: &'static str,
    cards: Vec<ScrapedCard>,
}

impl StaticSource {
    pub fn new(name: &'static str, cards: Vec<ScrapedCard>) -> Self {
        Self { name, cards }
    }
}

#[async_trait]
impl RecordSource for StaticSource {
    async fn fetch(&self) -> Result<Vec<ScrapedCard>> {
        Ok(self.cards.clone())
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
