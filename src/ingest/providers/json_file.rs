// src/ingest/providers/json_file.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;

use crate::ingest::types::RecordSource;
use crate::record::ScrapedCard;

/// Scraper snapshot saved as a JSON array of cards.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn parse_cards(s: &str) -> Result<Vec<ScrapedCard>> {
        serde_json::from_str(s).context("parsing card snapshot JSON")
    }
}

#[async_trait]
impl RecordSource for JsonFileSource {
    async fn fetch(&self) -> Result<Vec<ScrapedCard>> {
        let body = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading snapshot {}", self.path.display()))?;
        Self::parse_cards(&body)
    }

    fn name(&self) -> &'static str {
        "json_file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_time_alias_and_missing_fields() {
        let cards = JsonFileSource::parse_cards(
            r#"[{"country":"Italia","title":"Istat: inflazione","time":"2 giorni fa"}]"#,
        )
        .unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].time_text, "2 giorni fa");
        assert_eq!(cards[0].importance, 0);
        assert!(cards[0].description.is_empty());
    }

    #[test]
    fn rejects_non_array() {
        assert!(JsonFileSource::parse_cards(r#"{"title":"x"}"#).is_err());
    }
}
