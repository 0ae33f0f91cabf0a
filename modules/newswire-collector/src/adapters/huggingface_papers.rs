//! Hugging Face daily papers — trending JSON API.

use anyhow::Result;
use async_trait::async_trait;

use newswire_common::datetime::normalize_published_now;
use newswire_common::EntryRecord;

use crate::adapter::{AdapterDescriptor, Capability, ScraperAdapter};
use crate::http::HttpClient;

const SOURCE: &str = "huggingface-papers";
const CATEGORY: &str = "tech";
const BASE_URL: &str = "https://huggingface.co";
const TRENDING_URL: &str = "https://huggingface.co/api/daily_papers?limit=30";

pub struct HuggingfacePapers;

#[async_trait]
impl ScraperAdapter for HuggingfacePapers {
    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor {
            source: SOURCE,
            category: CATEGORY,
            label: "Hugging Face Papers",
            category_label: "科技",
            capabilities: &[Capability::Trending],
            has_detail_fetcher: false,
        }
    }

    async fn fetch_trending(&self, http: &HttpClient) -> Result<serde_json::Value> {
        Ok(http.get_json(TRENDING_URL).await?)
    }

    fn process_trending(&self, raw: serde_json::Value) -> Result<Vec<EntryRecord>> {
        let Some(items) = raw.as_array() else {
            return Ok(Vec::new());
        };
        let mut entries = Vec::new();
        for item in items {
            let paper = &item["paper"];
            let id = paper["id"].as_str().unwrap_or_default().trim();
            let title = paper["title"]
                .as_str()
                .unwrap_or_default()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            if id.is_empty() || title.is_empty() {
                continue;
            }
            let raw_date = item["publishedAt"]
                .as_str()
                .or_else(|| paper["publishedAt"].as_str())
                .unwrap_or_default();
            let mut record = EntryRecord::new(title, format!("{BASE_URL}/papers/{id}"))
                .published(normalize_published_now(None, raw_date));
            record.source = Some(SOURCE.to_string());
            record.category = Some(CATEGORY.to_string());
            record.detail = paper["summary"]
                .as_str()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
            entries.push(record);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_papers_to_entries() {
        let raw = json!([
            {
                "publishedAt": "2025-06-01T00:00:00.000Z",
                "paper": {"id": "2506.00001", "title": "A  Paper\n Title", "summary": "abstract"}
            },
            {"paper": {"id": "", "title": "dropped"}}
        ]);
        let entries = HuggingfacePapers.process_trending(raw).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "A Paper Title");
        assert_eq!(entries[0].url, "https://huggingface.co/papers/2506.00001");
        assert_eq!(entries[0].detail.as_deref(), Some("abstract"));
        assert!(entries[0].published.starts_with("2025-06-01T"));
    }
}
