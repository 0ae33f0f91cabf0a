//! Sensor Tower blog — mobile market data posts, via the blog JSON index.

use anyhow::Result;
use async_trait::async_trait;

use newswire_common::datetime::normalize_published_now;
use newswire_common::EntryRecord;

use crate::adapter::{AdapterDescriptor, Capability, ScraperAdapter};
use crate::http::HttpClient;

const SOURCE: &str = "sensortower";
const CATEGORY: &str = "game";
const BASE_URL: &str = "https://sensortower.com";
const INDEX_URL: &str = "https://sensortower.com/api/blog/posts?limit=20";

pub struct SensorTower;

#[async_trait]
impl ScraperAdapter for SensorTower {
    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor {
            source: SOURCE,
            category: CATEGORY,
            label: "Sensor Tower",
            category_label: "游戏",
            capabilities: &[Capability::Collect],
            has_detail_fetcher: false,
        }
    }

    async fn collect_latest(&self, http: &HttpClient) -> Result<Vec<EntryRecord>> {
        let raw = http.get_json(INDEX_URL).await?;
        let items = raw["posts"]
            .as_array()
            .or_else(|| raw.as_array())
            .cloned()
            .unwrap_or_default();

        let mut entries = Vec::new();
        for item in items {
            let title = item["title"].as_str().unwrap_or_default().trim().to_string();
            let slug = item["slug"].as_str().unwrap_or_default().trim();
            let url = item["url"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{BASE_URL}/blog/{slug}"));
            if title.is_empty() || slug.is_empty() && item["url"].is_null() {
                continue;
            }
            let raw_date = item["published_at"]
                .as_str()
                .or_else(|| item["date"].as_str())
                .unwrap_or_default();
            let mut record =
                EntryRecord::new(title, url).published(normalize_published_now(None, raw_date));
            record.source = Some(SOURCE.to_string());
            record.category = Some(CATEGORY.to_string());
            record.img = item["cover_image"].as_str().map(str::to_string);
            entries.push(record);
        }
        Ok(entries)
    }
}
