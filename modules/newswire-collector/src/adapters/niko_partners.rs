//! Niko Partners — Asia games market research blog.
//!
//! No feed; the WordPress JSON API serves the post list, so this adapter
//! is a self-contained collector over that endpoint.

use anyhow::Result;
use async_trait::async_trait;

use newswire_common::datetime::normalize_published_now;
use newswire_common::EntryRecord;

use crate::adapter::{AdapterDescriptor, Capability, ScraperAdapter};
use crate::http::{html_to_text, HttpClient};

const SOURCE: &str = "nikopartners";
const CATEGORY: &str = "game";
const POSTS_URL: &str = "https://nikopartners.com/wp-json/wp/v2/posts?per_page=15&_fields=link,title,date_gmt,excerpt";

pub struct NikoPartners;

#[async_trait]
impl ScraperAdapter for NikoPartners {
    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor {
            source: SOURCE,
            category: CATEGORY,
            label: "Niko Partners",
            category_label: "游戏",
            capabilities: &[Capability::Collect],
            has_detail_fetcher: true,
        }
    }

    async fn collect_latest(&self, http: &HttpClient) -> Result<Vec<EntryRecord>> {
        let posts = http.get_json(POSTS_URL).await?;
        let Some(items) = posts.as_array() else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::new();
        for item in items {
            let link = item["link"].as_str().unwrap_or_default().trim();
            let title = item["title"]["rendered"].as_str().unwrap_or_default();
            let title = html_to_text(title);
            if link.is_empty() || title.is_empty() {
                continue;
            }
            let raw_date = item["date_gmt"].as_str().unwrap_or_default();
            let mut record = EntryRecord::new(title, link)
                .published(normalize_published_now(None, raw_date));
            record.source = Some(SOURCE.to_string());
            record.category = Some(CATEGORY.to_string());
            record.detail = item["excerpt"]["rendered"]
                .as_str()
                .map(html_to_text)
                .filter(|text| !text.is_empty());
            entries.push(record);
        }
        Ok(entries)
    }

    async fn fetch_article_detail(&self, http: &HttpClient, url: &str) -> Result<String> {
        Ok(http.get_page_text(url).await?)
    }
}
