//! Naavik Digest — games business research, RSS.

use anyhow::Result;
use async_trait::async_trait;

use newswire_common::EntryRecord;

use crate::adapter::{AdapterDescriptor, Capability, ScraperAdapter};
use crate::adapters::feed_util::{entries_from_feed, FeedOptions};
use crate::http::HttpClient;

const SOURCE: &str = "naavik-digest";
const CATEGORY: &str = "game";
const FEED_URL: &str = "https://naavik.co/feed/";

pub struct NaavikDigest;

#[async_trait]
impl ScraperAdapter for NaavikDigest {
    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor {
            source: SOURCE,
            category: CATEGORY,
            label: "Naavik Digest",
            category_label: "游戏",
            capabilities: &[Capability::Feed],
            has_detail_fetcher: true,
        }
    }

    async fn fetch_feed(&self, http: &HttpClient) -> Result<feed_rs::model::Feed> {
        Ok(http.fetch_feed(FEED_URL).await?)
    }

    fn process_entries(&self, feed: feed_rs::model::Feed) -> Result<Vec<EntryRecord>> {
        // Only the digest posts carry cross-company analysis; drop the
        // podcast episodes that share the same feed.
        let mut entries = entries_from_feed(feed, SOURCE, CATEGORY, &FeedOptions::default());
        entries.retain(|e| !e.title.to_lowercase().starts_with("podcast:"));
        Ok(entries)
    }

    async fn fetch_article_detail(&self, http: &HttpClient, url: &str) -> Result<String> {
        Ok(http.get_page_text(url).await?)
    }
}
