//! 机器之心 (jiqizhixin.com) — AI news, RSS.

use anyhow::Result;
use async_trait::async_trait;

use newswire_common::EntryRecord;

use crate::adapter::{AdapterDescriptor, Capability, ScraperAdapter};
use crate::adapters::feed_util::{entries_from_feed, FeedOptions};
use crate::http::HttpClient;

const SOURCE: &str = "jiqizhixin";
const CATEGORY: &str = "tech";
const FEED_URL: &str = "https://www.jiqizhixin.com/rss";

pub struct Jiqizhixin;

#[async_trait]
impl ScraperAdapter for Jiqizhixin {
    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor {
            source: SOURCE,
            category: CATEGORY,
            label: "机器之心",
            category_label: "科技",
            capabilities: &[Capability::Feed],
            has_detail_fetcher: true,
        }
    }

    async fn fetch_feed(&self, http: &HttpClient) -> Result<feed_rs::model::Feed> {
        Ok(http.fetch_feed(FEED_URL).await?)
    }

    fn process_entries(&self, feed: feed_rs::model::Feed) -> Result<Vec<EntryRecord>> {
        Ok(entries_from_feed(
            feed,
            SOURCE,
            CATEGORY,
            &FeedOptions {
                max_items: 30,
                ..Default::default()
            },
        ))
    }

    async fn fetch_article_detail(&self, http: &HttpClient, url: &str) -> Result<String> {
        Ok(http.get_page_text(url).await?)
    }
}
