//! 触乐 (chuapp.com) — game journalism, RSS.

use anyhow::Result;
use async_trait::async_trait;

use newswire_common::EntryRecord;

use crate::adapter::{AdapterDescriptor, Capability, ScraperAdapter};
use crate::adapters::feed_util::{entries_from_feed, FeedOptions};
use crate::http::HttpClient;

const SOURCE: &str = "chuapp";
const CATEGORY: &str = "game";
const FEED_URL: &str = "http://www.chuapp.com/feed";

pub struct Chuapp;

#[async_trait]
impl ScraperAdapter for Chuapp {
    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor {
            source: SOURCE,
            category: CATEGORY,
            label: "触乐",
            category_label: "游戏",
            capabilities: &[Capability::Feed],
            has_detail_fetcher: true,
        }
    }

    async fn fetch_feed(&self, http: &HttpClient) -> Result<feed_rs::model::Feed> {
        Ok(http.fetch_feed(FEED_URL).await?)
    }

    fn process_entries(&self, feed: feed_rs::model::Feed) -> Result<Vec<EntryRecord>> {
        Ok(entries_from_feed(feed, SOURCE, CATEGORY, &FeedOptions::default()))
    }

    async fn fetch_article_detail(&self, http: &HttpClient, url: &str) -> Result<String> {
        Ok(http.get_page_text(url).await?)
    }
}
