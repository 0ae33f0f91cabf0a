//! Philosophie Magazine — humanities feed (le fil).

use anyhow::Result;
use async_trait::async_trait;

use newswire_common::EntryRecord;

use crate::adapter::{AdapterDescriptor, Capability, ScraperAdapter};
use crate::adapters::feed_util::{entries_from_feed, FeedOptions};
use crate::http::HttpClient;

const SOURCE: &str = "philomag";
const CATEGORY: &str = "humanities";
const FEED_URL: &str = "https://www.philomag.com/rss-le-fil.xml";

pub struct Philomag;

#[async_trait]
impl ScraperAdapter for Philomag {
    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor {
            source: SOURCE,
            category: CATEGORY,
            label: "Philosophie Magazine",
            category_label: "人文",
            capabilities: &[Capability::Feed],
            has_detail_fetcher: false,
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
                summary_as_detail: true,
                ..Default::default()
            },
        ))
    }
}
