//! The Gradient — machine learning essays, RSS.

use anyhow::Result;
use async_trait::async_trait;

use newswire_common::EntryRecord;

use crate::adapter::{AdapterDescriptor, Capability, ScraperAdapter};
use crate::adapters::feed_util::{entries_from_feed, FeedOptions};
use crate::http::HttpClient;

const SOURCE: &str = "thegradient";
const CATEGORY: &str = "tech";
const FEED_URL: &str = "https://thegradient.pub/rss/";

pub struct TheGradient;

#[async_trait]
impl ScraperAdapter for TheGradient {
    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor {
            source: SOURCE,
            category: CATEGORY,
            label: "The Gradient",
            category_label: "科技",
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
                max_age_days: Some(90),
                summary_as_detail: true,
                ..Default::default()
            },
        ))
    }
}
