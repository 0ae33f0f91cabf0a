//! Stratechery — tech strategy essays, RSS (passport feed).

use anyhow::Result;
use async_trait::async_trait;

use newswire_common::EntryRecord;

use crate::adapter::{AdapterDescriptor, Capability, ScraperAdapter};
use crate::adapters::feed_util::{entries_from_feed, FeedOptions};
use crate::http::HttpClient;

const SOURCE: &str = "stratechery";
const CATEGORY: &str = "tech";
const FEED_URL: &str = "https://stratechery.com/feed/";

pub struct Stratechery;

#[async_trait]
impl ScraperAdapter for Stratechery {
    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor {
            source: SOURCE,
            category: CATEGORY,
            label: "Stratechery",
            category_label: "科技",
            capabilities: &[Capability::Feed],
            has_detail_fetcher: false,
        }
    }

    async fn fetch_feed(&self, http: &HttpClient) -> Result<feed_rs::model::Feed> {
        Ok(http.fetch_feed(FEED_URL).await?)
    }

    fn process_entries(&self, feed: feed_rs::model::Feed) -> Result<Vec<EntryRecord>> {
        let mut entries = entries_from_feed(
            feed,
            SOURCE,
            CATEGORY,
            &FeedOptions {
                summary_as_detail: true,
                ..Default::default()
            },
        );
        // Tracking query params vary per fetch and would defeat link dedup.
        for entry in &mut entries {
            if let Some(idx) = entry.url.find('?') {
                entry.url.truncate(idx);
            }
        }
        Ok(entries)
    }
}
