//! 阮一峰的网络日志 — tech essays, Atom with full content.

use anyhow::Result;
use async_trait::async_trait;

use newswire_common::EntryRecord;

use crate::adapter::{AdapterDescriptor, Capability, ScraperAdapter};
use crate::adapters::feed_util::{entries_from_feed, FeedOptions};
use crate::http::HttpClient;

const SOURCE: &str = "ruanyifeng";
const CATEGORY: &str = "tech";
const FEED_URL: &str = "https://www.ruanyifeng.com/blog/atom.xml";

pub struct Ruanyifeng;

#[async_trait]
impl ScraperAdapter for Ruanyifeng {
    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor {
            source: SOURCE,
            category: CATEGORY,
            label: "阮一峰的网络日志",
            category_label: "科技",
            capabilities: &[Capability::Feed],
            has_detail_fetcher: false,
        }
    }

    async fn fetch_feed(&self, http: &HttpClient) -> Result<feed_rs::model::Feed> {
        Ok(http.fetch_feed(FEED_URL).await?)
    }

    fn process_entries(&self, feed: feed_rs::model::Feed) -> Result<Vec<EntryRecord>> {
        // The atom feed ships the full essay body; keep it as detail.
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
