//! Deconstructor of Fun — game business analysis, RSS.

use anyhow::Result;
use async_trait::async_trait;

use newswire_common::EntryRecord;

use crate::adapter::{AdapterDescriptor, Capability, ScraperAdapter};
use crate::adapters::feed_util::{entries_from_feed, FeedOptions};
use crate::http::HttpClient;

const SOURCE: &str = "deconstructoroffun";
const CATEGORY: &str = "game";
const FEED_URL: &str = "https://www.deconstructoroffun.com/blog?format=rss";

pub struct DeconstructorOfFun;

#[async_trait]
impl ScraperAdapter for DeconstructorOfFun {
    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor {
            source: SOURCE,
            category: CATEGORY,
            label: "Deconstructor of Fun",
            category_label: "游戏",
            capabilities: &[Capability::Feed],
            has_detail_fetcher: false,
        }
    }

    async fn fetch_feed(&self, http: &HttpClient) -> Result<feed_rs::model::Feed> {
        Ok(http.fetch_feed(FEED_URL).await?)
    }

    fn process_entries(&self, feed: feed_rs::model::Feed) -> Result<Vec<EntryRecord>> {
        // Long-form essays arrive slowly; keep a wider window than most.
        Ok(entries_from_feed(
            feed,
            SOURCE,
            CATEGORY,
            &FeedOptions {
                max_age_days: Some(60),
                summary_as_detail: true,
                ..Default::default()
            },
        ))
    }
}
