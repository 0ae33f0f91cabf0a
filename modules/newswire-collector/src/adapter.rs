//! The scraper-adapter contract.
//!
//! An adapter describes one external source. It declares a subset of the
//! capabilities below; the collector invokes the first one it declares in
//! fixed priority order. Keeping that order stable is part of the
//! contract — several adapters declare more than one capability and rely
//! on which wins.

use anyhow::{bail, Result};
use async_trait::async_trait;

use newswire_common::EntryRecord;

use crate::http::HttpClient;

/// Capability kinds in priority order (highest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Self-contained collector returning finished entry records.
    Collect,
    /// Homepage fetch + HTML parse pair.
    Homepage,
    /// Trending/API fetch + JSON processor pair.
    Trending,
    /// List-page fetch + HTML parser pair.
    ListPage,
    /// RSS/Atom feed fetch + entries processor pair.
    Feed,
}

/// Priority order used by the dispatcher.
pub const CAPABILITY_PRIORITY: &[Capability] = &[
    Capability::Collect,
    Capability::Homepage,
    Capability::Trending,
    Capability::ListPage,
    Capability::Feed,
];

#[derive(Debug, Clone)]
pub struct AdapterDescriptor {
    /// Stable source key, unique across the registry.
    pub source: &'static str,
    /// Category key the source belongs to.
    pub category: &'static str,
    /// Human label used when seeding the source registry.
    pub label: &'static str,
    /// Category label used when seeding the category registry.
    pub category_label: &'static str,
    pub capabilities: &'static [Capability],
    pub has_detail_fetcher: bool,
}

#[async_trait]
pub trait ScraperAdapter: Send + Sync {
    fn descriptor(&self) -> AdapterDescriptor;

    // --- Capability 1: full collector ---
    async fn collect_latest(&self, _http: &HttpClient) -> Result<Vec<EntryRecord>> {
        bail!("{}: collect_latest not supported", self.descriptor().source)
    }

    // --- Capability 2: homepage + parser ---
    async fn fetch_homepage(&self, _http: &HttpClient) -> Result<String> {
        bail!("{}: fetch_homepage not supported", self.descriptor().source)
    }

    fn parse_articles(&self, _html: &str) -> Result<Vec<EntryRecord>> {
        bail!("{}: parse_articles not supported", self.descriptor().source)
    }

    // --- Capability 3: trending fetch + processor ---
    async fn fetch_trending(&self, _http: &HttpClient) -> Result<serde_json::Value> {
        bail!("{}: fetch_trending not supported", self.descriptor().source)
    }

    fn process_trending(&self, _raw: serde_json::Value) -> Result<Vec<EntryRecord>> {
        bail!("{}: process_trending not supported", self.descriptor().source)
    }

    // --- Capability 4: list page + parser ---
    async fn fetch_list_page(&self, _http: &HttpClient) -> Result<String> {
        bail!("{}: fetch_list_page not supported", self.descriptor().source)
    }

    fn parse_list(&self, _html: &str) -> Result<Vec<EntryRecord>> {
        bail!("{}: parse_list not supported", self.descriptor().source)
    }

    // --- Capability 5: feed fetch + entries processor ---
    async fn fetch_feed(&self, _http: &HttpClient) -> Result<feed_rs::model::Feed> {
        bail!("{}: fetch_feed not supported", self.descriptor().source)
    }

    fn process_entries(&self, _feed: feed_rs::model::Feed) -> Result<Vec<EntryRecord>> {
        bail!("{}: process_entries not supported", self.descriptor().source)
    }

    // --- Optional article-detail fetcher ---
    async fn fetch_article_detail(&self, _http: &HttpClient, _url: &str) -> Result<String> {
        bail!("{}: fetch_article_detail not supported", self.descriptor().source)
    }
}

/// Invoke the adapter's highest-priority declared capability.
pub async fn run_capability(
    adapter: &dyn ScraperAdapter,
    http: &HttpClient,
) -> Result<Vec<EntryRecord>> {
    let descriptor = adapter.descriptor();
    for capability in CAPABILITY_PRIORITY {
        if !descriptor.capabilities.contains(capability) {
            continue;
        }
        return match capability {
            Capability::Collect => adapter.collect_latest(http).await,
            Capability::Homepage => {
                let html = adapter.fetch_homepage(http).await?;
                adapter.parse_articles(&html)
            }
            Capability::Trending => {
                let raw = adapter.fetch_trending(http).await?;
                adapter.process_trending(raw)
            }
            Capability::ListPage => {
                let html = adapter.fetch_list_page(http).await?;
                adapter.parse_list(&html)
            }
            Capability::Feed => {
                let feed = adapter.fetch_feed(http).await?;
                adapter.process_entries(feed)
            }
        };
    }
    bail!("{}: adapter declares no capability", descriptor.source)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TwoCapability;

    #[async_trait]
    impl ScraperAdapter for TwoCapability {
        fn descriptor(&self) -> AdapterDescriptor {
            AdapterDescriptor {
                source: "two-cap",
                category: "tech",
                label: "Two Capability",
                category_label: "科技",
                // Declared feed-first; dispatch must still prefer homepage.
                capabilities: &[Capability::Feed, Capability::Homepage],
                has_detail_fetcher: false,
            }
        }

        async fn fetch_homepage(&self, _http: &HttpClient) -> Result<String> {
            Ok("<html>home</html>".to_string())
        }

        fn parse_articles(&self, _html: &str) -> Result<Vec<EntryRecord>> {
            Ok(vec![EntryRecord::new("via homepage", "https://x/1")])
        }

        fn process_entries(&self, _feed: feed_rs::model::Feed) -> Result<Vec<EntryRecord>> {
            Ok(vec![EntryRecord::new("via feed", "https://x/2")])
        }
    }

    #[tokio::test]
    async fn dispatch_honors_priority_order_not_declaration_order() {
        let http = HttpClient::new().unwrap();
        let entries = run_capability(&TwoCapability, &http).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "via homepage");
    }
}
