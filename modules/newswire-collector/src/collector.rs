//! The collect phase: run adapters, normalize entries, insert with
//! link-unique dedup, back-fill details, stamp source runs.
//!
//! Per-adapter failures are isolated: logged and skipped, never fatal for
//! the batch. The runner decides *which* sources to run; this loop does
//! not time-gate.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::time::timeout;
use tracing::{info, warn};

use newswire_common::datetime::normalize_published_now;
use newswire_common::EntryRecord;
use newswire_store::{InfoInsert, SourceRow, Store};

use crate::adapter::{run_capability, ScraperAdapter};
use crate::http::HttpClient;
use crate::registry;

/// Wall-clock budget for one adapter invocation.
const ADAPTER_BUDGET: Duration = Duration::from_secs(30);
/// Rows back-filled per adapter per invocation.
const BACKFILL_LIMIT: i64 = 5;

#[derive(Debug, Default, Clone)]
pub struct CollectStats {
    pub sources_run: usize,
    pub sources_failed: usize,
    pub parsed: usize,
    pub inserted: usize,
    pub details_stored: usize,
    pub details_backfilled: usize,
}

pub struct Collector {
    store: Store,
    http: HttpClient,
}

impl Collector {
    pub fn new(store: Store) -> Result<Self> {
        Ok(Self {
            store,
            http: HttpClient::new()?,
        })
    }

    /// Run the given source keys. Unknown keys and adapter failures are
    /// logged and skipped.
    pub async fn collect(&self, source_keys: &[String]) -> Result<CollectStats> {
        self.store.seed_sources(&registry::source_seeds()).await?;

        let mut resolved = Vec::new();
        for key in source_keys {
            let Some(source) = self.store.source_by_key(key).await? else {
                warn!(source = %key, "unknown source key, skipping");
                continue;
            };
            let Some(adapter) = registry::find(key) else {
                warn!(source = %key, script_path = %source.script_path, "no adapter registered, skipping");
                continue;
            };
            resolved.push((source, adapter));
        }
        self.collect_resolved(&resolved).await
    }

    pub async fn collect_resolved(
        &self,
        sources: &[(SourceRow, Arc<dyn ScraperAdapter>)],
    ) -> Result<CollectStats> {
        let mut stats = CollectStats::default();

        for (source, adapter) in sources {
            let descriptor = adapter.descriptor();
            let entries = match timeout(ADAPTER_BUDGET, run_capability(adapter.as_ref(), &self.http))
                .await
            {
                Ok(Ok(entries)) => entries,
                Ok(Err(e)) => {
                    warn!(source = %source.key, error = %e, "adapter failed");
                    stats.sources_failed += 1;
                    continue;
                }
                Err(_) => {
                    warn!(source = %source.key, budget_secs = ADAPTER_BUDGET.as_secs(), "adapter exceeded budget");
                    stats.sources_failed += 1;
                    continue;
                }
            };
            stats.parsed += entries.len();

            let mut newly_added: Vec<String> = Vec::new();
            for entry in entries {
                let Some(row) = coerce_entry(entry, source) else {
                    continue;
                };
                match self.store.insert_info(&row).await {
                    Ok(true) => {
                        stats.inserted += 1;
                        newly_added.push(row.link.clone());
                    }
                    Ok(false) => {} // duplicate link, silently ignored
                    Err(e) => warn!(source = %source.key, link = %row.link, error = %e, "insert failed"),
                }
            }

            // Detail fetch for new rows, then a bounded back-fill pass over
            // older rows of the same source still missing detail.
            if descriptor.has_detail_fetcher {
                for link in &newly_added {
                    match adapter.fetch_article_detail(&self.http, link).await {
                        Ok(detail) if !detail.trim().is_empty() => {
                            if let Err(e) = self.store.update_detail(link, detail.trim()).await {
                                warn!(link = %link, error = %e, "detail store failed");
                            } else {
                                stats.details_stored += 1;
                            }
                        }
                        Ok(_) => {}
                        Err(e) => warn!(link = %link, error = %e, "detail fetch failed"),
                    }
                }

                match self
                    .store
                    .links_missing_detail(&source.key, BACKFILL_LIMIT)
                    .await
                {
                    Ok(links) => {
                        for link in links {
                            match adapter.fetch_article_detail(&self.http, &link).await {
                                Ok(detail) if !detail.trim().is_empty() => {
                                    if self.store.update_detail(&link, detail.trim()).await.is_ok() {
                                        stats.details_backfilled += 1;
                                    }
                                }
                                Ok(_) => {}
                                Err(e) => warn!(link = %link, error = %e, "detail backfill failed"),
                            }
                        }
                    }
                    Err(e) => warn!(source = %source.key, error = %e, "backfill query failed"),
                }
            }

            self.store.stamp_source_run(source.id, Utc::now()).await?;
            stats.sources_run += 1;
            info!(
                source = %source.key,
                parsed = stats.parsed,
                inserted = stats.inserted,
                "source collected"
            );
        }

        info!(
            sources = stats.sources_run,
            failed = stats.sources_failed,
            inserted = stats.inserted,
            "collect complete"
        );
        Ok(stats)
    }
}

/// Drop entries missing title/url, normalize the publish time, and
/// standardize source/category from the registry row.
fn coerce_entry(entry: EntryRecord, source: &SourceRow) -> Option<InfoInsert> {
    let title = entry.title.trim().to_string();
    let link = entry.url.trim().to_string();
    if title.is_empty() || link.is_empty() {
        return None;
    }
    let publish = normalize_published_now(None, &entry.published);
    let category = if source.category_key.is_empty() {
        entry.category.unwrap_or_default()
    } else {
        source.category_key.clone()
    };
    Some(InfoInsert {
        source: source.key.clone(),
        publish,
        title,
        link,
        category,
        detail: entry.detail.filter(|d| !d.trim().is_empty()),
        store_link: entry.store_link,
        creator: entry.creator,
        img_link: entry.img,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterDescriptor, Capability};
    use async_trait::async_trait;

    struct CannedAdapter {
        entries: Vec<EntryRecord>,
    }

    #[async_trait]
    impl ScraperAdapter for CannedAdapter {
        fn descriptor(&self) -> AdapterDescriptor {
            AdapterDescriptor {
                source: "feed-a",
                category: "tech",
                label: "Feed A",
                category_label: "科技",
                capabilities: &[Capability::Collect],
                has_detail_fetcher: true,
            }
        }

        async fn collect_latest(&self, _http: &HttpClient) -> Result<Vec<EntryRecord>> {
            Ok(self.entries.clone())
        }

        async fn fetch_article_detail(&self, _http: &HttpClient, url: &str) -> Result<String> {
            Ok(format!("detail for {url}"))
        }
    }

    async fn seeded_store() -> (Store, SourceRow) {
        let store = Store::in_memory().await.unwrap();
        store
            .seed_sources(&[newswire_store::SourceSeed {
                key: "feed-a".into(),
                label: "Feed A".into(),
                category_key: "tech".into(),
                category_label: "科技".into(),
                script_path: "adapters/feed-a".into(),
            }])
            .await
            .unwrap();
        let source = store.source_by_key("feed-a").await.unwrap().unwrap();
        (store, source)
    }

    fn entries() -> Vec<EntryRecord> {
        vec![
            EntryRecord::new("First", "https://x/a").published("2025-06-01T08:00:00+00:00"),
            // Same url with a different title: must dedup to one row.
            EntryRecord::new("Second title for same link", "https://x/a"),
            EntryRecord::new("", "https://x/untitled"),
            EntryRecord::new("No link", ""),
            EntryRecord::new("Fresh", "https://x/b").published("not a date"),
        ]
    }

    #[tokio::test]
    async fn collect_dedups_and_normalizes() {
        let (store, source) = seeded_store().await;
        let collector = Collector::new(store.clone()).unwrap();
        let adapter: Arc<dyn ScraperAdapter> = Arc::new(CannedAdapter { entries: entries() });

        let stats = collector
            .collect_resolved(&[(source.clone(), adapter.clone())])
            .await
            .unwrap();
        assert_eq!(stats.inserted, 2);
        assert_eq!(stats.details_stored, 2);
        assert_eq!(store.info_count().await.unwrap(), 2);

        // Unparseable publish stored as empty, not the raw string.
        let publishes: Vec<String> =
            sqlx::query_scalar("SELECT publish FROM info WHERE link = 'https://x/b'")
                .fetch_all(store.pool())
                .await
                .unwrap();
        assert_eq!(publishes, vec![String::new()]);

        // Re-running over the same content adds nothing.
        let stats = collector
            .collect_resolved(&[(source.clone(), adapter)])
            .await
            .unwrap();
        assert_eq!(stats.inserted, 0);
        assert_eq!(store.info_count().await.unwrap(), 2);

        // Source run was stamped.
        assert!(store.last_run_at(source.id).await.unwrap().is_some());
    }

    struct FailingAdapter;

    #[async_trait]
    impl ScraperAdapter for FailingAdapter {
        fn descriptor(&self) -> AdapterDescriptor {
            AdapterDescriptor {
                source: "feed-b",
                category: "tech",
                label: "Feed B",
                category_label: "科技",
                capabilities: &[Capability::Collect],
                has_detail_fetcher: false,
            }
        }

        async fn collect_latest(&self, _http: &HttpClient) -> Result<Vec<EntryRecord>> {
            anyhow::bail!("upstream broke")
        }
    }

    #[tokio::test]
    async fn adapter_failure_is_isolated() {
        let (store, source_a) = seeded_store().await;
        let collector = Collector::new(store.clone()).unwrap();

        let failing = SourceRow {
            id: source_a.id,
            key: "feed-b".into(),
            label: "Feed B".into(),
            enabled: 1,
            category_key: "tech".into(),
            script_path: "adapters/feed-b".into(),
        };
        let pairs: Vec<(SourceRow, Arc<dyn ScraperAdapter>)> = vec![
            (failing, Arc::new(FailingAdapter)),
            (source_a, Arc::new(CannedAdapter { entries: entries() })),
        ];

        let stats = collector.collect_resolved(&pairs).await.unwrap();
        assert_eq!(stats.sources_failed, 1);
        assert_eq!(stats.sources_run, 1);
        assert_eq!(stats.inserted, 2);
    }
}
