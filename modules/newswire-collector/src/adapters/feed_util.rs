//! Shared RSS/Atom entry extraction used by the feed adapters.

use chrono::{Duration, Utc};

use newswire_common::datetime::normalize_published_now;
use newswire_common::EntryRecord;

pub struct FeedOptions {
    pub max_items: usize,
    pub max_age_days: Option<i64>,
    /// Store the feed's own summary text as the article detail. Sources
    /// with full-content feeds opt in; the rest back-fill via a detail
    /// fetcher.
    pub summary_as_detail: bool,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            max_items: 20,
            max_age_days: Some(30),
            summary_as_detail: false,
        }
    }
}

/// Reduce a parsed feed to entry records: link from the first link (or an
/// http-looking id), title required, published from published/updated and
/// normalized to ISO-8601 UTC, newest first, truncated.
pub fn entries_from_feed(
    feed: feed_rs::model::Feed,
    source: &str,
    category: &str,
    options: &FeedOptions,
) -> Vec<EntryRecord> {
    let cutoff = options
        .max_age_days
        .map(|days| Utc::now() - Duration::days(days));

    let mut entries: Vec<EntryRecord> = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let url = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))?;

            let title = entry.title.map(|t| t.content).unwrap_or_default();
            let title = title.trim().to_string();
            if title.is_empty() {
                return None;
            }

            let published = entry.published.or(entry.updated);
            if let (Some(cutoff), Some(date)) = (cutoff, published) {
                if date < cutoff {
                    return None;
                }
            }
            let published = published
                .map(|dt| normalize_published_now(Some(dt.with_timezone(&Utc)), ""))
                .unwrap_or_default();

            let mut record = EntryRecord::new(title, url).published(published);
            record.source = Some(source.to_string());
            record.category = Some(category.to_string());
            if options.summary_as_detail {
                record.detail = entry
                    .summary
                    .map(|s| crate::http::html_to_text(&s.content))
                    .filter(|text| !text.is_empty());
            }
            record.creator = entry
                .authors
                .first()
                .map(|person| person.name.trim().to_string())
                .filter(|name| !name.is_empty());
            Some(record)
        })
        .collect();

    entries.sort_by(|a, b| b.published.cmp(&a.published));
    entries.truncate(options.max_items);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> feed_rs::model::Feed {
        feed_rs::parser::parse(xml.as_bytes()).unwrap()
    }

    const RSS: &str = r#"<?xml version="1.0"?>
    <rss version="2.0"><channel><title>T</title>
      <item>
        <title>Newer article</title>
        <link>https://example.com/b</link>
        <pubDate>Mon, 02 Jun 2025 08:00:00 +0000</pubDate>
      </item>
      <item>
        <title>Older article</title>
        <link>https://example.com/a</link>
        <pubDate>Sun, 01 Jun 2025 08:00:00 +0000</pubDate>
      </item>
      <item>
        <title></title>
        <link>https://example.com/untitled</link>
      </item>
    </channel></rss>"#;

    #[test]
    fn extracts_sorts_and_normalizes() {
        let entries = entries_from_feed(
            parse(RSS),
            "example",
            "tech",
            &FeedOptions {
                max_age_days: None,
                ..Default::default()
            },
        );
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].url, "https://example.com/b");
        assert_eq!(entries[0].published, "2025-06-02T08:00:00+00:00");
        assert_eq!(entries[0].source.as_deref(), Some("example"));
        assert_eq!(entries[1].url, "https://example.com/a");
    }

    #[test]
    fn truncates_to_max_items() {
        let entries = entries_from_feed(
            parse(RSS),
            "example",
            "tech",
            &FeedOptions {
                max_items: 1,
                max_age_days: None,
                ..Default::default()
            },
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Newer article");
    }
}
