//! OpenAI research index — list page with ld+json structured data.

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

use newswire_common::datetime::normalize_published_now;
use newswire_common::EntryRecord;

use crate::adapter::{AdapterDescriptor, Capability, ScraperAdapter};
use crate::http::HttpClient;

const SOURCE: &str = "openai.research";
const CATEGORY: &str = "tech";
const BASE_URL: &str = "https://openai.com";
const LIST_URL: &str = "https://openai.com/research/index/";

pub struct OpenAiResearch;

fn absolutize(href: &str) -> String {
    if href.starts_with("http") {
        return href.to_string();
    }
    url::Url::parse(BASE_URL)
        .and_then(|base| base.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

fn ld_json_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?s)<script[^>]+type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
            .expect("invalid ld+json pattern")
    })
}

/// Walk a JSON tree collecting article-typed objects.
fn collect_articles(node: &serde_json::Value, out: &mut Vec<EntryRecord>) {
    match node {
        serde_json::Value::Object(map) => {
            let type_name = map
                .get("@type")
                .and_then(|t| match t {
                    serde_json::Value::String(s) => Some(s.clone()),
                    serde_json::Value::Array(items) => items
                        .iter()
                        .find_map(|v| v.as_str().map(str::to_string)),
                    _ => None,
                })
                .unwrap_or_default()
                .to_lowercase();
            if matches!(type_name.as_str(), "blogposting" | "newsarticle" | "article") {
                let title = map
                    .get("headline")
                    .or_else(|| map.get("name"))
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                let url = map
                    .get("url")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .or_else(|| {
                        map.get("mainEntityOfPage").and_then(|v| match v {
                            serde_json::Value::String(s) => Some(s.clone()),
                            serde_json::Value::Object(o) => o
                                .get("@id")
                                .or_else(|| o.get("url"))
                                .and_then(|u| u.as_str().map(str::to_string)),
                            _ => None,
                        })
                    })
                    .unwrap_or_default();
                if !title.is_empty() && !url.is_empty() {
                    let url = absolutize(&url);
                    let raw_date = map
                        .get("datePublished")
                        .or_else(|| map.get("dateCreated"))
                        .or_else(|| map.get("dateModified"))
                        .and_then(|v| v.as_str())
                        .unwrap_or_default();
                    let mut record =
                        EntryRecord::new(title, url).published(normalize_published_now(None, raw_date));
                    record.source = Some(SOURCE.to_string());
                    record.category = Some(CATEGORY.to_string());
                    out.push(record);
                }
            }
            for value in map.values() {
                collect_articles(value, out);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                collect_articles(item, out);
            }
        }
        _ => {}
    }
}

#[async_trait]
impl ScraperAdapter for OpenAiResearch {
    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor {
            source: SOURCE,
            category: CATEGORY,
            label: "OpenAI Research",
            category_label: "科技",
            capabilities: &[Capability::ListPage],
            has_detail_fetcher: false,
        }
    }

    async fn fetch_list_page(&self, http: &HttpClient) -> Result<String> {
        Ok(http.get_text_cached(LIST_URL).await?)
    }

    fn parse_list(&self, html: &str) -> Result<Vec<EntryRecord>> {
        let mut entries = Vec::new();
        for caps in ld_json_pattern().captures_iter(html) {
            let Ok(payload) = serde_json::from_str::<serde_json::Value>(caps[1].trim()) else {
                continue;
            };
            collect_articles(&payload, &mut entries);
        }
        // One page can embed the same article in several ld+json blocks.
        let mut seen = std::collections::HashSet::new();
        entries.retain(|e| seen.insert(e.url.clone()));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ld_json_articles() {
        let html = r#"
        <html><head>
        <script type="application/ld+json">
        {"@type": "BlogPosting", "headline": "New result",
         "url": "/research/new-result", "datePublished": "2025-06-01"}
        </script>
        <script type="application/ld+json">
        [{"@type": "WebSite", "name": "ignored"},
         {"@type": "NewsArticle", "headline": "Second",
          "mainEntityOfPage": {"@id": "https://openai.com/research/second"},
          "datePublished": "2025-06-02T10:00:00Z"}]
        </script>
        </head></html>"#;
        let entries = OpenAiResearch.parse_list(html).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].url, "https://openai.com/research/new-result");
        assert_eq!(entries[1].title, "Second");
        assert_eq!(entries[1].published, "2025-06-02T10:00:00+00:00");
    }
}
