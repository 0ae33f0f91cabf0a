//! Google DeepMind blog — list page; anchors carry the post slugs.

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

use newswire_common::EntryRecord;

use crate::adapter::{AdapterDescriptor, Capability, ScraperAdapter};
use crate::http::HttpClient;

const SOURCE: &str = "deepmind";
const CATEGORY: &str = "tech";
const BASE_URL: &str = "https://deepmind.google";
const LIST_URL: &str = "https://deepmind.google/blog/";

pub struct DeepmindBlog;

fn post_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?s)<a[^>]+href="(?P<path>/blog/[a-z0-9-]+/?)"[^>]*>(?P<body>.*?)</a>"#)
            .expect("invalid deepmind pattern")
    })
}

fn text_of(html: &str) -> String {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    let tags = TAGS.get_or_init(|| Regex::new(r"<[^>]+>").expect("invalid tag pattern"));
    tags.replace_all(html, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl ScraperAdapter for DeepmindBlog {
    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor {
            source: SOURCE,
            category: CATEGORY,
            label: "Google DeepMind Blog",
            category_label: "科技",
            capabilities: &[Capability::ListPage],
            has_detail_fetcher: true,
        }
    }

    async fn fetch_list_page(&self, http: &HttpClient) -> Result<String> {
        Ok(http.get_text_cached(LIST_URL).await?)
    }

    fn parse_list(&self, html: &str) -> Result<Vec<EntryRecord>> {
        let mut entries = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for caps in post_pattern().captures_iter(html) {
            let path = caps["path"].trim_end_matches('/').to_string();
            if path == "/blog" || !seen.insert(path.clone()) {
                continue;
            }
            let title = text_of(&caps["body"]);
            if title.is_empty() {
                continue;
            }
            let mut record = EntryRecord::new(title, format!("{BASE_URL}{path}"));
            record.source = Some(SOURCE.to_string());
            record.category = Some(CATEGORY.to_string());
            entries.push(record);
        }
        Ok(entries)
    }

    async fn fetch_article_detail(&self, http: &HttpClient, url: &str) -> Result<String> {
        Ok(http.get_page_text(url).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_index_link_and_dedups() {
        let html = r#"
        <a href="/blog/">All posts</a>
        <a href="/blog/new-model/"><h3>New model</h3></a>
        <a href="/blog/new-model/">New model (again)</a>
        "#;
        let entries = DeepmindBlog.parse_list(html).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].url, "https://deepmind.google/blog/new-model");
        assert_eq!(entries[0].title, "New model");
    }
}
