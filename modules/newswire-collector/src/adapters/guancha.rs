//! 观察者网 (guancha.cn) — homepage main-news scrape.

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

use newswire_common::datetime::normalize_published_now;
use newswire_common::EntryRecord;

use crate::adapter::{AdapterDescriptor, Capability, ScraperAdapter};
use crate::http::HttpClient;

const SOURCE: &str = "guancha-mainnews";
const CATEGORY: &str = "humanities";
const BASE_URL: &str = "https://www.guancha.cn";
const HOMEPAGE_URL: &str = "https://www.guancha.cn/";

pub struct GuanchaMainNews;

fn article_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Story paths embed the publish date: /politics/2025_06_01_123456.shtml
        Regex::new(
            r#"(?s)<a[^>]+href="(?P<path>/[A-Za-z]+/(?P<y>\d{4})_(?P<m>\d{2})_(?P<d>\d{2})_\d+\.s?html)"[^>]*>(?P<body>.*?)</a>"#,
        )
        .expect("invalid guancha pattern")
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
impl ScraperAdapter for GuanchaMainNews {
    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor {
            source: SOURCE,
            category: CATEGORY,
            label: "观察者网",
            category_label: "人文",
            capabilities: &[Capability::Homepage],
            has_detail_fetcher: true,
        }
    }

    async fn fetch_homepage(&self, http: &HttpClient) -> Result<String> {
        Ok(http.get_text_cached(HOMEPAGE_URL).await?)
    }

    fn parse_articles(&self, html: &str) -> Result<Vec<EntryRecord>> {
        let mut entries = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for caps in article_pattern().captures_iter(html) {
            let path = caps["path"].to_string();
            if !seen.insert(path.clone()) {
                continue;
            }
            let title = text_of(&caps["body"]);
            if title.is_empty() {
                continue;
            }
            let date_raw = format!("{}-{}-{}", &caps["y"], &caps["m"], &caps["d"]);
            let mut record = EntryRecord::new(title, format!("{BASE_URL}{path}"))
                .published(normalize_published_now(None, &date_raw));
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
    fn extracts_dated_story_links() {
        let html = r#"
        <a href="/politics/2025_06_01_123456.shtml"><span>头条标题</span></a>
        <a href="/politics/2025_06_01_123456.shtml">重复</a>
        <a href="/about/team.html">关于我们</a>
        "#;
        let entries = GuanchaMainNews.parse_articles(html).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].url,
            "https://www.guancha.cn/politics/2025_06_01_123456.shtml"
        );
        assert!(entries[0].published.starts_with("2025-06-01T"));
    }
}
