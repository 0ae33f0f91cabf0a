//! 游戏陀螺 (youxituoluo.com) — homepage scrape; the site has no feed.

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

use newswire_common::EntryRecord;

use crate::adapter::{AdapterDescriptor, Capability, ScraperAdapter};
use crate::http::HttpClient;

const SOURCE: &str = "youxituoluo";
const CATEGORY: &str = "game";
const HOMEPAGE_URL: &str = "https://www.youxituoluo.com/";

pub struct Youxituoluo;

fn article_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Article links look like https://www.youxituoluo.com/123456.html;
        // the anchor body may wrap the title in inline tags.
        Regex::new(
            r#"(?s)<a[^>]+href="(?P<url>https://www\.youxituoluo\.com/\d+\.html)"[^>]*>(?P<body>.*?)</a>"#,
        )
        .expect("invalid youxituoluo pattern")
    })
}

fn strip_tags(html: &str) -> String {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    let tags = TAGS.get_or_init(|| Regex::new(r"<[^>]+>").expect("invalid tag pattern"));
    tags.replace_all(html, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl ScraperAdapter for Youxituoluo {
    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor {
            source: SOURCE,
            category: CATEGORY,
            label: "游戏陀螺",
            category_label: "游戏",
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
            let url = caps["url"].to_string();
            if !seen.insert(url.clone()) {
                continue;
            }
            let title = strip_tags(&caps["body"]);
            if title.is_empty() {
                continue;
            }
            // The homepage carries no timestamps; detail back-fill owns
            // the body and publish stays empty.
            let mut record = EntryRecord::new(title, url);
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
