//! arXiv cs.AI recent listing — list page, regex extraction.

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

use newswire_common::EntryRecord;

use crate::adapter::{AdapterDescriptor, Capability, ScraperAdapter};
use crate::http::HttpClient;

const SOURCE: &str = "arxiv-cs-ai";
const CATEGORY: &str = "tech";
const BASE_URL: &str = "https://arxiv.org";
const LIST_URL: &str = "https://arxiv.org/list/cs.AI/recent";
const MAX_ITEMS: usize = 25;

pub struct ArxivCsAi;

fn abs_link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // The listing interleaves <dt> (with the /abs/ link) and <dd>
        // (with the title div); capture both in one pass.
        Regex::new(
            r#"(?s)href="(?P<path>/abs/[\d.v]+)".*?list-title[^>]*>\s*(?:<span[^>]*>Title:</span>)?\s*(?P<title>[^<]+)"#,
        )
        .expect("invalid arxiv pattern")
    })
}

#[async_trait]
impl ScraperAdapter for ArxivCsAi {
    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor {
            source: SOURCE,
            category: CATEGORY,
            label: "arXiv cs.AI",
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
        let mut seen = std::collections::HashSet::new();
        for caps in abs_link_pattern().captures_iter(html) {
            let path = caps["path"].to_string();
            if !seen.insert(path.clone()) {
                continue;
            }
            let title = caps["title"].split_whitespace().collect::<Vec<_>>().join(" ");
            if title.is_empty() {
                continue;
            }
            // The "recent" listing shows no per-paper timestamps; leave
            // publish empty rather than guessing a submission date.
            let mut record = EntryRecord::new(title, format!("{BASE_URL}{path}"));
            record.source = Some(SOURCE.to_string());
            record.category = Some(CATEGORY.to_string());
            entries.push(record);
            if entries.len() >= MAX_ITEMS {
                break;
            }
        }
        Ok(entries)
    }
}
