//! Shared HTTP fetch helper for adapters.
//!
//! One reqwest client with a browser-ish User-Agent and a bounded timeout,
//! plus a per-process response cache keyed by URL so adapters invoked for
//! both listing and detail never fetch the same page twice in a run.
//! Failures surface as `NewswireError::Scraping`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tracing::debug;

use newswire_common::NewswireError;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
const TIMEOUT_SECS: u64 = 20;

fn scrape_error(message: impl Into<String>) -> NewswireError {
    NewswireError::Scraping(message.into())
}

pub struct HttpClient {
    http: reqwest::Client,
    cache: Mutex<HashMap<String, String>>,
}

impl HttpClient {
    pub fn new() -> Result<Self, NewswireError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| scrape_error(format!("Failed to build scraper HTTP client: {e}")))?;
        Ok(Self {
            http,
            cache: Mutex::new(HashMap::new()),
        })
    }

    pub async fn get_text(&self, url: &str) -> Result<String, NewswireError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| scrape_error(format!("GET {url} failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(scrape_error(format!("GET {url} returned {status}")));
        }
        resp.text()
            .await
            .map_err(|e| scrape_error(format!("Failed to read body of {url}: {e}")))
    }

    /// `get_text` through the per-process cache.
    pub async fn get_text_cached(&self, url: &str) -> Result<String, NewswireError> {
        if let Some(hit) = self.cache.lock().expect("http cache poisoned").get(url) {
            debug!(url, "http cache hit");
            return Ok(hit.clone());
        }
        let body = self.get_text(url).await?;
        self.cache
            .lock()
            .expect("http cache poisoned")
            .insert(url.to_string(), body.clone());
        Ok(body)
    }

    pub async fn get_json(&self, url: &str) -> Result<serde_json::Value, NewswireError> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body).map_err(|e| scrape_error(format!("Invalid JSON from {url}: {e}")))
    }

    /// Fetch and parse an RSS/Atom feed.
    pub async fn fetch_feed(&self, url: &str) -> Result<feed_rs::model::Feed, NewswireError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| scrape_error(format!("Feed fetch {url} failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(scrape_error(format!("Feed fetch {url} returned {status}")));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| scrape_error(format!("Failed to read feed body of {url}: {e}")))?;
        feed_rs::parser::parse(&bytes[..])
            .map_err(|e| scrape_error(format!("Failed to parse feed {url}: {e}")))
    }

    /// Fetch a page and reduce it to plain text for `detail` storage.
    pub async fn get_page_text(&self, url: &str) -> Result<String, NewswireError> {
        let html = self.get_text_cached(url).await?;
        Ok(html_to_text(&html))
    }
}

/// HTML to readable plain text, 120-column wrap.
pub fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), 120)
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_to_text_strips_markup() {
        let text = html_to_text("<html><body><p>Hello <b>world</b></p></body></html>");
        assert!(text.contains("Hello"));
        assert!(text.contains("world"));
        assert!(!text.contains('<'));
    }
}
