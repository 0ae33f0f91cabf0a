//! Minimal OpenAI-compatible chat-completions client.
//!
//! Points at any endpoint speaking the `/v1/chat/completions` wire format;
//! base URL, path, model and key are all caller-supplied.

pub mod types;

use std::time::Duration;

use anyhow::{anyhow, Result};
use tracing::{debug, warn};

use types::{ChatRequest, ChatResponse, WireMessage};

const DEFAULT_TEMPERATURE: f64 = 0.2;

#[derive(Clone)]
pub struct ChatClient {
    base_url: String,
    api_path: String,
    model: String,
    api_key: String,
    max_retries: u32,
    http: reqwest::Client,
}

impl ChatClient {
    pub fn new(
        base_url: impl Into<String>,
        api_path: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|e| anyhow!("Failed to build AI HTTP client: {e}"))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_path: api_path.into(),
            model: model.into(),
            api_key: api_key.into(),
            max_retries: 3,
            http,
        })
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!("{}/{}", self.base_url, self.api_path.trim_start_matches('/'))
    }

    /// Single-turn system+user chat at temperature 0.2. Returns the raw
    /// assistant text. Transport and empty-response failures are retried
    /// with `min(2^(n-1), 10)`-second backoff up to `max_retries`.
    pub async fn chat(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            temperature: DEFAULT_TEMPERATURE,
            messages: vec![
                WireMessage::system(system_prompt),
                WireMessage::user(user_prompt),
            ],
        };

        let mut last_error = anyhow!("no attempt made");
        for attempt in 1..=self.max_retries {
            match self.chat_once(&request).await {
                Ok(content) => return Ok(content),
                Err(e) => {
                    if attempt < self.max_retries {
                        let wait = 2u64.saturating_pow(attempt - 1).min(10);
                        warn!(attempt, wait, error = %e, "AI chat attempt failed, retrying");
                        tokio::time::sleep(Duration::from_secs(wait)).await;
                    }
                    last_error = e;
                }
            }
        }
        Err(anyhow!("AI request failed after {} attempts: {last_error}", self.max_retries))
    }

    async fn chat_once(&self, request: &ChatRequest) -> Result<String> {
        debug!(model = %request.model, "AI chat request");

        let response = self
            .http
            .post(self.url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("AI API error ({status}): {error_text}"));
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| anyhow!("AI response contained no content"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_base_and_path() {
        let client =
            ChatClient::new("https://api.example.com", "/v1/chat/completions", "m", "k", 30)
                .unwrap();
        assert_eq!(client.url(), "https://api.example.com/v1/chat/completions");

        let client = ChatClient::new("https://api.example.com/", "v1/chat/completions", "m", "k", 30)
            .unwrap();
        assert_eq!(client.url(), "https://api.example.com/v1/chat/completions");
    }

    #[test]
    fn response_parses_choice_content() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"{\"ok\":true}"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("{\"ok\":true}")
        );
    }
}
