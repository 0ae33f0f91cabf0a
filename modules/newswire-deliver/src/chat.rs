//! Group-chat delivery: tenant-token auth plus the message API, with
//! interactive markdown cards and broadcast to every visible chat.

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use tracing::{info, warn};

use newswire_common::{ChatConfig, NewswireError};

fn rejected(message: impl Into<String>) -> anyhow::Error {
    NewswireError::Delivery(message.into()).into()
}

const TIMEOUT_SECS: u64 = 10;
const CARD_TITLE_MAX: usize = 80;
const CARD_BODY_MAX: usize = 18000;
const BROADCAST_CHAT_LIMIT: usize = 200;

pub struct ChatDeliverer {
    config: ChatConfig,
    http: reqwest::Client,
}

impl ChatDeliverer {
    pub fn new(config: ChatConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .map_err(|e| anyhow!("Failed to build chat HTTP client: {e}"))?;
        Ok(Self { config, http })
    }

    pub fn default_chat_id(&self) -> Option<&str> {
        self.config.default_chat_id.as_deref()
    }

    async fn tenant_access_token(&self) -> Result<String> {
        let url = format!(
            "{}/open-apis/auth/v3/tenant_access_token/internal",
            self.config.api_base
        );
        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "app_id": self.config.app_id,
                "app_secret": self.config.app_secret,
            }))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(rejected(format!("tenant_access_token request failed ({status})")));
        }
        let data: serde_json::Value = resp.json().await?;
        if data["code"].as_i64().unwrap_or(-1) != 0 {
            return Err(rejected(format!("tenant_access_token rejected: {data}")));
        }
        data["tenant_access_token"]
            .as_str()
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| anyhow!("tenant_access_token missing in response"))
    }

    async fn post_message(
        &self,
        token: &str,
        chat_id: &str,
        msg_type: &str,
        content: String,
    ) -> Result<()> {
        let url = format!(
            "{}/open-apis/im/v1/messages?receive_id_type=chat_id",
            self.config.api_base
        );
        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {token}"))
            .header("Content-Type", "application/json; charset=utf-8")
            .json(&serde_json::json!({
                "receive_id": chat_id,
                "msg_type": msg_type,
                "content": content,
            }))
            .send()
            .await?;
        let status = resp.status();
        let data: serde_json::Value = resp.json().await.unwrap_or_default();
        if !status.is_success() || data["code"].as_i64().unwrap_or(-1) != 0 {
            return Err(rejected(format!("chat message rejected ({status}): {data}")));
        }
        Ok(())
    }

    pub async fn send_text(&self, chat_id: &str, text: &str) -> Result<()> {
        let token = self.tenant_access_token().await?;
        // The API wants content as stringified JSON.
        let content = serde_json::to_string(&serde_json::json!({ "text": text }))?;
        self.post_message(&token, chat_id, "text", content).await
    }

    /// Send an interactive card with a markdown element. The `markdown`
    /// element renders numbered lists consistently across clients.
    pub async fn send_card(&self, chat_id: &str, title: &str, markdown: &str) -> Result<()> {
        let token = self.tenant_access_token().await?;
        self.send_card_with_token(&token, chat_id, title, markdown)
            .await
    }

    async fn send_card_with_token(
        &self,
        token: &str,
        chat_id: &str,
        title: &str,
        markdown: &str,
    ) -> Result<()> {
        let card = serde_json::json!({
            "config": { "wide_screen_mode": true },
            "header": {
                "template": "blue",
                "title": { "tag": "plain_text", "content": truncate_chars(title, CARD_TITLE_MAX) },
            },
            "elements": [
                { "tag": "markdown", "content": truncate_chars(markdown, CARD_BODY_MAX) }
            ],
        });
        let content = serde_json::to_string(&card)?;
        self.post_message(token, chat_id, "interactive", content)
            .await?;
        info!(chat_id = %chat_id, title = %title, "chat card sent");
        Ok(())
    }

    /// Chats visible to the app, paginated.
    pub async fn list_all_chats(&self, token: &str) -> Result<Vec<String>> {
        let mut chat_ids = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut url = format!(
                "{}/open-apis/im/v1/chats?page_size=50",
                self.config.api_base
            );
            if let Some(page) = &page_token {
                url.push_str(&format!("&page_token={page}"));
            }
            let resp = self
                .http
                .get(&url)
                .header("Authorization", format!("Bearer {token}"))
                .send()
                .await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(rejected(format!("chat list request failed ({status})")));
            }
            let data: serde_json::Value = resp.json().await?;
            if data["code"].as_i64().unwrap_or(-1) != 0 {
                return Err(rejected(format!("chat list rejected: {data}")));
            }
            let page = &data["data"];
            if let Some(items) = page["items"].as_array() {
                for item in items {
                    if let Some(chat_id) = item["chat_id"].as_str() {
                        chat_ids.push(chat_id.to_string());
                    }
                }
            }
            page_token = page["page_token"]
                .as_str()
                .map(str::to_string)
                .filter(|t| !t.is_empty());
            if page_token.is_none() || chat_ids.len() >= BROADCAST_CHAT_LIMIT {
                break;
            }
        }
        Ok(chat_ids)
    }

    /// Broadcast a card to every visible chat. Per-chat failures are
    /// logged and do not stop the broadcast; returns the delivered count.
    pub async fn broadcast_card(&self, title: &str, markdown: &str) -> Result<usize> {
        let token = self.tenant_access_token().await?;
        let chats = self.list_all_chats(&token).await?;
        if chats.is_empty() {
            bail!("no visible chats to broadcast to");
        }
        let mut delivered = 0;
        for chat_id in &chats {
            match self
                .send_card_with_token(&token, chat_id, title, markdown)
                .await
            {
                Ok(()) => delivered += 1,
                Err(e) => warn!(chat_id = %chat_id, error = %e, "broadcast send failed"),
            }
        }
        info!(delivered, total = chats.len(), "broadcast complete");
        Ok(delivered)
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}
