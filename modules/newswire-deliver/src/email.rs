//! E-mail delivery over a transactional HTTP API (Resend-compatible).

use std::time::Duration;

use anyhow::{anyhow, Result};
use tracing::info;

use newswire_common::{MailConfig, NewswireError};

const MAIL_API_URL: &str = "https://api.resend.com/emails";
const TIMEOUT_SECS: u64 = 20;

pub struct EmailDeliverer {
    config: MailConfig,
    http: reqwest::Client,
}

impl EmailDeliverer {
    pub fn new(config: MailConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .map_err(|e| anyhow!("Failed to build mail HTTP client: {e}"))?;
        Ok(Self { config, http })
    }

    pub fn plain_only(&self) -> bool {
        self.config.plain_only
    }

    /// Send one message. `html` is omitted in plain-only mode; the text
    /// alternative is always present. Returns the provider message id.
    pub async fn send(
        &self,
        receivers: &[String],
        subject: &str,
        html: Option<&str>,
        text: &str,
        list_unsubscribe: Option<&str>,
    ) -> Result<String> {
        if receivers.is_empty() {
            return Err(anyhow!("no receivers configured"));
        }

        let mut payload = serde_json::json!({
            "from": self.config.from,
            "to": receivers,
            "subject": subject,
            "text": text,
        });
        if let Some(html) = html {
            payload["html"] = serde_json::Value::String(html.to_string());
        }
        // Deliverability headers: honor the configured List-Unsubscribe
        // target, else the per-recipient unsubscribe link.
        let unsubscribe = self
            .config
            .list_unsubscribe
            .as_deref()
            .or(list_unsubscribe);
        if let Some(url) = unsubscribe {
            let mut headers = serde_json::Map::new();
            headers.insert(
                "List-Unsubscribe".to_string(),
                serde_json::Value::String(format!("<{url}>")),
            );
            if url.starts_with("http") {
                headers.insert(
                    "List-Unsubscribe-Post".to_string(),
                    serde_json::Value::String("List-Unsubscribe=One-Click".to_string()),
                );
            }
            payload["headers"] = serde_json::Value::Object(headers);
        }

        let resp = self
            .http
            .post(MAIL_API_URL)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NewswireError::Delivery(format!("mail API error ({status}): {body}")).into());
        }
        let data: serde_json::Value = resp.json().await.unwrap_or_default();
        let message_id = data["id"].as_str().unwrap_or_default().to_string();
        info!(
            to = %receivers.join(","),
            subject = %subject,
            message_id = %message_id,
            "mail sent"
        );
        Ok(message_id)
    }
}
