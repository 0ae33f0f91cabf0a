//! Environment-driven configuration, one loader per component.
//!
//! Loaders fail with `NewswireError::Config` so the runner can tell a
//! misconfigured pipeline apart from a transient failure.

use std::collections::HashMap;
use std::env;

use crate::error::NewswireError;

fn required_env(key: &str) -> Result<String, NewswireError> {
    let value = env::var(key).unwrap_or_default();
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(NewswireError::Config(format!(
            "{key} environment variable is required"
        )));
    }
    Ok(value)
}

fn truthy_env(key: &str) -> bool {
    matches!(
        env::var(key).unwrap_or_default().trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// LLM endpoint configuration for the evaluator.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub base_url: String,
    pub api_path: String,
    pub model: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub request_interval_secs: f64,
    pub max_retries: u32,
    pub weight_overrides: HashMap<String, f64>,
    pub prompt_path: Option<String>,
}

impl AiConfig {
    pub fn from_env() -> Result<Self, NewswireError> {
        let base_url = required_env("AI_API_BASE_URL")?;
        let model = required_env("AI_API_MODEL")?;
        let api_key = required_env("AI_API_KEY")?;

        let api_path = env::var("AI_API_PATH")
            .unwrap_or_default()
            .trim()
            .to_string();
        let api_path = if api_path.is_empty() {
            "/v1/chat/completions".to_string()
        } else {
            api_path
        };

        // Trim a trailing /v1: the path already carries it.
        let mut base = base_url.trim_end_matches('/').to_string();
        if base.to_lowercase().ends_with("/v1") {
            base.truncate(base.len() - 3);
            base = base.trim_end_matches('/').to_string();
        }

        let timeout_secs = env::var("AI_API_TIMEOUT")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(30);
        let request_interval_secs = env::var("AI_REQUEST_INTERVAL")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0.0);
        let max_retries = env::var("AI_MAX_RETRIES")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(3);

        let mut weight_overrides = HashMap::new();
        let overrides_raw = env::var("AI_SCORE_WEIGHTS").unwrap_or_default();
        if !overrides_raw.trim().is_empty() {
            let parsed: serde_json::Value =
                serde_json::from_str(overrides_raw.trim()).map_err(|e| {
                    NewswireError::Config(format!(
                        "AI_SCORE_WEIGHTS must be a JSON object, e.g. {{\"timeliness\":0.3}}: {e}"
                    ))
                })?;
            let Some(map) = parsed.as_object() else {
                return Err(NewswireError::Config(
                    "AI_SCORE_WEIGHTS must be a JSON object".to_string(),
                ));
            };
            for (key, value) in map {
                if let Some(v) = value.as_f64() {
                    if v >= 0.0 {
                        weight_overrides.insert(key.clone(), v);
                    }
                }
            }
        }

        Ok(Self {
            base_url: base,
            api_path,
            model,
            api_key,
            timeout_secs,
            request_interval_secs,
            max_retries,
            weight_overrides,
            prompt_path: env::var("AI_PROMPT_PATH")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        })
    }
}

/// E-mail transport configuration (transactional HTTP API).
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_key: String,
    pub from: String,
    pub plain_only: bool,
    pub list_unsubscribe: Option<String>,
    pub frontend_base_url: Option<String>,
}

impl MailConfig {
    pub fn from_env() -> Result<Self, NewswireError> {
        Ok(Self {
            api_key: required_env("MAIL_API_KEY")?,
            from: required_env("MAIL_FROM")?,
            plain_only: truthy_env("MAIL_PLAIN_ONLY"),
            list_unsubscribe: env::var("MAIL_LIST_UNSUBSCRIBE")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            frontend_base_url: env::var("FRONTEND_BASE_URL")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        })
    }
}

/// Chat transport configuration (tenant-token + message API).
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub api_base: String,
    pub app_id: String,
    pub app_secret: String,
    pub default_chat_id: Option<String>,
}

impl ChatConfig {
    pub fn from_env() -> Result<Self, NewswireError> {
        let api_base = env::var("CHAT_API_BASE")
            .unwrap_or_default()
            .trim()
            .trim_end_matches('/')
            .to_string();
        let api_base = if api_base.is_empty() {
            "https://open.feishu.cn".to_string()
        } else {
            api_base
        };
        Ok(Self {
            api_base,
            app_id: required_env("CHAT_APP_ID")?,
            app_secret: required_env("CHAT_APP_SECRET")?,
            default_chat_id: env::var("CHAT_DEFAULT_CHAT_ID")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        })
    }

    /// Per-pipeline credentials from the store override the environment.
    pub fn with_credentials(mut self, app_id: &str, app_secret: &str) -> Self {
        if !app_id.trim().is_empty() {
            self.app_id = app_id.trim().to_string();
        }
        if !app_secret.trim().is_empty() {
            self.app_secret = app_secret.trim().to_string();
        }
        self
    }
}

/// Runner-level configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub db_path: String,
    pub tz: String,
    pub force_run: bool,
}

impl RunnerConfig {
    pub fn from_env() -> Self {
        let db_path = env::var("NEWSWIRE_DB")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "data/info.db".to_string());
        let tz = env::var("PIPELINE_TZ")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "Asia/Shanghai".to_string());
        Self {
            db_path,
            tz,
            force_run: truthy_env("FORCE_RUN"),
        }
    }

    /// Log presence (not values) of the sensitive transport variables.
    pub fn log_redacted(&self) {
        for name in [
            "AI_API_KEY",
            "MAIL_API_KEY",
            "CHAT_APP_ID",
            "CHAT_APP_SECRET",
        ] {
            let value = env::var(name).unwrap_or_default();
            if value.is_empty() {
                tracing::info!("{name} = (empty)");
            } else {
                tracing::info!("{name} = ({} chars)", value.len());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_parsing() {
        std::env::set_var("NEWSWIRE_TEST_TRUTHY", "Yes");
        assert!(truthy_env("NEWSWIRE_TEST_TRUTHY"));
        std::env::set_var("NEWSWIRE_TEST_TRUTHY", "0");
        assert!(!truthy_env("NEWSWIRE_TEST_TRUTHY"));
        std::env::remove_var("NEWSWIRE_TEST_TRUTHY");
        assert!(!truthy_env("NEWSWIRE_TEST_TRUTHY"));
    }
}
