//! The evaluation loop: select candidates, ask the LLM, validate, score,
//! persist. One article at a time; one commit per article.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use tracing::{info, warn};

use ai_client::ChatClient;
use newswire_common::datetime::try_parse_dt;
use newswire_common::scoring::weighted_mean;
use newswire_common::{AiConfig, Article, MetricDef, NewswireError, PipelineContext};
use newswire_store::{ReviewUpsert, Store};

use crate::prompt::{self, DEFAULT_PROMPT_PATH};
use crate::validate::{self, ValidatedReview};

/// The LLM call seam. Implemented by `ai_client::ChatClient`; tests plug
/// in a scripted backend.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

#[async_trait]
impl ChatBackend for ChatClient {
    async fn chat(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        ChatClient::chat(self, system_prompt, user_prompt).await
    }
}

#[derive(Debug, Clone)]
pub struct EvalParams {
    pub hours: i64,
    pub limit: usize,
    pub overwrite: bool,
    pub categories: Vec<String>,
    pub sources: Vec<String>,
    pub dry_run: bool,
}

impl Default for EvalParams {
    fn default() -> Self {
        Self {
            hours: 24,
            limit: 50,
            overwrite: false,
            categories: Vec::new(),
            sources: Vec::new(),
            dry_run: false,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct EvalStats {
    pub candidates: usize,
    pub evaluated: usize,
    pub failed: usize,
}

pub struct Evaluator {
    store: Store,
    backend: Box<dyn ChatBackend>,
    max_retries: u32,
    request_interval: Duration,
    weight_overrides: HashMap<String, f64>,
    prompt_path: PathBuf,
}

impl Evaluator {
    /// Build from environment configuration with the real LLM backend.
    /// Transport retries are owned by this loop (the backend makes a
    /// single attempt), so parse failures retry on the same schedule.
    pub fn from_config(store: Store, config: &AiConfig) -> Result<Self> {
        let client = ChatClient::new(
            &config.base_url,
            &config.api_path,
            &config.model,
            &config.api_key,
            config.timeout_secs,
        )?
        .with_max_retries(1);
        Ok(Self::new(store, Box::new(client), config))
    }

    pub fn new(store: Store, backend: Box<dyn ChatBackend>, config: &AiConfig) -> Self {
        Self {
            store,
            backend,
            max_retries: config.max_retries.max(1),
            request_interval: Duration::from_secs_f64(config.request_interval_secs.max(0.0)),
            weight_overrides: config.weight_overrides.clone(),
            prompt_path: config
                .prompt_path
                .clone()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PROMPT_PATH)),
        }
    }

    fn assembled_templates(&self, metrics: &[MetricDef]) -> Result<(String, String)> {
        assemble_templates(&self.prompt_path, metrics)
    }

    pub async fn run(&self, ctx: &PipelineContext, params: &EvalParams) -> Result<EvalStats> {
        let metrics = self.store.active_metrics().await?;
        let (system, user_template) = self.assembled_templates(&metrics)?;

        let articles = self.candidates(ctx, params).await?;
        let mut stats = EvalStats {
            candidates: articles.len(),
            ..Default::default()
        };
        if articles.is_empty() {
            info!(evaluator = %ctx.evaluator_key, "no pending articles to evaluate");
            return Ok(stats);
        }
        info!(
            evaluator = %ctx.evaluator_key,
            candidates = articles.len(),
            pipeline = ctx.pipeline_id,
            "starting evaluation"
        );

        for article in &articles {
            match self
                .evaluate_one(article, &system, &user_template, &metrics)
                .await
            {
                Ok((review, final_score, raw_response)) => {
                    if params.dry_run {
                        print_preview(article, &review, final_score, &metrics);
                    } else {
                        self.persist(ctx, article, &review, final_score, &raw_response, &metrics)
                            .await?;
                        info!(
                            info_id = article.info_id,
                            final_score,
                            title = %article.title,
                            "article evaluated"
                        );
                    }
                    stats.evaluated += 1;
                }
                Err(e) => {
                    warn!(info_id = article.info_id, title = %article.title, error = %e, "article failed");
                    stats.failed += 1;
                }
            }
            if !self.request_interval.is_zero() {
                tokio::time::sleep(self.request_interval).await;
            }
        }
        Ok(stats)
    }

    /// Rows whose publish parses within the window, optionally filtered by
    /// category/source, excluding already-reviewed rows unless overwrite.
    async fn candidates(&self, ctx: &PipelineContext, params: &EvalParams) -> Result<Vec<Article>> {
        let rows = self.store.eval_candidates(&ctx.evaluator_key).await?;
        let cutoff = Utc::now() - ChronoDuration::hours(params.hours.max(1));

        let mut articles = Vec::new();
        for row in rows {
            let category = row.category.clone().unwrap_or_default();
            if !params.categories.is_empty() && !params.categories.contains(&category) {
                continue;
            }
            if !params.sources.is_empty() && !params.sources.contains(&row.source) {
                continue;
            }
            if !params.overwrite && row.has_review != 0 {
                continue;
            }
            let Some(published) = try_parse_dt(&row.publish) else {
                continue;
            };
            if published < cutoff {
                continue;
            }
            articles.push(Article {
                info_id: row.id,
                source: row.source,
                category,
                publish: row.publish,
                title: row.title,
                link: String::new(),
                detail: row.detail.unwrap_or_default(),
            });
            if articles.len() >= params.limit {
                break;
            }
        }
        Ok(articles)
    }

    /// One article: call, parse, validate; retry the whole round on any
    /// failure with `min(2^(n-1), 10)`-second backoff.
    async fn evaluate_one(
        &self,
        article: &Article,
        system: &str,
        user_template: &str,
        metrics: &[MetricDef],
    ) -> Result<(ValidatedReview, f64, String)> {
        let mut mapping = HashMap::new();
        mapping.insert("title", article.title.clone());
        mapping.insert("source", article.source.clone());
        mapping.insert("publish", article.publish.clone());
        mapping.insert("detail", article.detail.clone());
        let user_prompt = prompt::fill(user_template, &mapping);

        let mut last_error = anyhow::anyhow!("no attempt made");
        for attempt in 1..=self.max_retries {
            let round = async {
                let raw = self
                    .backend
                    .chat(system, &user_prompt)
                    .await
                    .map_err(|e| NewswireError::AiClient(e.to_string()))?;
                let payload = validate::parse_payload(&raw)?;
                let review = validate::validate(&payload, metrics)?;
                Ok::<_, anyhow::Error>((review, raw))
            }
            .await;

            match round {
                Ok((review, raw)) => {
                    let final_score = self.final_score(&review, metrics);
                    return Ok((review, final_score, raw));
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        let wait = 2u64.saturating_pow(attempt - 1).min(10);
                        warn!(
                            info_id = article.info_id,
                            attempt,
                            wait,
                            error = %e,
                            "evaluation attempt failed, retrying"
                        );
                        tokio::time::sleep(Duration::from_secs(wait)).await;
                    }
                    last_error = e;
                }
            }
        }
        Err(last_error.context(format!("failed after {} attempts", self.max_retries)))
    }

    fn final_score(&self, review: &ValidatedReview, metrics: &[MetricDef]) -> f64 {
        let weights: HashMap<String, f64> = metrics
            .iter()
            .map(|metric| {
                let weight = self
                    .weight_overrides
                    .get(&metric.key)
                    .copied()
                    .or(metric.default_weight)
                    .unwrap_or(0.0);
                (metric.key.clone(), weight)
            })
            .collect();
        weighted_mean(&review.scores, &weights)
    }

    /// Score rows land before the review row; both for the same article
    /// commit together so a crash loses at most the article in flight.
    async fn persist(
        &self,
        ctx: &PipelineContext,
        article: &Article,
        review: &ValidatedReview,
        final_score: f64,
        raw_response: &str,
        metrics: &[MetricDef],
    ) -> Result<()> {
        let score_rows: Vec<(i64, i64)> = metrics
            .iter()
            .map(|metric| (metric.id, review.scores[&metric.key]))
            .collect();
        self.store
            .upsert_scores(article.info_id, &score_rows)
            .await
            .context("storing metric scores")?;

        let key_concepts_json = if review.key_concepts.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&review.key_concepts)?)
        };
        self.store
            .upsert_review(&ReviewUpsert {
                info_id: article.info_id,
                evaluator_key: ctx.evaluator_key.clone(),
                final_score,
                comment: review.comment.clone(),
                summary: review.summary.clone(),
                summary_long: review.summary_long.clone(),
                key_concepts_json,
                raw_response: raw_response.to_string(),
            })
            .await
            .context("storing review")?;
        Ok(())
    }
}

fn assemble_templates(prompt_path: &std::path::Path, metrics: &[MetricDef]) -> Result<(String, String)> {
    let (system, user_template) = prompt::load_prompt(prompt_path)?;
    let mut globals = HashMap::new();
    globals.insert("metrics_block", prompt::metrics_block(metrics));
    globals.insert("schema_example", prompt::schema_example(metrics));
    Ok((system, prompt::fill(&user_template, &globals)))
}

/// Render the assembled prompt (global substitutions applied) without
/// touching the LLM configuration. Used by `--export-prompt`.
pub async fn export_prompt(store: &Store, prompt_path: Option<&std::path::Path>) -> Result<String> {
    let metrics = store.active_metrics().await?;
    let path = prompt_path
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PROMPT_PATH));
    let (system, user) = assemble_templates(&path, &metrics)?;
    Ok(format!("[SYSTEM]\n{system}\n\n[USER]\n{user}"))
}

fn print_preview(article: &Article, review: &ValidatedReview, final_score: f64, metrics: &[MetricDef]) {
    let dims = metrics
        .iter()
        .map(|metric| format!("{}:{}", metric.key, review.scores[&metric.key]))
        .collect::<Vec<_>>()
        .join(" / ");
    println!(
        "[预览] {} {}\n  {} -> {:.2}\n  评价: {}\n  概要: {}\n  概念: {}\n  摘要: {}",
        article.info_id,
        article.title,
        dims,
        final_score,
        review.comment,
        review.summary,
        if review.key_concepts.is_empty() {
            "N/A".to_string()
        } else {
            review.key_concepts.join(", ")
        },
        review.summary_long,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    struct ScriptedBackend {
        responses: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(responses: Vec<&str>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().rev().map(String::from).collect()),
            }
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn chat(&self, _system: &str, _user: &str) -> Result<String> {
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| anyhow::anyhow!("scripted backend exhausted"))
        }
    }

    fn test_config() -> AiConfig {
        AiConfig {
            base_url: "https://example.com".into(),
            api_path: "/v1/chat/completions".into(),
            model: "test-model".into(),
            api_key: "k".into(),
            timeout_secs: 5,
            request_interval_secs: 0.0,
            max_retries: 3,
            weight_overrides: HashMap::new(),
            prompt_path: None,
        }
    }

    fn write_prompt(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("eval.prompt");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            "<<SYS>>\n你是资讯评估助手。\n<<USER>>\n指标：\n{{{{metrics_block}}}}\n输出格式：\n{{{{schema_example}}}}\n标题：{{{{title}}}}\n正文：{{{{detail}}}}\n"
        )
        .unwrap();
        path
    }

    async fn store_with_article() -> Store {
        let store = Store::in_memory().await.unwrap();
        store
            .insert_info(&newswire_store::InfoInsert {
                source: "feed-a".into(),
                publish: (Utc::now() - ChronoDuration::hours(2))
                    .to_rfc3339_opts(chrono::SecondsFormat::Secs, false),
                title: "一篇文章".into(),
                link: "https://x/a".into(),
                category: "tech".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        store
    }

    fn valid_response() -> String {
        let scores: Vec<String> = tests_metric_keys()
            .iter()
            .map(|key| format!("\"{key}\": 4"))
            .collect();
        format!(
            "```json\n{{\"dimension_scores\": {{{}}}, \"comment\": \"不错\", \"summary\": \"摘要\", \"key_concepts\": [\"AI\"], \"summary_long\": \"长摘要\"}}\n```",
            scores.join(", ")
        )
    }

    #[tokio::test]
    async fn retries_invalid_json_then_stores_once() {
        let store = store_with_article().await;
        let dir = tempfile::tempdir().unwrap();
        let prompt_path = write_prompt(&dir);

        let mut config = test_config();
        config.prompt_path = Some(prompt_path.to_string_lossy().to_string());

        let valid = valid_response();
        let backend = ScriptedBackend::new(vec!["not json", "also {not json", valid.as_str()]);
        let evaluator = Evaluator::new(store.clone(), Box::new(backend), &config);

        let ctx = PipelineContext::new(None, "news_evaluator");
        let stats = evaluator.run(&ctx, &EvalParams::default()).await.unwrap();
        assert_eq!(stats.evaluated, 1);
        assert_eq!(stats.failed, 0);

        // The stored raw response is the final, valid one.
        let raw = store
            .review_raw_response(1, "news_evaluator")
            .await
            .unwrap()
            .unwrap();
        assert!(raw.contains("dimension_scores"));

        // Re-running without overwrite touches nothing: zero candidates.
        let stats = evaluator.run(&ctx, &EvalParams::default()).await.unwrap();
        assert_eq!(stats.candidates, 0);
    }

    #[tokio::test]
    async fn exhausted_retries_skip_the_article() {
        let store = store_with_article().await;
        let dir = tempfile::tempdir().unwrap();
        let prompt_path = write_prompt(&dir);

        let mut config = test_config();
        config.prompt_path = Some(prompt_path.to_string_lossy().to_string());
        config.max_retries = 2;

        let backend = ScriptedBackend::new(vec!["junk", "more junk"]);
        let evaluator = Evaluator::new(store.clone(), Box::new(backend), &config);

        let ctx = PipelineContext::new(None, "news_evaluator");
        let stats = evaluator.run(&ctx, &EvalParams::default()).await.unwrap();
        assert_eq!(stats.evaluated, 0);
        assert_eq!(stats.failed, 1);
        assert!(store
            .review_raw_response(1, "news_evaluator")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn candidate_window_and_filters_apply() {
        let store = store_with_article().await;
        // A stale article outside any reasonable window.
        store
            .insert_info(&newswire_store::InfoInsert {
                source: "feed-a".into(),
                publish: "2001-01-01T00:00:00+00:00".into(),
                title: "旧文".into(),
                link: "https://x/old".into(),
                category: "tech".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config();
        config.prompt_path = Some(write_prompt(&dir).to_string_lossy().to_string());
        let evaluator = Evaluator::new(store, Box::new(ScriptedBackend::new(vec![])), &config);

        let ctx = PipelineContext::new(None, "news_evaluator");
        let params = EvalParams {
            categories: vec!["game".into()],
            ..Default::default()
        };
        // Category filter removes the only fresh article.
        let fresh = evaluator.candidates(&ctx, &params).await.unwrap();
        assert!(fresh.is_empty());

        let params = EvalParams::default();
        let fresh = evaluator.candidates(&ctx, &params).await.unwrap();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].title, "一篇文章");
    }

    fn tests_metric_keys() -> Vec<&'static str> {
        vec![
            "timeliness",
            "game_relevance",
            "mobile_game_relevance",
            "ai_relevance",
            "tech_relevance",
            "quality",
            "insight",
            "depth",
            "novelty",
        ]
    }
}
