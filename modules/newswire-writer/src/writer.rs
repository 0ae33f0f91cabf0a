//! Writer orchestration: resolve a pipeline's composer configuration from
//! the store (discovered via the ambient pipeline id), run the shared
//! selection pipeline, and render the artifact.

use std::collections::HashMap;

use anyhow::{bail, Result};
use chrono::Utc;
use tracing::info;

use newswire_common::{MetricDef, PipelineContext};
use newswire_store::Store;

use crate::chat::render_chat_digest;
use crate::email::{render_email_digest, FooterLinks};
use crate::limits::parse_limit_config;
use crate::minigame::render_minigame_digest;
use crate::selection::{select, SelectionConfig};
use crate::weights::{parse_overrides, resolve_weights};

/// Manual score adjustments applied when neither the pipeline nor the CLI
/// overrides a source.
fn default_source_bonus() -> HashMap<String, f64> {
    HashMap::from([
        ("openai.research".to_string(), 3.0),
        ("deepmind".to_string(), 1.0),
        ("qbitai".to_string(), 2.0),
    ])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterKind {
    /// HTML e-mail digest (`email_news`, legacy `info_html`).
    Email,
    /// Chat markdown digest (`chat_md`, `chat_news`).
    Chat,
    /// Minigame chat digest (`chat_minigame`).
    Minigame,
}

impl WriterKind {
    pub fn parse(writer_type: &str) -> Option<Self> {
        match writer_type.trim() {
            "email_news" | "info_html" => Some(Self::Email),
            "chat_md" | "chat_news" => Some(Self::Chat),
            "chat_minigame" => Some(Self::Minigame),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Email => "html",
            Self::Chat | Self::Minigame => "md",
        }
    }

    fn default_hours(&self) -> i64 {
        match self {
            Self::Minigame => 48,
            _ => 24,
        }
    }

    fn default_limit(&self) -> i64 {
        match self {
            Self::Minigame => 5,
            _ => 10,
        }
    }

    fn default_per_source_cap(&self) -> i64 {
        match self {
            Self::Minigame => 2,
            _ => 3,
        }
    }
}

/// Ad-hoc overrides from the `write` CLI; all optional.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub hours: Option<i64>,
    pub categories: Vec<String>,
    pub weights_json: String,
    pub bonus_json: String,
    pub limit_per_category: Option<String>,
    pub per_source_cap: Option<i64>,
    pub min_score: Option<f64>,
}

/// A fully-resolved composer job.
pub struct WriterJob {
    pub kind: WriterKind,
    pub hours: i64,
    metrics: Vec<MetricDef>,
    selection: SelectionConfig,
}

impl WriterJob {
    /// Resolve configuration: metric defaults, then the pipeline's stored
    /// writer/filter rows (when a pipeline id is ambient), then CLI
    /// overrides.
    pub async fn load(
        store: &Store,
        ctx: &PipelineContext,
        kind: WriterKind,
        cli: &CliOverrides,
    ) -> Result<Self> {
        let metrics = store.active_metrics().await?;

        let mut hours = kind.default_hours();
        let mut categories: Vec<String> = Vec::new();
        let mut weights_json = String::new();
        let mut metric_rows = Vec::new();
        let mut source_bonus = default_source_bonus();
        let mut limit_raw: Option<String> = None;
        let mut per_source_cap = kind.default_per_source_cap();

        if let Some(pipeline_id) = ctx.pipeline_id {
            if let Some(writer_cfg) = store.pipeline_writer(pipeline_id).await? {
                if let Some(h) = writer_cfg.hours.filter(|h| *h > 0) {
                    hours = h;
                }
                weights_json = writer_cfg.weights_json.unwrap_or_default();
                for (key, value) in parse_overrides(
                    &writer_cfg.bonus_json.unwrap_or_default(),
                    None,
                    true,
                ) {
                    source_bonus.insert(key, value);
                }
                limit_raw = writer_cfg.limit_per_category;
                if let Some(cap) = writer_cfg.per_source_cap {
                    per_source_cap = cap;
                }
            }
            let filters = store.pipeline_filters(pipeline_id).await?;
            if !filters.all_categories {
                categories = filters.categories;
            }
            metric_rows = store.metric_weight_rows(pipeline_id).await?;
            info!(pipeline = pipeline_id, hours, "writer configuration loaded");
        }

        // CLI overrides apply last.
        if let Some(h) = cli.hours.filter(|h| *h > 0) {
            hours = h;
        }
        if !cli.categories.is_empty() {
            categories = cli.categories.clone();
        }
        for (key, value) in parse_overrides(&cli.bonus_json, None, true) {
            source_bonus.insert(key, value);
        }
        if let Some(raw) = &cli.limit_per_category {
            limit_raw = Some(raw.clone());
        }
        if let Some(cap) = cli.per_source_cap {
            per_source_cap = cap;
        }

        let weights = resolve_weights(&metrics, &metric_rows, &weights_json, &cli.weights_json);
        let (limit_map, limit_default) =
            parse_limit_config(limit_raw.as_deref(), kind.default_limit());

        let selection = SelectionConfig {
            hours,
            categories,
            metric_keys: if kind == WriterKind::Minigame {
                Vec::new()
            } else {
                metrics.iter().map(|m| m.key.clone()).collect()
            },
            weights,
            source_bonus,
            min_score: cli.min_score.unwrap_or(0.0),
            limit_map,
            limit_default,
            per_source_cap,
            require_review: true,
            use_review_score: kind == WriterKind::Minigame,
        };

        Ok(Self {
            kind,
            hours,
            metrics,
            selection,
        })
    }

    /// Run selection and render the artifact. Empty output means nothing
    /// qualified.
    pub async fn render(
        &self,
        store: &Store,
        ctx: &PipelineContext,
        footer: &FooterLinks,
    ) -> Result<String> {
        let articles = match self.kind {
            WriterKind::Minigame => store.reviewed_articles(&ctx.evaluator_key).await?,
            _ => store.scored_articles(&ctx.evaluator_key).await?,
        };
        let groups = select(articles, &self.selection, Utc::now());
        let total: usize = groups.iter().map(|(_, items)| items.len()).sum();
        info!(
            writer = ?self.kind,
            groups = groups.len(),
            items = total,
            "selection complete"
        );

        let content = match self.kind {
            WriterKind::Email => render_email_digest(&groups, &self.metrics, self.hours, footer),
            WriterKind::Chat => render_chat_digest(&groups),
            WriterKind::Minigame => render_minigame_digest(&groups),
        };
        if content.is_empty() {
            bail!("no qualifying articles in the last {} hours", self.hours);
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use newswire_store::{InfoInsert, ReviewUpsert};

    async fn seeded_store() -> Store {
        let store = Store::in_memory().await.unwrap();
        let publish = (Utc::now() - Duration::hours(2))
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, false);
        store
            .insert_info(&InfoInsert {
                source: "feed-a".into(),
                publish,
                title: "标题".into(),
                link: "https://x/a".into(),
                category: "tech".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let metrics = store.active_metrics().await.unwrap();
        let rows: Vec<(i64, i64)> = metrics.iter().map(|m| (m.id, 4)).collect();
        store.upsert_scores(1, &rows).await.unwrap();
        store
            .upsert_review(&ReviewUpsert {
                info_id: 1,
                evaluator_key: "news_evaluator".into(),
                final_score: 4.0,
                comment: "点评".into(),
                summary: "摘要".into(),
                summary_long: "长摘要".into(),
                key_concepts_json: None,
                raw_response: "{}".into(),
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn email_job_renders_scored_article() {
        let store = seeded_store().await;
        let ctx = PipelineContext::new(None, "news_evaluator");
        let job = WriterJob::load(&store, &ctx, WriterKind::Email, &CliOverrides::default())
            .await
            .unwrap();
        let html = job
            .render(&store, &ctx, &FooterLinks::default())
            .await
            .unwrap();
        assert!(html.contains("feed-a:标题"));
        assert!(html.contains("评价：点评"));
    }

    #[tokio::test]
    async fn chat_job_uses_summary_and_stars() {
        let store = seeded_store().await;
        let ctx = PipelineContext::new(None, "news_evaluator");
        let job = WriterJob::load(&store, &ctx, WriterKind::Chat, &CliOverrides::default())
            .await
            .unwrap();
        let md = job
            .render(&store, &ctx, &FooterLinks::default())
            .await
            .unwrap();
        assert!(md.contains("**TECH**"));
        assert!(md.contains("(AI推荐:★★★★) 摘要 ([feed-a](https://x/a))"));
    }

    #[tokio::test]
    async fn minigame_job_ranks_by_review_score() {
        let store = seeded_store().await;
        let ctx = PipelineContext::new(None, "news_evaluator");
        let job = WriterJob::load(&store, &ctx, WriterKind::Minigame, &CliOverrides::default())
            .await
            .unwrap();
        let md = job
            .render(&store, &ctx, &FooterLinks::default())
            .await
            .unwrap();
        assert!(md.contains("(AI推荐:★★★★) **标题**"));
        assert!(md.contains("简介：摘要"));
    }

    #[tokio::test]
    async fn other_evaluator_sees_nothing() {
        let store = seeded_store().await;
        let ctx = PipelineContext::new(None, "another_evaluator");
        let job = WriterJob::load(&store, &ctx, WriterKind::Chat, &CliOverrides::default())
            .await
            .unwrap();
        assert!(job.render(&store, &ctx, &FooterLinks::default()).await.is_err());
    }
}
