//! SQLite persistence for the whole pipeline runtime.
//!
//! All queries are runtime-bound (`sqlx::query*` with `.bind`); row structs
//! derive `FromRow`. Write failures that must not abort a batch are logged
//! and surfaced as `Ok(false)`/`None` by the callers that want that.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::info;

use newswire_common::datetime::try_parse_dt;
use newswire_common::{MetricDef, NewswireError};

use crate::schema;
use crate::types::*;

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if missing) the database at `path` and apply the
    /// additive migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create data dir {}", parent.display()))?;
            }
        }
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
            .with_context(|| format!("Invalid database path {}", path.display()))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| {
                NewswireError::Database(format!("Failed to open database {}: {e}", path.display()))
            })?;
        schema::migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// In-memory database for tests. A single connection keeps the shared
    /// `:memory:` instance alive.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| NewswireError::Database(format!("Failed to open in-memory database: {e}")))?;
        schema::migrate(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // --- info ---

    /// Insert an article with link-unique semantics: insert if absent,
    /// else do nothing. Returns whether a row was actually inserted.
    pub async fn insert_info(&self, entry: &InfoInsert) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO info (source, publish, title, link, category, detail,
                              store_link, creator, img_link)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(link) DO NOTHING
            "#,
        )
        .bind(&entry.source)
        .bind(&entry.publish)
        .bind(&entry.title)
        .bind(&entry.link)
        .bind(&entry.category)
        .bind(&entry.detail)
        .bind(&entry.store_link)
        .bind(&entry.creator)
        .bind(&entry.img_link)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_detail(&self, link: &str, detail: &str) -> Result<()> {
        sqlx::query("UPDATE info SET detail = ? WHERE link = ?")
            .bind(detail)
            .bind(link)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Recent links of a source whose detail is still empty, newest first.
    pub async fn links_missing_detail(&self, source: &str, limit: i64) -> Result<Vec<String>> {
        let links = sqlx::query_scalar::<_, String>(
            r#"
            SELECT link FROM info
            WHERE source = ? AND (detail IS NULL OR TRIM(detail) = '')
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(source)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(links)
    }

    pub async fn info_count(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM info")
            .fetch_one(&self.pool)
            .await?)
    }

    // --- source registry ---

    pub async fn all_sources(&self) -> Result<Vec<SourceRow>> {
        let rows = sqlx::query_as::<_, SourceRow>(
            "SELECT id, key, label, enabled, category_key, script_path FROM sources ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn enabled_sources(&self) -> Result<Vec<SourceRow>> {
        let rows = sqlx::query_as::<_, SourceRow>(
            r#"
            SELECT id, key, label, enabled, category_key, script_path
            FROM sources WHERE enabled = 1 ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn source_by_key(&self, key: &str) -> Result<Option<SourceRow>> {
        let row = sqlx::query_as::<_, SourceRow>(
            "SELECT id, key, label, enabled, category_key, script_path FROM sources WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// First-run registration: when the sources table is empty, register
    /// every seed (and its category). Seeds for already-known keys are
    /// ignored on later runs.
    pub async fn seed_sources(&self, seeds: &[SourceSeed]) -> Result<()> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sources")
            .fetch_one(&self.pool)
            .await?;
        if count > 0 {
            return Ok(());
        }
        info!(seeds = seeds.len(), "sources table empty, registering built-in adapters");
        for seed in seeds {
            sqlx::query("INSERT OR IGNORE INTO categories (key, label, enabled) VALUES (?, ?, 1)")
                .bind(&seed.category_key)
                .bind(&seed.category_label)
                .execute(&self.pool)
                .await?;
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO sources (key, label, enabled, category_key, script_path)
                VALUES (?, ?, 1, ?, ?)
                "#,
            )
            .bind(&seed.key)
            .bind(&seed.label)
            .bind(&seed.category_key)
            .bind(&seed.script_path)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    // --- source runs ---

    pub async fn last_run_at(&self, source_id: i64) -> Result<Option<DateTime<Utc>>> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT last_run_at FROM source_runs WHERE source_id = ?")
                .bind(source_id)
                .fetch_optional(&self.pool)
                .await?
                .flatten();
        Ok(raw.as_deref().and_then(try_parse_dt))
    }

    pub async fn stamp_source_run(&self, source_id: i64, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO source_runs (source_id, last_run_at) VALUES (?, ?)
            ON CONFLICT(source_id) DO UPDATE SET last_run_at = excluded.last_run_at
            "#,
        )
        .bind(source_id)
        .bind(at.to_rfc3339_opts(SecondsFormat::Secs, false))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // --- metrics ---

    pub async fn active_metrics(&self) -> Result<Vec<MetricDef>> {
        let rows = sqlx::query(
            r#"
            SELECT id, key, label, rate_guide, default_weight, sort_order
            FROM ai_metrics
            WHERE active = 1
            ORDER BY sort_order ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        let metrics = rows
            .into_iter()
            .map(|row| MetricDef {
                id: row.get("id"),
                key: row.get("key"),
                label: row.get("label"),
                rate_guide: row.get("rate_guide"),
                default_weight: row.get("default_weight"),
                sort_order: row.get("sort_order"),
            })
            .collect::<Vec<_>>();
        if metrics.is_empty() {
            bail!("ai_metrics table has no active metrics");
        }
        Ok(metrics)
    }

    // --- evaluation ---

    /// All info rows newest-first, with a flag for whether a review by
    /// `evaluator_key` already exists. Time-window and category/source
    /// filtering happen in the evaluator (publish is free-form text).
    pub async fn eval_candidates(&self, evaluator_key: &str) -> Result<Vec<CandidateRow>> {
        let rows = sqlx::query_as::<_, CandidateRow>(
            r#"
            SELECT i.id, i.title, i.source, i.publish, i.detail, i.category,
                   CASE WHEN r.info_id IS NULL THEN 0 ELSE 1 END AS has_review
            FROM info AS i
            LEFT JOIN info_ai_review AS r
                   ON r.info_id = i.id AND r.evaluator_key = ?
            ORDER BY i.id DESC
            "#,
        )
        .bind(evaluator_key)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn upsert_scores(&self, info_id: i64, scores: &[(i64, i64)]) -> Result<()> {
        for (metric_id, score) in scores {
            sqlx::query(
                r#"
                INSERT INTO info_ai_scores (info_id, metric_id, score, updated_at)
                VALUES (?, ?, ?, CURRENT_TIMESTAMP)
                ON CONFLICT(info_id, metric_id) DO UPDATE SET
                    score = excluded.score,
                    updated_at = CURRENT_TIMESTAMP
                "#,
            )
            .bind(info_id)
            .bind(metric_id)
            .bind(score)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    pub async fn upsert_review(&self, review: &ReviewUpsert) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO info_ai_review
                (info_id, evaluator_key, final_score, ai_comment, ai_summary,
                 ai_summary_long, ai_key_concepts, raw_response, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(info_id, evaluator_key) DO UPDATE SET
                final_score = excluded.final_score,
                ai_comment = excluded.ai_comment,
                ai_summary = excluded.ai_summary,
                ai_summary_long = excluded.ai_summary_long,
                ai_key_concepts = excluded.ai_key_concepts,
                raw_response = excluded.raw_response,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(review.info_id)
        .bind(&review.evaluator_key)
        .bind(review.final_score)
        .bind(&review.comment)
        .bind(&review.summary)
        .bind(&review.summary_long)
        .bind(&review.key_concepts_json)
        .bind(&review.raw_response)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn review_raw_response(
        &self,
        info_id: i64,
        evaluator_key: &str,
    ) -> Result<Option<String>> {
        let raw: Option<Option<String>> = sqlx::query_scalar(
            "SELECT raw_response FROM info_ai_review WHERE info_id = ? AND evaluator_key = ?",
        )
        .bind(info_id)
        .bind(evaluator_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(raw.flatten())
    }

    // --- composer reads ---

    /// Articles joined with their active-metric scores and the review row
    /// for `evaluator_key`. Articles without a complete score set are
    /// dropped by the caller (an absent metric simply never appears in the
    /// map).
    pub async fn scored_articles(&self, evaluator_key: &str) -> Result<Vec<ScoredArticle>> {
        let rows = sqlx::query(
            r#"
            SELECT i.id AS id, COALESCE(i.category,'') AS category, i.source AS source,
                   i.publish AS publish, i.title AS title, i.link AS link,
                   COALESCE(i.store_link,'') AS store_link,
                   COALESCE(i.img_link,'') AS img_link,
                   COALESCE(r.ai_summary,'') AS ai_summary,
                   COALESCE(r.ai_comment,'') AS ai_comment,
                   COALESCE(r.final_score, 0.0) AS review_final_score,
                   CASE WHEN r.info_id IS NULL THEN 0 ELSE 1 END AS has_review,
                   m.key AS metric_key, s.score AS score
            FROM info AS i
            JOIN info_ai_scores AS s ON s.info_id = i.id
            JOIN ai_metrics AS m ON m.id = s.metric_id AND m.active = 1
            LEFT JOIN info_ai_review AS r
                   ON r.info_id = i.id AND r.evaluator_key = ?
            "#,
        )
        .bind(evaluator_key)
        .fetch_all(&self.pool)
        .await?;

        let mut articles: HashMap<i64, ScoredArticle> = HashMap::new();
        for row in rows {
            let id: i64 = row.get("id");
            let article = articles.entry(id).or_insert_with(|| ScoredArticle {
                id,
                category: row.get("category"),
                source: row.get("source"),
                publish: row.get("publish"),
                title: row.get("title"),
                link: row.get("link"),
                store_link: row.get("store_link"),
                img_link: row.get("img_link"),
                ai_summary: row.get("ai_summary"),
                ai_comment: row.get("ai_comment"),
                review_final_score: row.get("review_final_score"),
                has_review: row.get::<i64, _>("has_review") != 0,
                scores: HashMap::new(),
            });
            article
                .scores
                .insert(row.get::<String, _>("metric_key"), row.get::<i64, _>("score"));
        }
        Ok(articles.into_values().collect())
    }

    /// Articles with a review by `evaluator_key`, ordered by final score
    /// then publish, without requiring per-metric scores. Used by the
    /// minigame digest.
    pub async fn reviewed_articles(&self, evaluator_key: &str) -> Result<Vec<ScoredArticle>> {
        let rows = sqlx::query(
            r#"
            SELECT i.id AS id, COALESCE(i.category,'') AS category, i.source AS source,
                   i.publish AS publish, i.title AS title, i.link AS link,
                   COALESCE(i.store_link,'') AS store_link,
                   COALESCE(i.img_link,'') AS img_link,
                   COALESCE(r.ai_summary,'') AS ai_summary,
                   COALESCE(r.ai_comment,'') AS ai_comment,
                   COALESCE(r.final_score, 0.0) AS review_final_score
            FROM info AS i
            JOIN info_ai_review AS r
                 ON r.info_id = i.id AND r.evaluator_key = ?
            ORDER BY r.final_score DESC, i.publish DESC
            "#,
        )
        .bind(evaluator_key)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| ScoredArticle {
                id: row.get("id"),
                category: row.get("category"),
                source: row.get("source"),
                publish: row.get("publish"),
                title: row.get("title"),
                link: row.get("link"),
                store_link: row.get("store_link"),
                img_link: row.get("img_link"),
                ai_summary: row.get("ai_summary"),
                ai_comment: row.get("ai_comment"),
                review_final_score: row.get("review_final_score"),
                has_review: true,
                scores: HashMap::new(),
            })
            .collect())
    }

    // --- pipelines ---

    const PIPELINE_COLUMNS: &'static str = r#"
        id, name, enabled, debug_enabled, COALESCE(description,'') AS description,
        evaluator_key, pipeline_class_id, weekdays_json
    "#;

    pub async fn pipeline_by_id(&self, id: i64) -> Result<Option<PipelineRow>> {
        let sql = format!(
            "SELECT {} FROM pipelines WHERE id = ?",
            Self::PIPELINE_COLUMNS
        );
        Ok(sqlx::query_as::<_, PipelineRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn pipeline_by_name(&self, name: &str) -> Result<Option<PipelineRow>> {
        let sql = format!(
            "SELECT {} FROM pipelines WHERE name = ?",
            Self::PIPELINE_COLUMNS
        );
        Ok(sqlx::query_as::<_, PipelineRow>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn enabled_pipelines(&self) -> Result<Vec<PipelineRow>> {
        let sql = format!(
            "SELECT {} FROM pipelines WHERE enabled = 1 ORDER BY id",
            Self::PIPELINE_COLUMNS
        );
        Ok(sqlx::query_as::<_, PipelineRow>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn debug_pipelines(&self) -> Result<Vec<PipelineRow>> {
        let sql = format!(
            "SELECT {} FROM pipelines WHERE debug_enabled = 1 ORDER BY id",
            Self::PIPELINE_COLUMNS
        );
        Ok(sqlx::query_as::<_, PipelineRow>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn class_sets(&self, class_id: i64) -> Result<PipelineClassSets> {
        let categories = sqlx::query_scalar::<_, String>(
            "SELECT category_key FROM pipeline_class_categories WHERE pipeline_class_id = ?",
        )
        .bind(class_id)
        .fetch_all(&self.pool)
        .await?;
        let evaluators = sqlx::query_scalar::<_, String>(
            "SELECT evaluator_key FROM pipeline_class_evaluators WHERE pipeline_class_id = ?",
        )
        .bind(class_id)
        .fetch_all(&self.pool)
        .await?;
        let writers = sqlx::query_scalar::<_, String>(
            "SELECT writer_type FROM pipeline_class_writers WHERE pipeline_class_id = ?",
        )
        .bind(class_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(PipelineClassSets {
            categories: categories.into_iter().collect(),
            evaluators: evaluators.into_iter().collect(),
            writers: writers.into_iter().collect(),
        })
    }

    pub async fn pipeline_filters(&self, pipeline_id: i64) -> Result<PipelineFilters> {
        let row = sqlx::query(
            r#"
            SELECT all_categories, categories_json, all_src, include_src_json
            FROM pipeline_filters WHERE pipeline_id = ?
            "#,
        )
        .bind(pipeline_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(PipelineFilters::default());
        };
        Ok(PipelineFilters {
            all_categories: row.get::<i64, _>("all_categories") != 0,
            categories: json_string_list(row.get::<Option<String>, _>("categories_json")),
            all_src: row.get::<i64, _>("all_src") != 0,
            include_src: json_string_list(row.get::<Option<String>, _>("include_src_json")),
        })
    }

    pub async fn pipeline_writer(&self, pipeline_id: i64) -> Result<Option<PipelineWriterCfg>> {
        Ok(sqlx::query_as::<_, PipelineWriterCfg>(
            r#"
            SELECT type, hours, weights_json, bonus_json, limit_per_category, per_source_cap
            FROM pipeline_writers WHERE pipeline_id = ?
            "#,
        )
        .bind(pipeline_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn metric_weight_rows(&self, pipeline_id: i64) -> Result<Vec<MetricWeightRow>> {
        Ok(sqlx::query_as::<_, MetricWeightRow>(
            r#"
            SELECT m.key AS key, w.weight AS weight, w.enabled AS enabled
            FROM pipeline_writer_metric_weights AS w
            JOIN ai_metrics AS m ON m.id = w.metric_id
            WHERE w.pipeline_id = ?
            "#,
        )
        .bind(pipeline_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// The pipeline's delivery target. Errors when both or neither
    /// transport is configured (invariant I1).
    pub async fn delivery(&self, pipeline_id: i64) -> Result<Delivery> {
        let email = sqlx::query_as::<_, EmailDelivery>(
            "SELECT email, subject_tpl FROM pipeline_deliveries_email WHERE pipeline_id = ?",
        )
        .bind(pipeline_id)
        .fetch_optional(&self.pool)
        .await?;
        let chat = sqlx::query_as::<_, ChatDelivery>(
            r#"
            SELECT app_id, app_secret, to_all_chat, chat_id, title_tpl
            FROM pipeline_deliveries_chat WHERE pipeline_id = ?
            "#,
        )
        .bind(pipeline_id)
        .fetch_optional(&self.pool)
        .await?;

        match (email, chat) {
            (Some(_), Some(_)) => {
                bail!("pipeline {pipeline_id} has both email and chat deliveries configured")
            }
            (Some(email), None) => Ok(Delivery::Email(email)),
            (None, Some(chat)) => Ok(Delivery::Chat(chat)),
            (None, None) => bail!("pipeline {pipeline_id} has no delivery configured"),
        }
    }

    // --- pipeline runs ---

    pub async fn start_pipeline_run(&self, pipeline_id: i64) -> Result<i64> {
        let result = sqlx::query("INSERT INTO pipeline_runs (pipeline_id, status) VALUES (?, 'running')")
            .bind(pipeline_id)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn finish_pipeline_run(&self, run_id: i64, status: &str, summary: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE pipeline_runs
            SET finished_at = CURRENT_TIMESTAMP, status = ?, summary = ?
            WHERE id = ?
            "#,
        )
        .bind(status)
        .bind(summary)
        .bind(run_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn json_string_list(raw: Option<String>) -> Vec<String> {
    let Some(raw) = raw else { return Vec::new() };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) else {
        return Vec::new();
    };
    match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let store = Store::in_memory().await.unwrap();
        schema::migrate(store.pool()).await.unwrap();
        schema::migrate(store.pool()).await.unwrap();
        let metrics = store.active_metrics().await.unwrap();
        assert_eq!(metrics.len(), 9);
        assert_eq!(metrics[0].key, "timeliness");
    }

    #[tokio::test]
    async fn insert_info_is_link_unique() {
        let store = Store::in_memory().await.unwrap();
        let entry = InfoInsert {
            source: "feed-a".into(),
            publish: "2025-06-01T08:00:00+00:00".into(),
            title: "First title".into(),
            link: "https://x/a".into(),
            category: "tech".into(),
            ..Default::default()
        };
        assert!(store.insert_info(&entry).await.unwrap());

        let dupe = InfoInsert {
            title: "Different title".into(),
            ..entry.clone()
        };
        assert!(!store.insert_info(&dupe).await.unwrap());
        assert_eq!(store.info_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn review_upsert_is_keyed_by_evaluator() {
        let store = Store::in_memory().await.unwrap();
        let entry = InfoInsert {
            source: "s".into(),
            publish: "".into(),
            title: "t".into(),
            link: "https://x/b".into(),
            category: "tech".into(),
            ..Default::default()
        };
        store.insert_info(&entry).await.unwrap();

        let review = ReviewUpsert {
            info_id: 1,
            evaluator_key: "news_evaluator".into(),
            final_score: 3.5,
            comment: "c".into(),
            summary: "s".into(),
            summary_long: "sl".into(),
            key_concepts_json: None,
            raw_response: "raw-1".into(),
        };
        store.upsert_review(&review).await.unwrap();
        store
            .upsert_review(&ReviewUpsert {
                evaluator_key: "legou_minigame_evaluator".into(),
                raw_response: "raw-2".into(),
                ..review.clone()
            })
            .await
            .unwrap();

        assert_eq!(
            store
                .review_raw_response(1, "news_evaluator")
                .await
                .unwrap()
                .as_deref(),
            Some("raw-1")
        );
        assert_eq!(
            store
                .review_raw_response(1, "legou_minigame_evaluator")
                .await
                .unwrap()
                .as_deref(),
            Some("raw-2")
        );

        let candidates = store.eval_candidates("news_evaluator").await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].has_review, 1);
        let other = store.eval_candidates("third_evaluator").await.unwrap();
        assert_eq!(other[0].has_review, 0);
    }

    #[tokio::test]
    async fn source_run_stamp_round_trips() {
        let store = Store::in_memory().await.unwrap();
        store
            .seed_sources(&[SourceSeed {
                key: "feed-a".into(),
                label: "Feed A".into(),
                category_key: "tech".into(),
                category_label: "科技".into(),
                script_path: "adapters/feed_a".into(),
            }])
            .await
            .unwrap();
        let source = store.source_by_key("feed-a").await.unwrap().unwrap();
        assert!(store.last_run_at(source.id).await.unwrap().is_none());

        let at = chrono::Utc::now();
        store.stamp_source_run(source.id, at).await.unwrap();
        let loaded = store.last_run_at(source.id).await.unwrap().unwrap();
        assert_eq!(loaded.timestamp(), at.timestamp());
    }

    #[tokio::test]
    async fn delivery_enforces_exactly_one() {
        let store = Store::in_memory().await.unwrap();
        sqlx::query("INSERT INTO pipelines (name) VALUES ('p1')")
            .execute(store.pool())
            .await
            .unwrap();
        assert!(store.delivery(1).await.is_err());

        sqlx::query(
            "INSERT INTO pipeline_deliveries_email (pipeline_id, email, subject_tpl) VALUES (1, 'a@b.c', '')",
        )
        .execute(store.pool())
        .await
        .unwrap();
        assert!(matches!(store.delivery(1).await.unwrap(), Delivery::Email(_)));

        sqlx::query(
            "INSERT INTO pipeline_deliveries_chat (pipeline_id, app_id, app_secret) VALUES (1, 'id', 'secret')",
        )
        .execute(store.pool())
        .await
        .unwrap();
        assert!(store.delivery(1).await.is_err());
    }
}
