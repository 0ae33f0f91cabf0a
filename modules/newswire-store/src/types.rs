use std::collections::{HashMap, HashSet};

use sqlx::FromRow;

/// A row from the `sources` registry table.
#[derive(Debug, Clone, FromRow)]
pub struct SourceRow {
    pub id: i64,
    pub key: String,
    pub label: String,
    pub enabled: i64,
    pub category_key: String,
    pub script_path: String,
}

impl SourceRow {
    pub fn is_enabled(&self) -> bool {
        self.enabled != 0
    }
}

/// Seed data for first-run registration of a source.
#[derive(Debug, Clone)]
pub struct SourceSeed {
    pub key: String,
    pub label: String,
    pub category_key: String,
    pub category_label: String,
    pub script_path: String,
}

/// Parameters for inserting a new `info` row.
#[derive(Debug, Clone, Default)]
pub struct InfoInsert {
    pub source: String,
    pub publish: String,
    pub title: String,
    pub link: String,
    pub category: String,
    pub detail: Option<String>,
    pub store_link: Option<String>,
    pub creator: Option<String>,
    pub img_link: Option<String>,
}

/// An `info` row as the evaluator sees it, with review presence attached.
#[derive(Debug, Clone, FromRow)]
pub struct CandidateRow {
    pub id: i64,
    pub title: String,
    pub source: String,
    pub publish: String,
    pub detail: Option<String>,
    pub category: Option<String>,
    pub has_review: i64,
}

/// A pipeline header row.
#[derive(Debug, Clone, FromRow)]
pub struct PipelineRow {
    pub id: i64,
    pub name: String,
    pub enabled: i64,
    pub debug_enabled: i64,
    pub description: String,
    pub evaluator_key: String,
    pub pipeline_class_id: Option<i64>,
    pub weekdays_json: Option<String>,
}

impl PipelineRow {
    pub fn is_enabled(&self) -> bool {
        self.enabled != 0
    }

    pub fn is_debug(&self) -> bool {
        self.debug_enabled != 0
    }
}

/// Allowed categories/evaluators/writers for a pipeline class.
#[derive(Debug, Clone, Default)]
pub struct PipelineClassSets {
    pub categories: HashSet<String>,
    pub evaluators: HashSet<String>,
    pub writers: HashSet<String>,
}

/// The pipeline's category/source filter row.
#[derive(Debug, Clone)]
pub struct PipelineFilters {
    pub all_categories: bool,
    pub categories: Vec<String>,
    pub all_src: bool,
    pub include_src: Vec<String>,
}

impl Default for PipelineFilters {
    fn default() -> Self {
        Self {
            all_categories: true,
            categories: Vec::new(),
            all_src: true,
            include_src: Vec::new(),
        }
    }
}

/// The pipeline's writer configuration row.
#[derive(Debug, Clone, FromRow)]
pub struct PipelineWriterCfg {
    #[sqlx(rename = "type")]
    pub writer_type: String,
    pub hours: Option<i64>,
    pub weights_json: Option<String>,
    pub bonus_json: Option<String>,
    pub limit_per_category: Option<String>,
    pub per_source_cap: Option<i64>,
}

/// One per-metric weight override row for a pipeline writer.
#[derive(Debug, Clone, FromRow)]
pub struct MetricWeightRow {
    pub key: String,
    pub weight: f64,
    pub enabled: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct EmailDelivery {
    pub email: String,
    pub subject_tpl: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct ChatDelivery {
    pub app_id: String,
    pub app_secret: String,
    pub to_all_chat: i64,
    pub chat_id: Option<String>,
    pub title_tpl: Option<String>,
}

/// A pipeline's delivery target. Exactly one variant exists per pipeline.
#[derive(Debug, Clone)]
pub enum Delivery {
    Email(EmailDelivery),
    Chat(ChatDelivery),
}

/// Evaluation output to persist for one article.
#[derive(Debug, Clone)]
pub struct ReviewUpsert {
    pub info_id: i64,
    pub evaluator_key: String,
    pub final_score: f64,
    pub comment: String,
    pub summary: String,
    pub summary_long: String,
    /// JSON array of up to five concept strings, or None when empty.
    pub key_concepts_json: Option<String>,
    pub raw_response: String,
}

/// An article joined with its per-metric scores and (optionally) review
/// text, as the digest composers consume it.
#[derive(Debug, Clone)]
pub struct ScoredArticle {
    pub id: i64,
    pub category: String,
    pub source: String,
    pub publish: String,
    pub title: String,
    pub link: String,
    pub store_link: String,
    pub img_link: String,
    pub ai_summary: String,
    pub ai_comment: String,
    pub review_final_score: f64,
    pub has_review: bool,
    pub scores: HashMap<String, i64>,
}
