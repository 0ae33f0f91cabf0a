use serde::{Deserialize, Serialize};

/// One entry produced by a scraper adapter before it becomes an `info` row.
///
/// `title` and `url` are mandatory; the collector drops records missing
/// either. `source`/`category` fall back to the adapter constants and
/// `published` is normalized to ISO-8601 UTC by the collector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryRecord {
    pub title: String,
    pub url: String,
    /// ISO-8601 UTC, or empty when the source exposes no usable time.
    pub published: String,
    pub source: Option<String>,
    pub category: Option<String>,
    pub detail: Option<String>,
    pub img: Option<String>,
    pub store_link: Option<String>,
    pub creator: Option<String>,
}

impl EntryRecord {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn published(mut self, published: impl Into<String>) -> Self {
        self.published = published.into();
        self
    }
}

/// A scoring dimension definition, admin-editable in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDef {
    pub id: i64,
    pub key: String,
    pub label: String,
    pub rate_guide: Option<String>,
    pub default_weight: Option<f64>,
    pub sort_order: i64,
}

/// A stored article as the evaluator and writers see it.
#[derive(Debug, Clone)]
pub struct Article {
    pub info_id: i64,
    pub source: String,
    pub category: String,
    pub publish: String,
    pub title: String,
    pub link: String,
    pub detail: String,
}

/// Identity a pipeline hands down to the stages it invokes.
///
/// Replaces the original system's implicit `PIPELINE_ID` global; the CLI
/// may still seed it from the environment for backward compatibility.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub pipeline_id: Option<i64>,
    pub evaluator_key: String,
}

impl PipelineContext {
    pub fn new(pipeline_id: Option<i64>, evaluator_key: impl Into<String>) -> Self {
        Self {
            pipeline_id,
            evaluator_key: evaluator_key.into(),
        }
    }

    /// Read `PIPELINE_ID` / `PIPELINE_EVALUATOR_KEY` from the environment.
    pub fn from_env() -> Self {
        let pipeline_id = std::env::var("PIPELINE_ID")
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok());
        let evaluator_key = std::env::var("PIPELINE_EVALUATOR_KEY")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "news_evaluator".to_string());
        Self {
            pipeline_id,
            evaluator_key,
        }
    }
}
