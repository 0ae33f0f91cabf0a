//! Strict validation of the LLM's JSON response. Every rejection is a
//! `NewswireError::Validation` so callers can separate a bad response
//! from a transport failure.

use std::collections::HashMap;

use serde_json::Value;

use newswire_common::{MetricDef, NewswireError};

fn invalid(message: impl Into<String>) -> NewswireError {
    NewswireError::Validation(message.into())
}

/// A validated evaluation payload, before scoring/persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedReview {
    pub scores: HashMap<String, i64>,
    pub comment: String,
    pub summary: String,
    pub key_concepts: Vec<String>,
    pub summary_long: String,
}

/// Trim triple-backtick fencing, with an optional `json` tag.
pub fn strip_json_fence(text: &str) -> &str {
    let stripped = text.trim();
    let Some(inner) = stripped.strip_prefix("```") else {
        return stripped;
    };
    let inner = inner
        .strip_prefix("json")
        .or_else(|| inner.strip_prefix("JSON"))
        .unwrap_or(inner);
    let inner = inner.trim();
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

pub fn parse_payload(raw: &str) -> Result<Value, NewswireError> {
    let cleaned = strip_json_fence(raw);
    let value: Value = serde_json::from_str(cleaned)
        .map_err(|e| invalid(format!("AI response is not valid JSON: {e}")))?;
    if !value.is_object() {
        return Err(invalid("AI response top level must be a JSON object"));
    }
    Ok(value)
}

fn collapse_newlines(text: &str) -> String {
    text.trim().replace(['\r', '\n'], " ")
}

pub fn validate(payload: &Value, metrics: &[MetricDef]) -> Result<ValidatedReview, NewswireError> {
    let Some(scores_raw) = payload.get("dimension_scores").and_then(|v| v.as_object()) else {
        return Err(invalid("response missing dimension_scores object"));
    };

    let required: Vec<&str> = metrics.iter().map(|m| m.key.as_str()).collect();
    let mut unexpected: Vec<&str> = scores_raw
        .keys()
        .map(String::as_str)
        .filter(|key| !required.contains(key))
        .collect();
    if !unexpected.is_empty() {
        unexpected.sort_unstable();
        return Err(invalid(format!(
            "response contains unknown metrics: {}",
            unexpected.join(", ")
        )));
    }
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|key| !scores_raw.contains_key(*key))
        .collect();
    if !missing.is_empty() {
        return Err(invalid(format!(
            "response missing metrics: {}",
            missing.join(", ")
        )));
    }

    let mut scores = HashMap::new();
    for metric in metrics {
        let value = scores_raw
            .get(&metric.key)
            .and_then(|v| v.as_f64())
            .ok_or_else(|| invalid(format!("score for {} is not a number", metric.key)))?;
        let score = value.round() as i64;
        if !(1..=5).contains(&score) {
            return Err(invalid(format!("score for {} out of 1-5 range", metric.key)));
        }
        scores.insert(metric.key.clone(), score);
    }

    let comment = payload
        .get("comment")
        .and_then(|v| v.as_str())
        .map(collapse_newlines)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid("comment field missing or empty"))?;
    let summary = payload
        .get("summary")
        .and_then(|v| v.as_str())
        .map(collapse_newlines)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid("summary field missing or empty"))?;

    let key_concepts = parse_key_concepts(payload.get("key_concepts"))?;

    let summary_long = match payload.get("summary_long") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => collapse_newlines(s),
        Some(_) => return Err(invalid("summary_long must be a string")),
    };
    let summary_long = if summary_long.is_empty() {
        summary.clone()
    } else {
        summary_long
    };

    Ok(ValidatedReview {
        scores,
        comment,
        summary,
        key_concepts,
        summary_long,
    })
}

fn parse_key_concepts(raw: Option<&Value>) -> Result<Vec<String>, NewswireError> {
    let mut concepts: Vec<String> = match raw {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(s)) => s
            .replace(['，', '、', '；', ';'], ",")
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(|item| match item {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            })
            .filter(|text| !text.is_empty())
            .collect(),
        Some(_) => return Err(invalid("key_concepts field has an invalid format")),
    };
    concepts.truncate(5);
    Ok(concepts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metrics() -> Vec<MetricDef> {
        ["timeliness", "quality"]
            .iter()
            .enumerate()
            .map(|(i, key)| MetricDef {
                id: i as i64 + 1,
                key: key.to_string(),
                label: key.to_string(),
                rate_guide: None,
                default_weight: Some(0.5),
                sort_order: (i as i64 + 1) * 10,
            })
            .collect()
    }

    #[test]
    fn strips_fencing_variants() {
        assert_eq!(strip_json_fence("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_json_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_json_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn accepts_a_complete_payload() {
        let payload = json!({
            "dimension_scores": {"timeliness": 4.5, "quality": 4.4},
            "comment": "评\n价",
            "summary": "概要",
            "key_concepts": ["A", "B", 3],
            "summary_long": ""
        });
        let review = validate(&payload, &metrics()).unwrap();
        // 4.5 rounds up, 4.4 rounds down.
        assert_eq!(review.scores["timeliness"], 5);
        assert_eq!(review.scores["quality"], 4);
        assert_eq!(review.comment, "评 价");
        assert_eq!(review.key_concepts, vec!["A", "B", "3"]);
        // Empty summary_long copies summary.
        assert_eq!(review.summary_long, "概要");
    }

    #[test]
    fn rejects_extra_and_missing_metrics() {
        let extra = json!({
            "dimension_scores": {"timeliness": 3, "quality": 3, "bogus": 3},
            "comment": "c", "summary": "s"
        });
        assert!(validate(&extra, &metrics()).is_err());

        let missing = json!({
            "dimension_scores": {"timeliness": 3},
            "comment": "c", "summary": "s"
        });
        assert!(validate(&missing, &metrics()).is_err());
    }

    #[test]
    fn rejects_out_of_range_scores() {
        let payload = json!({
            "dimension_scores": {"timeliness": 6, "quality": 3},
            "comment": "c", "summary": "s"
        });
        assert!(validate(&payload, &metrics()).is_err());

        let payload = json!({
            "dimension_scores": {"timeliness": 0.4, "quality": 3},
            "comment": "c", "summary": "s"
        });
        assert!(validate(&payload, &metrics()).is_err());
    }

    #[test]
    fn key_concepts_string_splits_on_cjk_separators() {
        let payload = json!({
            "dimension_scores": {"timeliness": 3, "quality": 3},
            "comment": "c", "summary": "s",
            "key_concepts": "甲，乙、丙；丁,戊,己"
        });
        let review = validate(&payload, &metrics()).unwrap();
        assert_eq!(review.key_concepts.len(), 5);
        assert_eq!(review.key_concepts[0], "甲");
    }

    #[test]
    fn missing_key_concepts_is_empty_list() {
        let payload = json!({
            "dimension_scores": {"timeliness": 3, "quality": 3},
            "comment": "c", "summary": "s",
            "key_concepts": null
        });
        let review = validate(&payload, &metrics()).unwrap();
        assert!(review.key_concepts.is_empty());
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(parse_payload("[1,2,3]").is_err());
        assert!(parse_payload("not json").is_err());
        assert!(parse_payload("```json\n{\"ok\":1}\n```").is_ok());
    }
}
