//! Per-metric weight resolution for the composers.
//!
//! Chain: metric defaults → pipeline metric-weight rows (when present,
//! they own the active set) → writer `weights_json` → CLI override. A
//! metric with effective weight <= 0 is excluded from scoring.

use std::collections::{HashMap, HashSet};

use newswire_common::MetricDef;
use newswire_store::MetricWeightRow;

/// Parse a JSON object of `{metric_or_source: number}` overrides.
/// Invalid JSON yields an empty map; unknown keys are dropped when
/// `valid_keys` is given; negative values are dropped unless allowed.
pub fn parse_overrides(
    raw: &str,
    valid_keys: Option<&HashSet<String>>,
    allow_negative: bool,
) -> HashMap<String, f64> {
    let mut overrides = HashMap::new();
    let raw = raw.trim();
    if raw.is_empty() {
        return overrides;
    }
    let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(raw) else {
        return overrides;
    };
    for (key, value) in map {
        if let Some(valid) = valid_keys {
            if !valid.contains(&key) {
                continue;
            }
        }
        let Some(v) = value.as_f64() else { continue };
        if !allow_negative && v < 0.0 {
            continue;
        }
        overrides.insert(key, v);
    }
    overrides
}

pub fn resolve_weights(
    metrics: &[MetricDef],
    metric_weight_rows: &[MetricWeightRow],
    weights_json: &str,
    cli_override: &str,
) -> HashMap<String, f64> {
    let valid_keys: HashSet<String> = metrics.iter().map(|m| m.key.clone()).collect();
    let mut weights: HashMap<String, f64> = metrics
        .iter()
        .map(|m| (m.key.clone(), m.default_weight.unwrap_or(0.0)))
        .collect();

    let mut active_keys: HashSet<String>;
    if !metric_weight_rows.is_empty() {
        active_keys = metric_weight_rows
            .iter()
            .filter(|row| row.enabled != 0)
            .map(|row| row.key.clone())
            .collect();
        for row in metric_weight_rows {
            if valid_keys.contains(&row.key) {
                weights.insert(row.key.clone(), row.weight.max(0.0));
            }
        }
        for key in &valid_keys {
            if !active_keys.contains(key) {
                weights.insert(key.clone(), 0.0);
            }
        }
    } else {
        for (key, value) in parse_overrides(weights_json, Some(&valid_keys), false) {
            weights.insert(key, value.max(0.0));
        }
        active_keys = weights
            .iter()
            .filter(|(_, v)| **v > 0.0)
            .map(|(k, _)| k.clone())
            .collect();
    }

    for (key, value) in parse_overrides(cli_override, Some(&valid_keys), false) {
        weights.insert(key.clone(), value.max(0.0));
        if value > 0.0 {
            active_keys.insert(key);
        } else {
            active_keys.remove(&key);
        }
    }

    if !active_keys.is_empty() {
        for (key, value) in weights.iter_mut() {
            if !active_keys.contains(key) {
                *value = 0.0;
            }
        }
    }
    weights
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(key: &str, weight: f64) -> MetricDef {
        MetricDef {
            id: 0,
            key: key.into(),
            label: key.into(),
            rate_guide: None,
            default_weight: Some(weight),
            sort_order: 0,
        }
    }

    fn row(key: &str, weight: f64, enabled: i64) -> MetricWeightRow {
        MetricWeightRow {
            key: key.into(),
            weight,
            enabled,
        }
    }

    #[test]
    fn defaults_without_overrides() {
        let metrics = vec![metric("a", 0.3), metric("b", 0.7)];
        let weights = resolve_weights(&metrics, &[], "", "");
        assert_eq!(weights["a"], 0.3);
        assert_eq!(weights["b"], 0.7);
    }

    #[test]
    fn metric_rows_own_the_active_set() {
        let metrics = vec![metric("a", 0.3), metric("b", 0.7)];
        let rows = vec![row("a", 0.9, 1), row("b", 0.5, 0)];
        let weights = resolve_weights(&metrics, &rows, "", "");
        assert_eq!(weights["a"], 0.9);
        // Disabled row zeroes its metric even though the stored weight is 0.5.
        assert_eq!(weights["b"], 0.0);
    }

    #[test]
    fn weights_json_applies_when_no_rows() {
        let metrics = vec![metric("a", 0.3), metric("b", 0.7)];
        let weights = resolve_weights(&metrics, &[], r#"{"a": 0.0, "b": 1.0}"#, "");
        assert_eq!(weights["a"], 0.0);
        assert_eq!(weights["b"], 1.0);
    }

    #[test]
    fn cli_override_wins_last() {
        let metrics = vec![metric("a", 0.3), metric("b", 0.7)];
        let weights = resolve_weights(&metrics, &[], r#"{"a": 1.0}"#, r#"{"a": 0}"#);
        assert_eq!(weights["a"], 0.0);
        // b stays active via its default.
        assert_eq!(weights["b"], 0.7);
    }

    #[test]
    fn unknown_keys_and_negatives_dropped() {
        let valid: HashSet<String> = ["a".to_string()].into_iter().collect();
        let parsed = parse_overrides(r#"{"a": 0.5, "zz": 1.0, "a2": -1}"#, Some(&valid), false);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed["a"], 0.5);

        let bonus = parse_overrides(r#"{"src": -2.5}"#, None, true);
        assert_eq!(bonus["src"], -2.5);
    }
}
