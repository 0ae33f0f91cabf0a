//! Per-category limit configuration.
//!
//! Stored (and CLI-passed) either as a bare integer or as a JSON map with
//! an optional `"default"` entry: `{"default": 10, "tech": 5}`.

use std::collections::HashMap;

/// Parse a limit config value. Returns `(per-category map, default)`.
/// Unparseable input falls back to `fallback_default`.
pub fn parse_limit_config(raw: Option<&str>, fallback_default: i64) -> (HashMap<String, i64>, i64) {
    let mut limit_map = HashMap::new();
    let mut default_limit = fallback_default;

    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return (limit_map, default_limit);
    };

    let Ok(parsed) = serde_json::from_str::<serde_json::Value>(raw) else {
        if let Ok(n) = raw.parse::<f64>() {
            default_limit = n as i64;
        }
        return (limit_map, default_limit);
    };

    match parsed {
        serde_json::Value::Number(n) => {
            if let Some(v) = n.as_i64() {
                default_limit = v;
            }
        }
        serde_json::Value::Object(map) => {
            for (key, value) in map {
                let key = key.trim().to_string();
                let Some(v) = value.as_i64() else { continue };
                if key.is_empty() {
                    continue;
                }
                if key.eq_ignore_ascii_case("default") {
                    default_limit = v;
                } else {
                    limit_map.insert(key, v);
                }
            }
        }
        _ => {}
    }
    (limit_map, default_limit)
}

pub fn limit_for_category(limit_map: &HashMap<String, i64>, default_limit: i64, category: &str) -> i64 {
    limit_map.get(category).copied().unwrap_or(default_limit)
}
