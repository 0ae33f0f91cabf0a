//! Per-pipeline weekday gating.
//!
//! Semantics: `None` means unrestricted, an empty set means never run,
//! otherwise a pipeline runs iff today's ISO weekday (in the configured
//! display timezone) is in the set.

use chrono::FixedOffset;

use crate::datetime::today_iso_weekday;

/// Normalize a weekday list to sorted unique days in 1..=7.
///
/// Days outside 1..=7 are rejected (dropped); `None` stays `None`.
pub fn normalize(days: Option<&[i64]>) -> Option<Vec<u32>> {
    let days = days?;
    let mut out: Vec<u32> = days
        .iter()
        .copied()
        .filter(|d| (1..=7).contains(d))
        .map(|d| d as u32)
        .collect();
    out.sort_unstable();
    out.dedup();
    Some(out)
}

/// Lenient parser for the stored `weekdays_json` column.
///
/// Accepts a JSON array, a bare number, a CSV string, or null/empty.
/// Returns the normalized set, or `None` for "unrestricted". Malformed
/// input also resolves to `None`: a corrupted value must not silently
/// stop a pipeline from ever running.
pub fn coerce(raw: Option<&str>) -> Option<Vec<u32>> {
    let text = raw?.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(text) {
        return match value {
            serde_json::Value::Null => None,
            serde_json::Value::Array(items) => {
                let days: Vec<i64> = items.iter().filter_map(|v| v.as_i64()).collect();
                normalize(Some(&days)).or(Some(Vec::new()))
            }
            serde_json::Value::Number(n) => {
                let days = n.as_i64().map(|d| vec![d]).unwrap_or_default();
                normalize(Some(&days)).or(Some(Vec::new()))
            }
            _ => None,
        };
    }
    // CSV fallback: "2,3,4"
    let parsed: Result<Vec<i64>, _> = text.split(',').map(|p| p.trim().parse::<i64>()).collect();
    match parsed {
        Ok(days) => normalize(Some(&days)).or(Some(Vec::new())),
        Err(_) => None,
    }
}

/// Whether a run is allowed today for the given day set.
pub fn is_allowed(days: Option<&[u32]>, today: u32) -> bool {
    match days {
        None => true,
        Some([]) => false,
        Some(days) => days.contains(&today),
    }
}

/// `is_allowed` against the wall clock in the given display offset.
pub fn is_allowed_now(days: Option<&[u32]>, offset: FixedOffset) -> bool {
    is_allowed(days, today_iso_weekday(offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_sorts_dedups_and_rejects_unknown_days() {
        assert_eq!(normalize(Some(&[3, 1, 3, 9, 0, 7])), Some(vec![1, 3, 7]));
        assert_eq!(normalize(Some(&[])), Some(vec![]));
        assert_eq!(normalize(None), None);
    }

    #[test]
    fn coerce_handles_json_csv_and_null() {
        assert_eq!(coerce(Some("[2,3]")), Some(vec![2, 3]));
        assert_eq!(coerce(Some("2,3,4")), Some(vec![2, 3, 4]));
        assert_eq!(coerce(Some("6")), Some(vec![6]));
        assert_eq!(coerce(Some("null")), None);
        assert_eq!(coerce(Some("")), None);
        assert_eq!(coerce(None), None);
        // Garbage degrades to unrestricted, never to "never run".
        assert_eq!(coerce(Some("weekends")), None);
        assert_eq!(coerce(Some("\"weekends\"")), None);
    }

    #[test]
    fn allowed_semantics() {
        // None -> unrestricted.
        assert!(is_allowed(None, 1));
        // Empty -> never.
        assert!(!is_allowed(Some(&[]), 1));
        // Full week is equivalent to unrestricted for the today check.
        for day in 1..=7 {
            assert!(is_allowed(Some(&[1, 2, 3, 4, 5, 6, 7]), day));
        }
        // Monday against a weekend-only pipeline.
        assert!(!is_allowed(Some(&[6, 7]), 1));
        assert!(is_allowed(Some(&[6, 7]), 6));
    }
}
