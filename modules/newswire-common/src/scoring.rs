//! Weighted scoring, shared by the evaluator and the digest composers.

use std::collections::HashMap;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn clamp_final(value: f64) -> f64 {
    round2(value.clamp(1.0, 5.0))
}

/// Weighted mean of per-metric scores, clamped to [1.0, 5.0] and rounded
/// to two decimals.
///
/// Metrics with weight <= 0 do not contribute. When no positive weight
/// remains, falls back to the arithmetic mean of all present scores.
pub fn weighted_mean(scores: &HashMap<String, i64>, weights: &HashMap<String, f64>) -> f64 {
    let mut total = 0.0;
    let mut weight_sum = 0.0;
    for (key, weight) in weights {
        if *weight <= 0.0 {
            continue;
        }
        let Some(score) = scores.get(key) else { continue };
        total += *score as f64 * weight;
        weight_sum += weight;
    }
    if weight_sum <= 0.0 {
        if scores.is_empty() {
            return 1.0;
        }
        total = scores.values().map(|s| *s as f64).sum();
        weight_sum = scores.len() as f64;
    }
    clamp_final(total / weight_sum)
}

/// Apply a per-source manual bonus, re-clamping to [1.0, 5.0].
pub fn apply_source_bonus(score: f64, bonus: f64) -> f64 {
    if bonus == 0.0 {
        return score;
    }
    clamp_final(score + bonus)
}

/// Star row for chat digests: full stars = floor(score), plus a half
/// glyph when the fractional part is >= 0.5. `(AI推荐:★★★½)` style.
pub fn score_to_stars(score: f64) -> String {
    let s = score.clamp(0.0, 5.0);
    let full = s.floor() as usize;
    let has_half = s - full as f64 >= 0.5 && full < 5;
    let mut out = "★".repeat(full);
    if has_half {
        out.push('½');
    }
    out
}

/// Star row for HTML digests: filled stars = round(score), hollow padding
/// to five.
pub fn stars_rounded(score: f64) -> String {
    let rounded = ((score + 0.5).floor() as i64).clamp(1, 5) as usize;
    format!("{}{}", "★".repeat(rounded), "☆".repeat(5 - rounded))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(pairs: &[(&str, i64)]) -> HashMap<String, i64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn weights(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn weighted_mean_ignores_zero_weights() {
        let s = scores(&[("timeliness", 1), ("game_relevance", 5)]);
        let w = weights(&[("timeliness", 0.0), ("game_relevance", 1.0)]);
        assert_eq!(weighted_mean(&s, &w), 5.0);
    }

    #[test]
    fn weighted_mean_falls_back_to_arithmetic_mean() {
        let s = scores(&[("a", 2), ("b", 4)]);
        let w = weights(&[("a", 0.0), ("b", 0.0)]);
        assert_eq!(weighted_mean(&s, &w), 3.0);
    }

    #[test]
    fn weighted_mean_clamps_low() {
        let s = scores(&[("a", 1)]);
        let w = weights(&[("a", 0.5)]);
        assert_eq!(weighted_mean(&s, &w), 1.0);
    }

    #[test]
    fn source_bonus_clamps_to_range() {
        assert_eq!(apply_source_bonus(4.5, 3.0), 5.0);
        assert_eq!(apply_source_bonus(2.0, -5.0), 1.0);
        assert_eq!(apply_source_bonus(3.25, 0.0), 3.25);
        assert_eq!(apply_source_bonus(3.0, 0.5), 3.5);
    }

    #[test]
    fn chat_stars_floor_plus_half() {
        assert_eq!(score_to_stars(3.5), "★★★½");
        assert_eq!(score_to_stars(3.49), "★★★");
        assert_eq!(score_to_stars(5.0), "★★★★★");
        assert_eq!(score_to_stars(0.2), "");
    }

    #[test]
    fn html_stars_round_half_up() {
        assert_eq!(stars_rounded(4.5), "★★★★★");
        assert_eq!(stars_rounded(4.4), "★★★★☆");
        assert_eq!(stars_rounded(0.5), "★☆☆☆☆");
    }
}
