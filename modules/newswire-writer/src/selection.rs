//! The shared selection/ranking pipeline behind every digest writer.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};

use newswire_common::datetime::try_parse_dt;
use newswire_common::scoring::{apply_source_bonus, weighted_mean};
use newswire_store::ScoredArticle;

use crate::limits::limit_for_category;

/// One ranked digest entry.
#[derive(Debug, Clone)]
pub struct RankedItem {
    pub id: i64,
    pub category: String,
    pub source: String,
    pub publish: String,
    pub title: String,
    pub link: String,
    pub store_link: String,
    pub img_link: String,
    pub summary: String,
    pub comment: String,
    pub score: f64,
    pub bonus: f64,
    pub scores: HashMap<String, i64>,
}

pub struct SelectionConfig {
    pub hours: i64,
    /// Categories to emit, in order. Empty means "group whatever appears".
    pub categories: Vec<String>,
    pub metric_keys: Vec<String>,
    pub weights: HashMap<String, f64>,
    pub source_bonus: HashMap<String, f64>,
    pub min_score: f64,
    pub limit_map: HashMap<String, i64>,
    pub limit_default: i64,
    pub per_source_cap: i64,
    /// Require a review row for the pipeline's evaluator (AI-dependent
    /// writers).
    pub require_review: bool,
    /// Rank by the stored review `final_score` instead of recomputing the
    /// weighted mean (writers that need no per-metric scores).
    pub use_review_score: bool,
}

/// Apply the §4.4 cascade: window → completeness → dedup → score+bonus →
/// min-score → group → sort → per-source cap → per-category limit.
/// Returns `(category, items)` groups in the configured category order.
pub fn select(
    articles: Vec<ScoredArticle>,
    config: &SelectionConfig,
    now: DateTime<Utc>,
) -> Vec<(String, Vec<RankedItem>)> {
    let cutoff = now - Duration::hours(config.hours.max(1));
    let mut by_category: HashMap<String, Vec<RankedItem>> = HashMap::new();
    let mut seen_links: HashSet<String> = HashSet::new();

    for article in articles {
        let Some(published) = try_parse_dt(&article.publish) else {
            continue;
        };
        if published < cutoff {
            continue;
        }
        if !config.categories.is_empty() && !config.categories.contains(&article.category) {
            continue;
        }
        let title = article.title.trim();
        let link = article.link.trim();
        if title.is_empty() || link.is_empty() {
            continue;
        }
        if !seen_links.insert(link.to_string()) {
            continue;
        }
        if config.require_review && !article.has_review {
            continue;
        }
        // Complete set of active-metric scores.
        if !config
            .metric_keys
            .iter()
            .all(|key| article.scores.contains_key(key))
        {
            continue;
        }

        let base = if config.use_review_score {
            article.review_final_score
        } else {
            weighted_mean(&article.scores, &config.weights)
        };
        let bonus = config
            .source_bonus
            .get(&article.source)
            .copied()
            .unwrap_or(0.0);
        let score = apply_source_bonus(base, bonus);
        if score < config.min_score {
            continue;
        }

        by_category
            .entry(article.category.clone())
            .or_default()
            .push(RankedItem {
                id: article.id,
                category: article.category,
                source: article.source,
                publish: article.publish,
                title: title.to_string(),
                link: link.to_string(),
                store_link: article.store_link,
                img_link: article.img_link,
                summary: article.ai_summary,
                comment: article.ai_comment,
                score,
                bonus,
                scores: article.scores,
            });
    }

    for items in by_category.values_mut() {
        sort_ranked(items);
        if config.per_source_cap > 0 {
            let mut per_source: HashMap<String, i64> = HashMap::new();
            items.retain(|item| {
                let count = per_source.entry(item.source.clone()).or_insert(0);
                *count += 1;
                *count <= config.per_source_cap
            });
            sort_ranked(items);
        }
    }

    let ordered_categories: Vec<String> = if config.categories.is_empty() {
        let mut categories: Vec<String> = by_category.keys().cloned().collect();
        categories.sort();
        categories
    } else {
        config.categories.clone()
    };

    let mut groups = Vec::new();
    for category in ordered_categories {
        let Some(mut items) = by_category.remove(&category) else {
            continue;
        };
        let limit = limit_for_category(&config.limit_map, config.limit_default, &category);
        if limit > 0 {
            items.truncate(limit as usize);
        }
        if !items.is_empty() {
            groups.push((category, items));
        }
    }
    groups
}

fn sort_ranked(items: &mut [RankedItem]) {
    items.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.publish.cmp(&a.publish))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(
        id: i64,
        category: &str,
        source: &str,
        link: &str,
        scores: &[(&str, i64)],
        hours_ago: i64,
    ) -> ScoredArticle {
        ScoredArticle {
            id,
            category: category.into(),
            source: source.into(),
            publish: (Utc::now() - Duration::hours(hours_ago))
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, false),
            title: format!("article {id}"),
            link: link.into(),
            store_link: String::new(),
            img_link: String::new(),
            ai_summary: format!("summary {id}"),
            ai_comment: String::new(),
            review_final_score: 0.0,
            has_review: true,
            scores: scores.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    fn config(weights: &[(&str, f64)]) -> SelectionConfig {
        SelectionConfig {
            hours: 24,
            categories: vec!["game".into(), "tech".into()],
            metric_keys: weights.iter().map(|(k, _)| k.to_string()).collect(),
            weights: weights.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            source_bonus: HashMap::new(),
            min_score: 0.0,
            limit_map: HashMap::new(),
            limit_default: 10,
            per_source_cap: 0,
            require_review: false,
            use_review_score: false,
        }
    }

    #[test]
    fn zero_weight_metric_cannot_outrank() {
        // timeliness weight 0, game_relevance 1: a game article scoring 5
        // on game_relevance beats any article with a lower game score.
        let cfg = config(&[("timeliness", 0.0), ("game_relevance", 1.0)]);
        let articles = vec![
            article(1, "game", "s1", "https://x/1", &[("timeliness", 5), ("game_relevance", 2)], 1),
            article(2, "game", "s2", "https://x/2", &[("timeliness", 1), ("game_relevance", 5)], 1),
        ];
        let groups = select(articles, &cfg, Utc::now());
        let items = &groups[0].1;
        assert_eq!(items[0].id, 2);
        assert_eq!(items[0].score, 5.0);
        assert_eq!(items[1].score, 2.0);
    }

    #[test]
    fn per_source_cap_displaces_to_next_best() {
        let mut cfg = config(&[("quality", 1.0)]);
        cfg.per_source_cap = 2;
        let articles = vec![
            article(1, "game", "same", "https://x/1", &[("quality", 5)], 1),
            article(2, "game", "same", "https://x/2", &[("quality", 5)], 2),
            article(3, "game", "same", "https://x/3", &[("quality", 5)], 3),
            article(4, "game", "other", "https://x/4", &[("quality", 3)], 1),
        ];
        let groups = select(articles, &cfg, Utc::now());
        let items = &groups[0].1;
        assert_eq!(items.len(), 3);
        let from_same = items.iter().filter(|i| i.source == "same").count();
        assert_eq!(from_same, 2);
        assert_eq!(items[2].source, "other");
    }

    #[test]
    fn category_limit_truncates_with_default_fallback() {
        let mut cfg = config(&[("quality", 1.0)]);
        cfg.limit_default = 2;
        cfg.limit_map.insert("tech".into(), 1);
        let articles = vec![
            article(1, "game", "a", "https://x/1", &[("quality", 5)], 1),
            article(2, "game", "b", "https://x/2", &[("quality", 4)], 1),
            article(3, "game", "c", "https://x/3", &[("quality", 3)], 1),
            article(4, "tech", "d", "https://x/4", &[("quality", 5)], 1),
            article(5, "tech", "e", "https://x/5", &[("quality", 4)], 1),
        ];
        let groups = select(articles, &cfg, Utc::now());
        assert_eq!(groups[0].1.len(), 2); // game uses the default
        assert_eq!(groups[1].1.len(), 1); // tech uses its explicit limit
    }

    #[test]
    fn window_dedup_and_completeness() {
        let cfg = config(&[("quality", 1.0), ("depth", 1.0)]);
        let complete = &[("quality", 4), ("depth", 4)][..];
        let articles = vec![
            article(1, "game", "a", "https://x/1", complete, 1),
            // Duplicate link dropped after the first occurrence.
            article(2, "game", "a", "https://x/1", complete, 1),
            // Outside the window.
            article(3, "game", "a", "https://x/3", complete, 48),
            // Missing the depth score.
            article(4, "game", "a", "https://x/4", &[("quality", 4)], 1),
        ];
        let groups = select(articles, &cfg, Utc::now());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].1.len(), 1);
        assert_eq!(groups[0].1[0].id, 1);
    }

    #[test]
    fn source_bonus_and_min_score_filter() {
        let mut cfg = config(&[("quality", 1.0)]);
        cfg.min_score = 3.5;
        cfg.source_bonus.insert("boosted".into(), 2.0);
        let articles = vec![
            article(1, "game", "boosted", "https://x/1", &[("quality", 2)], 1),
            article(2, "game", "plain", "https://x/2", &[("quality", 3)], 1),
        ];
        let groups = select(articles, &cfg, Utc::now());
        let items = &groups[0].1;
        // 2 + 2.0 bonus = 4.0 passes; 3 < 3.5 dropped.
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, 1);
        assert_eq!(items[0].score, 4.0);
        assert_eq!(items[0].bonus, 2.0);
    }
}
