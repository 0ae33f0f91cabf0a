//! HTML e-mail digest renderer.

use chrono::Utc;

use newswire_common::datetime::{display_offset, try_parse_dt};
use newswire_common::scoring::stars_rounded;
use newswire_common::MetricDef;

use crate::selection::RankedItem;

/// Optional footer links, parameterized by the frontend base URL and the
/// recipient address.
#[derive(Debug, Clone, Default)]
pub struct FooterLinks {
    pub manage_url: Option<String>,
    pub unsubscribe_url: Option<String>,
}

impl FooterLinks {
    /// Build from a frontend base URL and recipient. Empty base yields no
    /// links.
    pub fn build(base: Option<&str>, email: Option<&str>, pipeline_id: Option<i64>) -> Self {
        let Some(base) = base.map(|b| b.trim().trim_end_matches('/')).filter(|b| !b.is_empty())
        else {
            return Self::default();
        };
        let manage_url = Some(format!("{base}/"));
        let unsubscribe_url = email.map(|email| {
            let mut url = format!(
                "{base}/unsubscribe?email={}&reason=email_footer",
                urlencode(email.trim())
            );
            if let Some(pid) = pipeline_id {
                url.push_str(&format!("&pipeline_id={pid}"));
            }
            url
        });
        Self {
            manage_url,
            unsubscribe_url,
        }
    }
}

fn urlencode(raw: &str) -> String {
    let mut out = String::new();
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

pub fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn human_time(publish: &str) -> String {
    match try_parse_dt(publish) {
        Some(dt) => dt
            .with_timezone(&display_offset())
            .format("%Y-%m-%d %H:%M 北京时间")
            .to_string(),
        None => publish.to_string(),
    }
}

const STYLE: &str = r#"
    body { font: 16px/1.55 -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, 'Helvetica Neue', Arial, 'Noto Sans', 'PingFang SC', 'Hiragino Sans GB', 'Microsoft YaHei', sans-serif; margin: 24px; color: #222; }
    h1 { font-size: 22px; margin: 0 0 4px; }
    .meta { color: #666; margin: 0 0 16px; }
    h2 { font-size: 19px; margin: 24px 0 10px; padding-top: 8px; border-top: 2px solid #eee; }
    .article-card { border: 1px solid #e5e7eb; border-radius: 10px; padding: 16px 18px; margin-bottom: 14px; background: #fff; box-shadow: 0 2px 4px rgba(15, 23, 42, 0.05); }
    .article-title { font-size: 17px; font-weight: 600; color: #0b5ed7; text-decoration: none; display: inline-block; margin-bottom: 6px; }
    .article-title:hover { text-decoration: underline; }
    .article-meta { color: #5f6368; font-size: 13px; margin-bottom: 10px; }
    .ai-summary { background: #f8fafc; border-radius: 8px; padding: 12px 14px; line-height: 1.6; color: #1f2937; }
    .ai-rating { display: flex; align-items: baseline; gap: 8px; font-size: 16px; font-weight: 600; margin-bottom: 6px; color: #b45309; }
    .stars { font-size: 18px; letter-spacing: 2px; color: #f97316; }
    .score-number { color: #b45309; font-size: 15px; }
    .ai-dimensions { font-size: 14px; color: #334155; margin-bottom: 6px; }
    .ai-comment, .ai-summary-text { font-size: 14px; color: #1f2937; }
    .footer { color: #6b7280; font-size: 12px; margin-top: 24px; border-top: 1px solid #e5e7eb; padding-top: 10px; }
    .footer a { color: #6b7280; }
"#;

/// Render the digest: one section per category, a card per article.
/// Returns an empty string when there is nothing to render.
pub fn render_email_digest(
    groups: &[(String, Vec<RankedItem>)],
    metrics: &[MetricDef],
    hours: i64,
    footer: &FooterLinks,
) -> String {
    let total: usize = groups.iter().map(|(_, items)| items.len()).sum();
    if total == 0 {
        return String::new();
    }
    let now_local = Utc::now().with_timezone(&display_offset());

    let mut out = String::new();
    out.push_str("<!doctype html>\n<html lang=\"zh-CN\">\n<head>\n");
    out.push_str("  <meta charset=\"utf-8\" />\n");
    out.push_str("  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\" />\n");
    out.push_str(&format!("  <title>最近 {hours} 小时资讯汇总</title>\n"));
    out.push_str(&format!("  <style>{STYLE}</style>\n</head>\n<body>\n"));
    out.push_str(&format!("<h1>最近 {hours} 小时资讯汇总</h1>\n"));
    out.push_str(&format!(
        "<p class=\"meta\">生成时间：{} · 合计：{total} 条</p>\n",
        now_local.format("%Y-%m-%d %H:%M 北京时间")
    ));

    for (category, items) in groups {
        let label = if category.is_empty() {
            "(未分类)"
        } else {
            category.as_str()
        };
        out.push_str(&format!("<h2>{}</h2>\n", escape_html(label)));
        for item in items {
            out.push_str(&render_card(item, metrics));
            out.push('\n');
        }
    }

    let mut footer_parts = Vec::new();
    if let Some(url) = &footer.unsubscribe_url {
        footer_parts.push(format!("<a href=\"{}\">退订</a>", escape_html(url)));
    }
    if let Some(url) = &footer.manage_url {
        footer_parts.push(format!("<a href=\"{}\">管理订阅</a>", escape_html(url)));
    }
    if !footer_parts.is_empty() {
        out.push_str(&format!(
            "<div class=\"footer\">{}</div>\n",
            footer_parts.join(" · ")
        ));
    }

    out.push_str("</body>\n</html>\n");
    out
}

fn render_card(item: &RankedItem, metrics: &[MetricDef]) -> String {
    let title = escape_html(&format!("{}:{}", item.source, item.title));
    let link = escape_html(&item.link);
    let shown_time = escape_html(&human_time(&item.publish));

    let stars = stars_rounded(item.score);
    let dims = metrics
        .iter()
        .map(|metric| {
            let value = item
                .scores
                .get(&metric.key)
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string());
            format!("{}：{}", metric.label, value)
        })
        .collect::<Vec<_>>()
        .join(" · ");
    let bonus_note = if item.bonus != 0.0 {
        let sign = if item.bonus > 0.0 { "+" } else { "" };
        format!("（手动加成 {sign}{}）", item.bonus)
    } else {
        String::new()
    };

    format!(
        concat!(
            "<article class=\"article-card\">",
            "<a class=\"article-title\" href=\"{link}\" target=\"_blank\" rel=\"noopener noreferrer\">{title}</a>",
            "<div class=\"article-meta\"><time>{time}</time></div>",
            "<div class=\"ai-summary\">",
            "<div class=\"ai-rating\"><span class=\"stars\">{stars}</span>",
            "<span class=\"score-number\">{score:.2}/5</span></div>",
            "<div class=\"ai-dimensions\">{dims}{bonus}</div>",
            "<div class=\"ai-comment\">评价：{comment}</div>",
            "<div class=\"ai-summary-text\">概要：{summary}</div>",
            "</div>",
            "</article>"
        ),
        link = link,
        title = title,
        time = shown_time,
        stars = stars,
        score = item.score,
        dims = escape_html(&dims),
        bonus = escape_html(&bonus_note),
        comment = escape_html(&item.comment),
        summary = escape_html(&item.summary),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn item(score: f64) -> RankedItem {
        RankedItem {
            id: 1,
            category: "tech".into(),
            source: "feed-a".into(),
            publish: "2025-06-01T08:00:00+00:00".into(),
            title: "A <title>".into(),
            link: "https://x/a?b=1".into(),
            store_link: String::new(),
            img_link: String::new(),
            summary: "概要内容".into(),
            comment: "点评内容".into(),
            score,
            bonus: 0.0,
            scores: HashMap::from([("quality".to_string(), 4)]),
        }
    }

    fn metrics() -> Vec<MetricDef> {
        vec![MetricDef {
            id: 1,
            key: "quality".into(),
            label: "文章质量".into(),
            rate_guide: None,
            default_weight: Some(1.0),
            sort_order: 10,
        }]
    }

    #[test]
    fn renders_sections_cards_and_stars() {
        let groups = vec![("tech".to_string(), vec![item(4.5)])];
        let html = render_email_digest(&groups, &metrics(), 24, &FooterLinks::default());
        assert!(html.contains("<h2>tech</h2>"));
        // 4.5 rounds to five filled stars.
        assert!(html.contains("★★★★★"));
        assert!(html.contains("文章质量：4"));
        assert!(html.contains("评价：点评内容"));
        // Title is escaped.
        assert!(html.contains("A &lt;title&gt;"));
        assert!(!html.contains("A <title>"));
    }

    #[test]
    fn empty_selection_renders_nothing() {
        let html = render_email_digest(&[], &metrics(), 24, &FooterLinks::default());
        assert!(html.is_empty());
    }

    #[test]
    fn footer_links_are_parameterized() {
        let footer = FooterLinks::build(Some("https://news.example.com/"), Some("a@b.c"), Some(7));
        assert_eq!(footer.manage_url.as_deref(), Some("https://news.example.com/"));
        let unsub = footer.unsubscribe_url.clone().unwrap();
        assert!(unsub.contains("email=a%40b.c"));
        assert!(unsub.contains("pipeline_id=7"));

        let none = FooterLinks::build(None, Some("a@b.c"), None);
        assert!(none.manage_url.is_none() && none.unsubscribe_url.is_none());

        let groups = vec![("tech".to_string(), vec![item(3.0)])];
        let html = render_email_digest(&groups, &metrics(), 24, &footer);
        assert!(html.contains("退订"));
        assert!(html.contains("unsubscribe?email="));
    }
}
