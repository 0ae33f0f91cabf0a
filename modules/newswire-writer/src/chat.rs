//! Chat markdown digest renderer.
//!
//! One bold heading per category, numbered items of the form
//! `N. (AI推荐:★★★½) <title> ([<source>](<url>))`.

use newswire_common::scoring::score_to_stars;

use crate::selection::RankedItem;

const TITLE_MAX_CHARS: usize = 100;

pub fn render_chat_digest(groups: &[(String, Vec<RankedItem>)]) -> String {
    let total: usize = groups.iter().map(|(_, items)| items.len()).sum();
    if total == 0 {
        return String::new();
    }

    let mut sections = Vec::new();
    for (category, items) in groups {
        sections.push(format_section(&category.to_uppercase(), items));
    }
    format!("{}\n", sections.join("\n").trim_end())
}

fn format_section(title: &str, items: &[RankedItem]) -> String {
    let mut lines = vec![format!("**{title}**")];
    for (index, item) in items.iter().enumerate() {
        let stars = score_to_stars(item.score);
        // Chat digests prefer the AI summary as the display title.
        let raw_title = if item.summary.trim().is_empty() {
            item.title.trim()
        } else {
            item.summary.trim()
        };
        let display = truncate_chars(raw_title, TITLE_MAX_CHARS);
        let source_label = if item.source.is_empty() {
            "查看原文"
        } else {
            item.source.as_str()
        };
        lines.push(format!(
            "{}. (AI推荐:{stars}) {display} ([{source_label}]({}))",
            index + 1,
            item.link
        ));
    }
    lines.push(String::new());
    lines.join("\n")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}…")
}
