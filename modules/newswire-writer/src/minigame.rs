//! Minigame digest renderer: a numbered markdown list with the AI summary
//! and comment, source link, and optional store link / cover image.

use newswire_common::scoring::score_to_stars;

use crate::selection::RankedItem;

pub fn render_minigame_digest(groups: &[(String, Vec<RankedItem>)]) -> String {
    let total: usize = groups.iter().map(|(_, items)| items.len()).sum();
    if total == 0 {
        return String::new();
    }

    let mut sections = Vec::new();
    for (category, items) in groups {
        let mut lines = vec![format!("**{}**", category.to_uppercase())];
        for (index, item) in items.iter().enumerate() {
            lines.push(render_item(index + 1, item));
        }
        lines.push(String::new());
        sections.push(lines.join("\n"));
    }
    format!("{}\n", sections.join("\n").trim_end())
}

fn render_item(index: usize, item: &RankedItem) -> String {
    let stars = score_to_stars(item.score);
    let mut lines = vec![format!(
        "{index}. (AI推荐:{stars}) **{}** ([{}]({}))",
        item.title.trim(),
        if item.source.is_empty() { "查看原文" } else { &item.source },
        item.link
    )];
    if !item.summary.trim().is_empty() {
        lines.push(format!("   - 简介：{}", item.summary.trim()));
    }
    if !item.comment.trim().is_empty() {
        lines.push(format!("   - 点评：{}", item.comment.trim()));
    }
    if !item.store_link.trim().is_empty() {
        lines.push(format!("   - 商店：{}", item.store_link.trim()));
    }
    if !item.img_link.trim().is_empty() {
        lines.push(format!("   - ![封面]({})", item.img_link.trim()));
    }
    lines.join("\n")
}
