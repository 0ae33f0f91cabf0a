//! Prompt template loading and assembly.
//!
//! The template file carries exactly one `<<SYS>>` marker followed by the
//! system prompt, then a `<<USER>>` marker followed by the user template.
//! `{{metrics_block}}` and `{{schema_example}}` are substituted globally
//! once per run; `{{title}}`/`{{source}}`/`{{publish}}`/`{{detail}}` per
//! article.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};

use newswire_common::MetricDef;

pub const DEFAULT_PROMPT_PATH: &str = "prompts/article_evaluation_zh.prompt";

const SYS_MARKER: &str = "<<SYS>>";
const USER_MARKER: &str = "<<USER>>";

pub fn load_prompt(path: &Path) -> Result<(String, String)> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read prompt file {}", path.display()))?;
    if !text.contains(SYS_MARKER) || !text.contains(USER_MARKER) {
        bail!(
            "prompt file {} must contain {SYS_MARKER} and {USER_MARKER} markers",
            path.display()
        );
    }
    let (sys_part, user_part) = text
        .split_once(USER_MARKER)
        .expect("marker presence checked above");
    let system = sys_part.replacen(SYS_MARKER, "", 1).trim().to_string();
    let user = user_part.trim().to_string();
    if system.is_empty() || user.is_empty() {
        bail!("prompt file {} has an empty section", path.display());
    }
    Ok((system, user))
}

/// Replace every `{{key}}` with its value; unknown variables stay as-is.
pub fn fill(template: &str, mapping: &HashMap<&str, String>) -> String {
    let mut result = template.to_string();
    for (key, value) in mapping {
        result = result.replace(&format!("{{{{{key}}}}}"), value);
    }
    result
}

/// Bullet list of active metric `(key, label)` pairs in sort order.
pub fn metrics_block(metrics: &[MetricDef]) -> String {
    metrics
        .iter()
        .map(|metric| format!("- {}（{}）", metric.key, metric.label))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Literal JSON example whose keys are the active metric keys in order,
/// plus the fixed comment/summary/key_concepts/summary_long tail.
pub fn schema_example(metrics: &[MetricDef]) -> String {
    let mut lines = vec!["{".to_string(), "  \"dimension_scores\": {".to_string()];
    for (index, metric) in metrics.iter().enumerate() {
        let mut desc = metric.label.clone();
        if let Some(guide) = &metric.rate_guide {
            desc = format!("{desc}：{guide}");
        }
        let trailing = if index + 1 < metrics.len() { "," } else { "" };
        lines.push(format!(
            "    \"{}\": <1-5整数>{trailing}  --{desc}",
            metric.key
        ));
    }
    lines.push("  },".to_string());
    lines.push("  \"comment\": \"<一句话中文评价>\",  --整体评价，需说明理由".to_string());
    lines.push("  \"summary\": \"<一句话介绍文章内容>\",  --简要概括文章要点".to_string());
    lines.push(
        "  \"key_concepts\": [\"<按重要性列出0-5个核心名词>\"],  --无法提炼时使用空数组 []"
            .to_string(),
    );
    lines.push("  \"summary_long\": \"<约50字的中文扩展摘要>\"  --若缺资料可复用 summary".to_string());
    lines.push("}".to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(key: &str, label: &str, guide: Option<&str>, order: i64) -> MetricDef {
        MetricDef {
            id: order,
            key: key.into(),
            label: label.into(),
            rate_guide: guide.map(Into::into),
            default_weight: Some(0.1),
            sort_order: order,
        }
    }

    #[test]
    fn metrics_block_lists_key_and_label() {
        let metrics = vec![
            metric("timeliness", "时效性", None, 10),
            metric("quality", "文章质量", None, 20),
        ];
        assert_eq!(
            metrics_block(&metrics),
            "- timeliness（时效性）\n- quality（文章质量）"
        );
    }

    #[test]
    fn schema_example_has_all_keys_in_order() {
        let metrics = vec![
            metric("timeliness", "时效性", Some("5-当天"), 10),
            metric("quality", "文章质量", None, 20),
        ];
        let example = schema_example(&metrics);
        let timeliness = example.find("\"timeliness\"").unwrap();
        let quality = example.find("\"quality\"").unwrap();
        assert!(timeliness < quality);
        assert!(example.contains("\"dimension_scores\""));
        assert!(example.contains("\"summary_long\""));
        // Only the last metric line drops the comma.
        assert!(example.contains("<1-5整数>,  --时效性：5-当天"));
        assert!(example.contains("<1-5整数>  --文章质量"));
    }

    #[test]
    fn fill_replaces_known_and_keeps_unknown() {
        let mut mapping = HashMap::new();
        mapping.insert("title", "标题".to_string());
        let out = fill("{{title}} / {{publish}}", &mapping);
        assert_eq!(out, "标题 / {{publish}}");
    }

    #[test]
    fn load_prompt_requires_markers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.prompt");
        std::fs::write(&path, "no markers").unwrap();
        assert!(load_prompt(&path).is_err());

        std::fs::write(&path, "<<SYS>>\nsystem text\n<<USER>>\nuser {{title}}\n").unwrap();
        let (system, user) = load_prompt(&path).unwrap();
        assert_eq!(system, "system text");
        assert_eq!(user, "user {{title}}");
    }
}
