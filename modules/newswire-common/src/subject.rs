//! Subject/title templating for delivery.
//!
//! Templates may contain `${date_zh}` (local date as `YYYY年MM月DD日`) and
//! `${ts}` (artifact timestamp `YYYYMMDD-HHMMSS`). Everything else is left
//! verbatim; an empty rendered result degrades to the date.

use chrono::{DateTime, FixedOffset, Utc};

use crate::datetime::display_offset;

pub const TS_FORMAT: &str = "%Y%m%d-%H%M%S";

pub fn artifact_ts(now: DateTime<Utc>, offset: FixedOffset) -> String {
    now.with_timezone(&offset).format(TS_FORMAT).to_string()
}

pub fn date_zh(now: DateTime<Utc>, offset: FixedOffset) -> String {
    now.with_timezone(&offset).format("%Y年%m月%d日").to_string()
}

/// Render a subject/title template against a fixed `(ts, date_zh)` pair.
pub fn render_subject(template: &str, ts: &str, date_zh: &str) -> String {
    let rendered = template
        .replace("${ts}", ts)
        .replace("${date_zh}", date_zh)
        .trim()
        .to_string();
    if rendered.is_empty() {
        date_zh.to_string()
    } else {
        rendered
    }
}

/// `render_subject` against the wall clock in the display timezone.
pub fn render_subject_now(template: &str) -> String {
    let offset = display_offset();
    let now = Utc::now();
    render_subject(template, &artifact_ts(now, offset), &date_zh(now, offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn replaces_both_placeholders() {
        let out = render_subject("日报 ${date_zh} (${ts})", "20250615-103000", "2025年06月15日");
        assert_eq!(out, "日报 2025年06月15日 (20250615-103000)");
    }

    #[test]
    fn unknown_placeholders_stay_verbatim() {
        let out = render_subject("${foo} digest", "ts", "date");
        assert_eq!(out, "${foo} digest");
    }

    #[test]
    fn empty_template_degrades_to_date() {
        assert_eq!(render_subject("", "ts", "2025年06月15日"), "2025年06月15日");
        assert_eq!(render_subject("   ", "ts", "2025年06月15日"), "2025年06月15日");
    }

    #[test]
    fn templating_is_idempotent_for_fixed_inputs() {
        let first = render_subject("简报${date_zh}", "ts", "2025年06月15日");
        let second = render_subject("简报${date_zh}", "ts", "2025年06月15日");
        assert_eq!(first, second);
    }

    #[test]
    fn ts_and_date_formats() {
        let now = chrono::Utc.with_ymd_and_hms(2025, 6, 15, 2, 30, 0).unwrap();
        let offset = chrono::FixedOffset::east_opt(8 * 3600).unwrap();
        assert_eq!(artifact_ts(now, offset), "20250615-103000");
        assert_eq!(date_zh(now, offset), "2025年06月15日");
    }
}
