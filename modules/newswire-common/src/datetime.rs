//! Publish-time handling shared by every scraper adapter and reader.
//!
//! Storage format is always ISO-8601 UTC (`YYYY-MM-DDTHH:MM:SS+00:00`);
//! conversion to the display timezone happens only at render time.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone,
    Timelike, Utc,
};
use regex::Regex;
use std::sync::OnceLock;

/// Substituted for missing date/time components when the reference "now"
/// does not match the observed fields.
const FALLBACK_FILL_VALUE: u32 = 11;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Provided {
    year: bool,
    month: bool,
    day: bool,
    hour: bool,
    minute: bool,
    second: bool,
}

impl Provided {
    fn all() -> Self {
        Self {
            year: true,
            month: true,
            day: true,
            hour: true,
            minute: true,
            second: true,
        }
    }

    fn any(&self) -> bool {
        self.year || self.month || self.day || self.hour || self.minute || self.second
    }
}

fn iso_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?x)^\s*
            (?P<year>\d{4})
            (?:[-/年](?P<month>\d{1,2})
                (?:[-/月](?P<day>\d{1,2})
                    (?:[T\s日](?P<hour>\d{1,2})
                        (?::(?P<minute>\d{1,2})
                            (?::(?P<second>\d{1,2}))?
                        )?
                    )?
                )?
            )?
            (?:\s*(?P<tz>Z|[+-]\d{2}:?\d{2}))?
            \s*$",
        )
        .expect("invalid ISO datetime pattern")
    })
}

fn parse_tz_offset(raw: Option<&str>) -> FixedOffset {
    let utc = FixedOffset::east_opt(0).expect("zero offset");
    let Some(raw) = raw else { return utc };
    if raw == "Z" {
        return utc;
    }
    let sign: i32 = if raw.starts_with('-') { -1 } else { 1 };
    let digits: String = raw[1..].chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 2 {
        return utc;
    }
    let hours: i32 = digits[..2].parse().unwrap_or(0);
    let minutes: i32 = if digits.len() > 2 {
        digits[2..].parse().unwrap_or(0)
    } else {
        0
    };
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).unwrap_or(utc)
}

fn parse_iso_like(raw: &str) -> Option<(DateTime<Utc>, Provided)> {
    let caps = iso_pattern().captures(raw)?;
    let mut provided = Provided::default();

    let get = |name: &str, flag: &mut bool| -> Option<u32> {
        caps.name(name).map(|m| {
            *flag = true;
            m.as_str().parse::<u32>().unwrap_or(0)
        })
    };

    let year = get("year", &mut provided.year)?;
    let month = get("month", &mut provided.month).unwrap_or(1);
    let day = get("day", &mut provided.day).unwrap_or(1);
    let hour = get("hour", &mut provided.hour).unwrap_or(0);
    let minute = get("minute", &mut provided.minute).unwrap_or(0);
    let second = get("second", &mut provided.second).unwrap_or(0);

    let tz = parse_tz_offset(caps.name("tz").map(|m| m.as_str()));
    let naive = NaiveDate::from_ymd_opt(year as i32, month, day)?.and_hms_opt(hour, minute, second)?;
    let dt = tz.from_local_datetime(&naive).single()?;
    Some((dt.with_timezone(&Utc), provided))
}

fn detect_components(raw: &str) -> Provided {
    let raw = raw.trim();
    if raw.is_empty() {
        return Provided::default();
    }
    if let Some((_, provided)) = parse_iso_like(raw) {
        if provided.any() {
            return provided;
        }
    }
    if DateTime::parse_from_rfc2822(raw).is_ok() {
        return Provided::all();
    }
    Provided::default()
}

fn ensure_datetime(value: Option<DateTime<Utc>>, raw: &str) -> Option<(DateTime<Utc>, Provided)> {
    if let Some(dt) = value {
        let mut provided = detect_components(raw);
        if !provided.any() {
            provided = Provided::all();
        }
        return Some((dt, provided));
    }

    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(parsed) = parse_iso_like(raw) {
        return Some(parsed);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some((dt.with_timezone(&Utc), Provided::all()));
    }
    None
}

fn fill_missing(dt: DateTime<Utc>, provided: Provided, now: DateTime<Utc>) -> DateTime<Utc> {
    // Observed year/month/day/hour must all agree with "now" for the
    // remaining fields to be propagated from it.
    let mut matches_now = provided.year || provided.month || provided.day || provided.hour;
    if matches_now {
        if provided.year && dt.year() != now.year() {
            matches_now = false;
        }
        if provided.month && dt.month() != now.month() {
            matches_now = false;
        }
        if provided.day && dt.day() != now.day() {
            matches_now = false;
        }
        if provided.hour && dt.hour() != now.hour() {
            matches_now = false;
        }
    }

    let fill = |is_provided: bool, current: u32, from_now: u32| -> u32 {
        if is_provided {
            current
        } else if matches_now {
            from_now
        } else {
            FALLBACK_FILL_VALUE
        }
    };

    let year = dt.year();
    let month = fill(provided.month, dt.month(), now.month());
    let day = fill(provided.day, dt.day(), now.day());
    let hour = fill(provided.hour, dt.hour(), now.hour());
    let minute = fill(provided.minute, dt.minute(), now.minute());
    let second = fill(provided.second, dt.second(), now.second());

    let build = |month: u32, day: u32, hour: u32, minute: u32, second: u32| {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(hour, minute, second))
            .map(|naive| Utc.from_utc_datetime(&naive))
    };

    build(month, day, hour, minute, second).unwrap_or_else(|| {
        // Out-of-range substitution; clamp each component into a valid range.
        build(
            month.clamp(1, 12),
            day.min(28).max(1),
            hour % 24,
            minute % 60,
            second % 60,
        )
        .unwrap_or(dt)
    })
}

/// Normalize a published datetime coming out of a scraper.
///
/// `value` is a parsed datetime when the adapter has one; `raw` is the
/// original textual form from the source (used to detect which components
/// were actually observed). Returns the canonical ISO-8601 UTC string, or
/// `""` when nothing parseable was given.
pub fn normalize_published(
    value: Option<DateTime<Utc>>,
    raw: &str,
    now: DateTime<Utc>,
) -> String {
    let Some((dt, provided)) = ensure_datetime(value, raw.trim()) else {
        return String::new();
    };
    let normalized = fill_missing(dt, provided, now);
    normalized.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// `normalize_published` against the current wall clock.
pub fn normalize_published_now(value: Option<DateTime<Utc>>, raw: &str) -> String {
    normalize_published(value, raw, Utc::now())
}

/// Lenient parser for stored `publish` strings.
///
/// Accepts ISO-8601 with or without offset or seconds, RFC 2822, a small
/// set of fixed fallback formats, and the relative forms some sources emit
/// ("3 days ago", "yesterday").
pub fn try_parse_dt(value: &str) -> Option<DateTime<Utc>> {
    let raw = value.trim();
    if raw.is_empty() {
        return None;
    }

    if let Some(dt) = parse_relative(raw) {
        return Some(dt);
    }

    let candidate = raw.replace('Z', "+00:00");
    if let Ok(dt) = DateTime::parse_from_rfc3339(&candidate) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M:%S",
        "%Y/%m/%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            let naive = date.and_hms_opt(0, 0, 0)?;
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    None
}

fn parse_relative(raw: &str) -> Option<DateTime<Utc>> {
    static RELATIVE: OnceLock<Regex> = OnceLock::new();
    let pattern = RELATIVE.get_or_init(|| {
        Regex::new(r"^(\d+)\s+(day|hour|minute|second)s?\s+ago$").expect("invalid relative pattern")
    });

    let low = raw.to_lowercase();
    if low == "yesterday" {
        return Some(Utc::now() - Duration::days(1));
    }
    if low == "today" {
        return Some(Utc::now());
    }
    let caps = pattern.captures(&low)?;
    let n: i64 = caps[1].parse().ok()?;
    let delta = match &caps[2] {
        "day" => Duration::days(n),
        "hour" => Duration::hours(n),
        "minute" => Duration::minutes(n),
        _ => Duration::seconds(n),
    };
    Some(Utc::now() - delta)
}

/// Display timezone for rendered artifacts, from `PIPELINE_TZ`.
///
/// Accepts a handful of zone names and `+HH:MM`-style offsets; defaults to
/// UTC+8.
pub fn display_offset() -> FixedOffset {
    offset_for(&std::env::var("PIPELINE_TZ").unwrap_or_default())
}

pub fn offset_for(tz: &str) -> FixedOffset {
    let east8 = FixedOffset::east_opt(8 * 3600).expect("+08:00");
    match tz.trim() {
        "" | "Asia/Shanghai" | "Asia/Hong_Kong" | "Asia/Singapore" => east8,
        "Asia/Tokyo" => FixedOffset::east_opt(9 * 3600).expect("+09:00"),
        "UTC" | "Etc/UTC" => FixedOffset::east_opt(0).expect("UTC"),
        other => {
            let sign = if other.starts_with('-') { -1 } else { 1 };
            let digits: String = other.chars().filter(|c| c.is_ascii_digit()).collect();
            let (hours, minutes) = if digits.len() >= 4 {
                (
                    digits[..2].parse::<i32>().unwrap_or(8),
                    digits[2..4].parse::<i32>().unwrap_or(0),
                )
            } else if !digits.is_empty() {
                (digits.parse::<i32>().unwrap_or(8), 0)
            } else {
                (8, 0)
            };
            FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).unwrap_or(east8)
        }
    }
}

/// ISO weekday (Mon=1..Sun=7) of "now" in the given display offset.
pub fn today_iso_weekday(offset: FixedOffset) -> u32 {
    Utc::now()
        .with_timezone(&offset)
        .weekday()
        .number_from_monday()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 14, 30, 45).unwrap()
    }

    #[test]
    fn full_iso_string_is_stable() {
        let now = reference_now();
        let input = "2025-06-01T08:15:30+00:00";
        let normalized = normalize_published(None, input, now);
        assert_eq!(normalized, "2025-06-01T08:15:30+00:00");
        // Normalizing an already-normalized string yields itself.
        assert_eq!(normalize_published(None, &normalized, now), normalized);
    }

    #[test]
    fn missing_components_get_sentinel_when_not_today() {
        let now = reference_now();
        // Date-only, a different day from "now": hour/minute/second -> 11.
        let normalized = normalize_published(None, "2025-06-01", now);
        assert_eq!(normalized, "2025-06-01T11:11:11+00:00");
    }

    #[test]
    fn missing_components_propagate_from_now_when_matching() {
        let now = reference_now();
        let normalized = normalize_published(None, "2025-06-15", now);
        assert_eq!(normalized, "2025-06-15T14:30:45+00:00");
    }

    #[test]
    fn cjk_date_separators_parse() {
        let now = reference_now();
        let normalized = normalize_published(None, "2025年6月1日10:20", now);
        assert_eq!(normalized, "2025-06-01T10:20:11+00:00");
    }

    #[test]
    fn rfc2822_counts_as_fully_provided() {
        let now = reference_now();
        let normalized = normalize_published(None, "Sun, 01 Jun 2025 08:15:30 +0000", now);
        assert_eq!(normalized, "2025-06-01T08:15:30+00:00");
    }

    #[test]
    fn offset_input_converts_to_utc() {
        let now = reference_now();
        let normalized = normalize_published(None, "2025-06-01T16:15:30+08:00", now);
        assert_eq!(normalized, "2025-06-01T08:15:30+00:00");
    }

    #[test]
    fn garbage_yields_empty() {
        assert_eq!(normalize_published(None, "October sometime", reference_now()), "");
        assert_eq!(normalize_published(None, "", reference_now()), "");
    }

    #[test]
    fn try_parse_dt_accepts_fallback_formats() {
        assert!(try_parse_dt("2025-06-01 08:15").is_some());
        assert!(try_parse_dt("2025/06/01").is_some());
        assert!(try_parse_dt("2025-06-01T08:15:30Z").is_some());
        assert!(try_parse_dt("not a date").is_none());
    }

    #[test]
    fn try_parse_dt_accepts_relative_forms() {
        let two_days = try_parse_dt("2 days ago").unwrap();
        let delta = Utc::now() - two_days;
        assert!((delta.num_hours() - 48).abs() <= 1);
        assert!(try_parse_dt("yesterday").is_some());
    }

    #[test]
    fn offset_aliases() {
        assert_eq!(offset_for("Asia/Shanghai").local_minus_utc(), 8 * 3600);
        assert_eq!(offset_for("UTC").local_minus_utc(), 0);
        assert_eq!(offset_for("+09:00").local_minus_utc(), 9 * 3600);
        assert_eq!(offset_for(""), offset_for("Asia/Shanghai"));
    }
}
