//! Wall-clock timestamps.
//!
//! Every timestamp that leaves this crate is a zone-less local time with
//! millisecond precision (`2020-08-01T00:00:00.000`). Inputs are accepted in
//! the handful of shapes data sources and clients actually send.

use std::sync::LazyLock;

use chrono::{
    DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike,
};
use regex::Regex;

use super::granularity::TimeUnit;

/// Output format for all timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

static DATE_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

static HAS_ZONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(Z|[+-]\d{2}:?\d{2})$").unwrap());

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const ZONED_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Format a timestamp as `YYYY-MM-DDTHH:MM:SS.sss`.
pub fn format_timestamp(dt: &NaiveDateTime) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

/// Whether the text is a bare calendar date (`YYYY-MM-DD`).
pub fn is_date_only(s: &str) -> bool {
    DATE_ONLY.is_match(s.trim())
}

/// Parse a timestamp.
///
/// Zoned inputs (`Z`, `+02:00`) are converted to UTC wall-clock time;
/// zone-less inputs are taken as they are.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();

    if DATE_ONLY.is_match(s) {
        return NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .map(|d| d.and_time(NaiveTime::MIN));
    }

    if HAS_ZONE.is_match(s) {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.naive_utc());
        }
        return ZONED_FORMATS
            .iter()
            .find_map(|fmt| DateTime::parse_from_str(s, fmt).ok())
            .map(|dt| dt.naive_utc());
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// Truncate to whole milliseconds.
pub fn truncate_millis(dt: NaiveDateTime) -> NaiveDateTime {
    let nanos = dt.nanosecond() / 1_000_000 * 1_000_000;
    dt.with_nanosecond(nanos).unwrap_or(dt)
}

/// Start of the unit containing `dt`. Weeks start on Monday.
pub fn start_of(dt: NaiveDateTime, unit: TimeUnit) -> NaiveDateTime {
    let date = dt.date();
    match unit {
        TimeUnit::Second => dt.with_nanosecond(0).unwrap_or(dt),
        TimeUnit::Minute => date.and_hms_opt(dt.hour(), dt.minute(), 0).unwrap_or(dt),
        TimeUnit::Hour => date.and_hms_opt(dt.hour(), 0, 0).unwrap_or(dt),
        TimeUnit::Day => date.and_time(NaiveTime::MIN),
        TimeUnit::Week => {
            let back = i64::from(date.weekday().num_days_from_monday());
            (date - Duration::days(back)).and_time(NaiveTime::MIN)
        }
        TimeUnit::Month => first_of_month(date.year(), date.month()).unwrap_or(dt),
        TimeUnit::Quarter => {
            let month = (date.month() - 1) / 3 * 3 + 1;
            first_of_month(date.year(), month).unwrap_or(dt)
        }
        TimeUnit::Year => first_of_month(date.year(), 1).unwrap_or(dt),
    }
}

/// Last millisecond of the unit containing `dt`.
pub fn end_of(dt: NaiveDateTime, unit: TimeUnit) -> NaiveDateTime {
    let start = start_of(dt, unit);
    match add_units(start, unit, 1) {
        Some(next) => next - Duration::milliseconds(1),
        None => start,
    }
}

/// Shift by `n` units. Month arithmetic clamps to the end of the month.
pub fn add_units(dt: NaiveDateTime, unit: TimeUnit, n: i64) -> Option<NaiveDateTime> {
    match unit {
        TimeUnit::Second => dt.checked_add_signed(Duration::try_seconds(n)?),
        TimeUnit::Minute => dt.checked_add_signed(Duration::try_minutes(n)?),
        TimeUnit::Hour => dt.checked_add_signed(Duration::try_hours(n)?),
        TimeUnit::Day => dt.checked_add_signed(Duration::try_days(n)?),
        TimeUnit::Week => dt.checked_add_signed(Duration::try_weeks(n)?),
        TimeUnit::Month => add_months(dt, n),
        TimeUnit::Quarter => add_months(dt, n.checked_mul(3)?),
        TimeUnit::Year => add_months(dt, n.checked_mul(12)?),
    }
}

pub(crate) fn add_months(dt: NaiveDateTime, n: i64) -> Option<NaiveDateTime> {
    let months = Months::new(u32::try_from(n.unsigned_abs()).ok()?);
    if n >= 0 {
        dt.checked_add_months(months)
    } else {
        dt.checked_sub_months(months)
    }
}

fn first_of_month(year: i32, month: u32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, 1).map(|d| d.and_time(NaiveTime::MIN))
}
