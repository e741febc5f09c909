//! Date range resolution.
//!
//! Turns a date expression into a concrete `[start, end]` pair of local
//! wall-clock timestamps:
//!
//! ```text
//!   "last 7 days" ──┐
//!   "this quarter" ─┤   relative units      ┌──────────────────────────┐
//!   "today"        ─┼──────────────────────▶│ snap to unit start / end │──▶ [start, end]
//!   "from A to B"  ─┤   DateExpressionParser└──────────────────────────┘
//!   "2 weeks ago"  ─┘
//! ```
//!
//! Unit phrases (`this/last/next <unit>`, `last/next <n> <unit>`) and the
//! day literals are handled here. Everything else goes through a pluggable
//! [`DateExpressionParser`], so the grammar for free-form phrases can be
//! swapped without touching the alignment rules.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDateTime, Utc, Weekday};
use chrono_tz::Tz;
use regex::Regex;

use super::datetime::{
    add_units, end_of, format_timestamp, parse_timestamp, start_of, truncate_millis,
};
use super::granularity::TimeUnit;
use crate::error::InvalidDateExpression;

const UNITS: &str = "second|minute|hour|day|week|month|quarter|year";

static RELATIVE_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(this|last|next)\s+({UNITS})$")).unwrap()
});

static RELATIVE_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(last|next)\s+(\d+)\s+({UNITS})s?$")).unwrap()
});

static FROM_TO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^from\s+(.+?)\s+to\s+(.+)$").unwrap());

static AGO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(\d+|an?)\s+({UNITS})s?\s+ago$")).unwrap()
});

static AHEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(?:in\s+(\d+|an?)\s+({UNITS})s?|(\d+|an?)\s+({UNITS})s?\s+from\s+now)$"))
        .unwrap()
});

static CLOCK_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:\d+|an?|this|last|next)\s+(second|minute|hour)s?\b").unwrap()
});

static WEEKDAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(this|last|next)\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)$")
        .unwrap()
});

/// What a free-form phrase resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDate {
    pub start: NaiveDateTime,
    /// `None` when the phrase names a single instant.
    pub end: Option<NaiveDateTime>,
}

impl ParsedDate {
    pub fn point(at: NaiveDateTime) -> Self {
        Self { start: at, end: None }
    }

    pub fn range(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }
}

/// Grammar for free-form date phrases.
///
/// `now` is the current wall-clock time in the request timezone. The input
/// is already trimmed and lower-cased. Return `None` for anything the
/// grammar does not understand.
pub trait DateExpressionParser: Send + Sync {
    fn parse(&self, text: &str, now: NaiveDateTime) -> Option<ParsedDate>;
}

/// Built-in grammar: ISO timestamps, `now`, day literals, `N units ago`,
/// `in N units`, `N units from now`, `this/last/next <unit>` and weekday
/// names.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelativeDateParser;

impl DateExpressionParser for RelativeDateParser {
    fn parse(&self, text: &str, now: NaiveDateTime) -> Option<ParsedDate> {
        // Literal timestamps keep their `T`/`Z` markers upper-case
        if let Some(dt) = parse_timestamp(&text.to_uppercase()) {
            return Some(ParsedDate::point(dt));
        }

        let midnight = start_of(now, TimeUnit::Day);
        let day = |n| add_units(midnight, TimeUnit::Day, n).map(ParsedDate::point);
        match text {
            "now" => return Some(ParsedDate::point(now)),
            "today" => return day(0),
            "yesterday" => return day(-1),
            "tomorrow" => return day(1),
            _ => {}
        }

        if let Some(caps) = AGO.captures(text) {
            let n = count(&caps[1])?;
            let unit = TimeUnit::from_str(&caps[2])?;
            return add_units(now, unit, -n).map(ParsedDate::point);
        }

        if let Some(caps) = AHEAD.captures(text) {
            let (n, unit) = match (caps.get(1), caps.get(2)) {
                (Some(n), Some(unit)) => (n.as_str(), unit.as_str()),
                _ => (caps.get(3)?.as_str(), caps.get(4)?.as_str()),
            };
            let unit = TimeUnit::from_str(unit)?;
            return add_units(now, unit, count(n)?).map(ParsedDate::point);
        }

        if let Some(caps) = RELATIVE_UNIT.captures(text) {
            let unit = TimeUnit::from_str(&caps[2])?;
            let anchor = add_units(now, unit, shift(&caps[1]))?;
            return Some(ParsedDate::range(start_of(anchor, unit), end_of(anchor, unit)));
        }

        if let Some(caps) = WEEKDAY.captures(text) {
            let weekday: Weekday = caps[2].parse().ok()?;
            let week_shift = caps.get(1).map(|m| shift(m.as_str())).unwrap_or(0);
            let monday = add_units(start_of(now, TimeUnit::Week), TimeUnit::Week, week_shift)?;
            let day = monday + Duration::days(i64::from(weekday.num_days_from_monday()));
            return Some(ParsedDate::point(day));
        }

        None
    }
}

fn count(text: &str) -> Option<i64> {
    match text {
        "a" | "an" => Some(1),
        n => n.parse().ok(),
    }
}

fn shift(direction: &str) -> i64 {
    match direction {
        "last" => -1,
        "next" => 1,
        _ => 0,
    }
}

/// Finest clock unit counted in the expression, or day.
fn exact_unit(text: &str) -> TimeUnit {
    CLOCK_UNIT
        .captures_iter(text)
        .filter_map(|caps| TimeUnit::from_str(&caps[1]))
        .min_by_key(|unit| unit.approx_seconds())
        .unwrap_or(TimeUnit::Day)
}

/// Resolves date expressions against a grammar.
#[derive(Debug, Clone, Default)]
pub struct DateRangeResolver<P = RelativeDateParser> {
    parser: P,
}

impl DateRangeResolver<RelativeDateParser> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P: DateExpressionParser> DateRangeResolver<P> {
    /// Use a different grammar for free-form phrases.
    pub fn with_parser(parser: P) -> Self {
        Self { parser }
    }

    /// Resolve `expression` in `timezone`, relative to the instant `now`.
    pub fn resolve(
        &self,
        expression: &str,
        timezone: Tz,
        now: DateTime<Utc>,
    ) -> Result<[String; 2], InvalidDateExpression> {
        let local_now = truncate_millis(now.with_timezone(&timezone).naive_local());
        let (start, end) = self.resolve_local(expression, local_now)?;
        Ok([format_timestamp(&start), format_timestamp(&end)])
    }

    fn resolve_local(
        &self,
        expression: &str,
        now: NaiveDateTime,
    ) -> Result<(NaiveDateTime, NaiveDateTime), InvalidDateExpression> {
        let text = expression.trim().to_lowercase();
        let invalid = || InvalidDateExpression::new(expression);

        if let Some(caps) = RELATIVE_UNIT.captures(&text) {
            let unit = TimeUnit::from_str(&caps[2]).ok_or_else(invalid)?;
            let anchor = add_units(now, unit, shift(&caps[1])).ok_or_else(invalid)?;
            return Ok((start_of(anchor, unit), end_of(anchor, unit)));
        }

        if let Some(caps) = RELATIVE_COUNT.captures(&text) {
            let n: i64 = caps[2].parse().map_err(|_| invalid())?;
            if n == 0 {
                return Err(invalid());
            }
            let unit = TimeUnit::from_str(&caps[3]).ok_or_else(invalid)?;
            let (from, to) = if &caps[1] == "last" { (-n, -1) } else { (1, n) };
            let start = add_units(now, unit, from).ok_or_else(invalid)?;
            let end = add_units(now, unit, to).ok_or_else(invalid)?;
            return Ok((start_of(start, unit), end_of(end, unit)));
        }

        let day_shift = match text.as_str() {
            "today" => Some(0),
            "yesterday" => Some(-1),
            "tomorrow" => Some(1),
            _ => None,
        };
        if let Some(days) = day_shift {
            let day = add_units(now, TimeUnit::Day, days).ok_or_else(invalid)?;
            return Ok((start_of(day, TimeUnit::Day), end_of(day, TimeUnit::Day)));
        }

        let unit = exact_unit(&text);

        if let Some(caps) = FROM_TO.captures(&text) {
            let from = self
                .parser
                .parse(caps[1].trim(), now)
                .ok_or_else(|| InvalidDateExpression::new(caps[1].trim()))?;
            let to = self
                .parser
                .parse(caps[2].trim(), now)
                .ok_or_else(|| InvalidDateExpression::new(caps[2].trim()))?;
            return Ok((start_of(from.start, unit), end_of(to.start, unit)));
        }

        let parsed = self.parser.parse(&text, now).ok_or_else(invalid)?;
        let end = parsed.end.unwrap_or(parsed.start);
        Ok((start_of(parsed.start, unit), end_of(end, unit)))
    }
}

/// Resolve with the built-in grammar.
pub fn resolve_date_expression(
    expression: &str,
    timezone: Tz,
    now: DateTime<Utc>,
) -> Result<[String; 2], InvalidDateExpression> {
    DateRangeResolver::new().resolve(expression, timezone, now)
}

/// Resolve a time dimension's `dateRange` value.
///
/// Strings go through the resolver, a one-element list is duplicated, and a
/// two-element list passes through unchanged.
pub fn resolve_date_range_value<P: DateExpressionParser>(
    resolver: &DateRangeResolver<P>,
    value: &DateRangeInput,
    timezone: Tz,
    now: DateTime<Utc>,
) -> Result<[String; 2], InvalidDateExpression> {
    match value {
        DateRangeInput::Expression(text) => resolver.resolve(text, timezone, now),
        DateRangeInput::Single([d]) => Ok([d.clone(), d.clone()]),
        DateRangeInput::Pair(pair) => Ok(pair.clone()),
    }
}

/// Raw `dateRange` as clients send it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum DateRangeInput {
    Expression(String),
    Pair([String; 2]),
    Single([String; 1]),
}
