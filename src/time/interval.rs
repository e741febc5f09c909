//! SQL-like intervals (`"2 months 3 weeks"`, `"-1 year 10 hours"`).
//!
//! Calendar parts (years, quarters, months) are applied first with
//! end-of-month clamping, then days and weeks, then clock parts.

use std::fmt;

use chrono::{Duration, NaiveDateTime};

use super::datetime::add_months;
use super::granularity::TimeUnit;
use crate::error::{ReshapeError, ReshapeResult};

/// A parsed interval. Quarters are folded into months.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Interval {
    pub years: i64,
    pub months: i64,
    pub weeks: i64,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl Interval {
    /// Parse `"<n> <unit> [<n> <unit> ...]"`. Units may be plural.
    pub fn parse(text: &str) -> ReshapeResult<Self> {
        let parts: Vec<&str> = text.split_whitespace().collect();
        if parts.is_empty() || parts.len() % 2 != 0 {
            return Err(ReshapeError::InvalidInterval(text.to_string()));
        }

        let mut interval = Interval::default();
        for pair in parts.chunks(2) {
            let value: i64 = pair[0]
                .parse()
                .map_err(|_| ReshapeError::InvalidInterval(text.to_string()))?;
            let unit = TimeUnit::from_str(pair[1])
                .ok_or_else(|| ReshapeError::InvalidInterval(text.to_string()))?;
            interval.set(unit, value);
        }
        Ok(interval)
    }

    /// One unit as an interval.
    pub fn of(unit: TimeUnit, n: i64) -> Self {
        let mut interval = Interval::default();
        interval.set(unit, n);
        interval
    }

    fn set(&mut self, unit: TimeUnit, value: i64) {
        match unit {
            TimeUnit::Year => self.years = value,
            TimeUnit::Quarter => self.months = value * 3,
            TimeUnit::Month => self.months = value,
            TimeUnit::Week => self.weeks = value,
            TimeUnit::Day => self.days = value,
            TimeUnit::Hour => self.hours = value,
            TimeUnit::Minute => self.minutes = value,
            TimeUnit::Second => self.seconds = value,
        }
    }

    pub fn negate(&self) -> Self {
        Interval {
            years: -self.years,
            months: -self.months,
            weeks: -self.weeks,
            days: -self.days,
            hours: -self.hours,
            minutes: -self.minutes,
            seconds: -self.seconds,
        }
    }

    fn total_months(&self) -> i64 {
        self.years * 12 + self.months
    }

    /// Fixed-length part in seconds (weeks and below).
    fn fixed_seconds(&self) -> i64 {
        ((self.weeks * 7 + self.days) * 24 + self.hours) * 3_600 + self.minutes * 60 + self.seconds
    }

    /// Rough length in seconds; months count as 30 days, years as 365.
    pub fn approx_seconds(&self) -> i64 {
        self.years * TimeUnit::Year.approx_seconds()
            + self.months * TimeUnit::Month.approx_seconds()
            + self.fixed_seconds()
    }

    pub fn add_to(&self, dt: NaiveDateTime) -> Option<NaiveDateTime> {
        let shifted = match self.total_months() {
            0 => dt,
            months => add_months(dt, months)?,
        };
        shifted.checked_add_signed(Duration::try_seconds(self.fixed_seconds())?)
    }

    pub fn sub_from(&self, dt: NaiveDateTime) -> Option<NaiveDateTime> {
        self.negate().add_to(dt)
    }

    /// The latest point `origin + k * interval` that is not after `start`.
    ///
    /// Stepping is done one interval at a time so month clamping matches
    /// what repeated addition produces. Intervals with no calendar part
    /// jump straight to the neighbourhood of `start` first.
    pub fn align_to_origin(
        &self,
        start: NaiveDateTime,
        origin: NaiveDateTime,
    ) -> ReshapeResult<NaiveDateTime> {
        let step = self.approx_seconds();
        if step == 0 {
            return Err(ReshapeError::InvalidInterval(self.to_string()));
        }
        let forward = step > 0;
        let invalid = || ReshapeError::InvalidInterval(self.to_string());

        let mut offset = origin;
        if self.total_months() == 0 {
            let gap = (start - origin).num_seconds();
            let jumps = gap / self.fixed_seconds();
            if jumps.abs() > 1 {
                let near = jumps - jumps.signum();
                offset = origin
                    .checked_add_signed(
                        Duration::try_seconds(near * self.fixed_seconds()).ok_or_else(invalid)?,
                    )
                    .ok_or_else(invalid)?;
            }
        }

        let (ahead, behind) = if forward {
            (*self, self.negate())
        } else {
            (self.negate(), *self)
        };

        if start < offset {
            while offset > start {
                let next = behind.add_to(offset).ok_or_else(invalid)?;
                if next >= offset {
                    return Err(invalid());
                }
                offset = next;
            }
            return Ok(offset);
        }

        let mut aligned = start;
        while offset < start {
            aligned = offset;
            let next = ahead.add_to(offset).ok_or_else(invalid)?;
            if next <= offset {
                return Err(invalid());
            }
            offset = next;
        }
        if offset == start {
            aligned = offset;
        }
        Ok(aligned)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = [
            (self.years, "year"),
            (self.months, "month"),
            (self.weeks, "week"),
            (self.days, "day"),
            (self.hours, "hour"),
            (self.minutes, "minute"),
            (self.seconds, "second"),
        ];
        let rendered: Vec<String> = parts
            .iter()
            .filter(|(value, _)| *value != 0)
            .map(|(value, unit)| {
                if value.abs() == 1 {
                    format!("{} {}", value, unit)
                } else {
                    format!("{} {}s", value, unit)
                }
            })
            .collect();
        if rendered.is_empty() {
            f.write_str("0 seconds")
        } else {
            f.write_str(&rendered.join(" "))
        }
    }
}
