//! Calendar units and time dimension granularities.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A standard calendar unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl TimeUnit {
    /// All units, finest first.
    pub const ALL: [TimeUnit; 8] = [
        TimeUnit::Second,
        TimeUnit::Minute,
        TimeUnit::Hour,
        TimeUnit::Day,
        TimeUnit::Week,
        TimeUnit::Month,
        TimeUnit::Quarter,
        TimeUnit::Year,
    ];

    /// Parse a unit name. Accepts the plural form (`days`).
    pub fn from_str(s: &str) -> Option<Self> {
        let lower = s.to_lowercase();
        let singular = lower.strip_suffix('s').unwrap_or(&lower);
        match singular {
            "second" => Some(TimeUnit::Second),
            "minute" => Some(TimeUnit::Minute),
            "hour" => Some(TimeUnit::Hour),
            "day" => Some(TimeUnit::Day),
            "week" => Some(TimeUnit::Week),
            "month" => Some(TimeUnit::Month),
            "quarter" => Some(TimeUnit::Quarter),
            "year" => Some(TimeUnit::Year),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Second => "second",
            TimeUnit::Minute => "minute",
            TimeUnit::Hour => "hour",
            TimeUnit::Day => "day",
            TimeUnit::Week => "week",
            TimeUnit::Month => "month",
            TimeUnit::Quarter => "quarter",
            TimeUnit::Year => "year",
        }
    }

    /// Whether the unit is finer than a day.
    pub fn is_sub_day(&self) -> bool {
        matches!(self, TimeUnit::Second | TimeUnit::Minute | TimeUnit::Hour)
    }

    /// Approximate length in seconds, used only for point-count estimates.
    pub fn approx_seconds(&self) -> i64 {
        match self {
            TimeUnit::Second => 1,
            TimeUnit::Minute => 60,
            TimeUnit::Hour => 3_600,
            TimeUnit::Day => 86_400,
            TimeUnit::Week => 7 * 86_400,
            TimeUnit::Month => 30 * 86_400,
            TimeUnit::Quarter => 91 * 86_400,
            TimeUnit::Year => 365 * 86_400,
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bucket size of a time dimension.
///
/// Anything that is not a standard unit is a custom granularity whose
/// interval and anchor come from the member's annotation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Granularity {
    Standard(TimeUnit),
    Custom(String),
}

impl Granularity {
    pub fn parse(s: &str) -> Self {
        // Custom names are case-sensitive, standard ones are matched exactly
        match TimeUnit::ALL.iter().find(|u| u.as_str() == s) {
            Some(unit) => Granularity::Standard(*unit),
            None => Granularity::Custom(s.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Granularity::Standard(unit) => unit.as_str(),
            Granularity::Custom(name) => name,
        }
    }

    pub fn unit(&self) -> Option<TimeUnit> {
        match self {
            Granularity::Standard(unit) => Some(*unit),
            Granularity::Custom(_) => None,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Granularity::Custom(_))
    }
}

impl From<TimeUnit> for Granularity {
    fn from(unit: TimeUnit) -> Self {
        Granularity::Standard(unit)
    }
}

impl From<String> for Granularity {
    fn from(s: String) -> Self {
        Granularity::parse(&s)
    }
}

impl From<&str> for Granularity {
    fn from(s: &str) -> Self {
        Granularity::parse(s)
    }
}

impl From<Granularity> for String {
    fn from(g: Granularity) -> Self {
        match g {
            Granularity::Standard(unit) => unit.as_str().to_string(),
            Granularity::Custom(name) => name,
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
