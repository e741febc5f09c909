//! Time series generation.
//!
//! Produces the full, ordered list of bucket starts between two timestamps,
//! used to fill gaps in pivoted results.
//!
//! Standard granularities step one calendar unit at a time from the unit
//! start of the range. Custom granularities step by their interval from the
//! latest anchor point not after the range start, where the anchor is the
//! granularity's `origin`, or the Unix epoch shifted by `offset`.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::datetime::{add_units, end_of, format_timestamp, parse_timestamp, start_of};
use super::granularity::{Granularity, TimeUnit};
use super::interval::Interval;
use crate::config::TimeSeriesSettings;
use crate::error::{ReshapeError, ReshapeResult};

/// Definition of a custom granularity as reported by the data model.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CustomGranularity {
    pub interval: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,
}

impl CustomGranularity {
    pub fn new(interval: impl Into<String>) -> Self {
        Self {
            interval: interval.into(),
            ..Default::default()
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_offset(mut self, offset: impl Into<String>) -> Self {
        self.offset = Some(offset.into());
        self
    }

    /// The point series are aligned to.
    pub fn anchor(&self) -> ReshapeResult<NaiveDateTime> {
        let origin = match &self.origin {
            Some(text) => parse_timestamp(text)
                .ok_or_else(|| ReshapeError::InvalidTimestamp(text.clone()))?,
            None => DateTime::<Utc>::from_timestamp(0, 0)
                .map(|epoch| epoch.naive_utc())
                .ok_or_else(|| ReshapeError::InvalidTimestamp("1970-01-01".to_string()))?,
        };
        match &self.offset {
            Some(offset) => Interval::parse(offset)?
                .add_to(origin)
                .ok_or_else(|| ReshapeError::InvalidInterval(offset.clone())),
            None => Ok(origin),
        }
    }
}

/// Generates bucket series with a point ceiling.
#[derive(Debug, Clone)]
pub struct TimeSeriesGenerator {
    max_points: u64,
    every_nth: usize,
}

impl Default for TimeSeriesGenerator {
    fn default() -> Self {
        Self::new(&TimeSeriesSettings::default())
    }
}

impl TimeSeriesGenerator {
    pub fn new(settings: &TimeSeriesSettings) -> Self {
        Self {
            max_points: settings.max_points,
            every_nth: 1,
        }
    }

    /// Keep only every n-th bucket (the first bucket is always kept).
    pub fn with_every_nth(mut self, n: usize) -> Self {
        self.every_nth = n.max(1);
        self
    }

    /// Generate the series for a granularity over `[start, end]`.
    ///
    /// With `pad_to_day` the range is widened to whole days first. Custom
    /// granularities need their definition.
    pub fn generate(
        &self,
        granularity: &Granularity,
        range: &[String; 2],
        pad_to_day: bool,
        custom: Option<&CustomGranularity>,
    ) -> ReshapeResult<Vec<String>> {
        let start = parse_bound(&range[0])?;
        let end = parse_bound(&range[1])?;

        let series = match (granularity, custom) {
            (Granularity::Standard(unit), _) => {
                let (start, end) = if pad_to_day {
                    (start_of(start, TimeUnit::Day), end_of(end, TimeUnit::Day))
                } else {
                    (start, end)
                };
                self.standard(*unit, start, end, range)?
            }
            (Granularity::Custom(_), Some(definition)) => {
                self.custom(definition, start, end, range)?
            }
            (Granularity::Custom(name), None) => {
                return Err(ReshapeError::UnsupportedGranularity(name.clone()))
            }
        };

        debug!(
            granularity = %granularity,
            points = series.len(),
            "Generated time series"
        );
        Ok(series)
    }

    fn standard(
        &self,
        unit: TimeUnit,
        start: NaiveDateTime,
        end: NaiveDateTime,
        range: &[String; 2],
    ) -> ReshapeResult<Vec<String>> {
        self.check_limit(&Interval::of(unit, 1), start, end, range)?;

        let mut points = Vec::new();
        let mut cursor = start_of(start, unit);
        while cursor <= end {
            points.push(format_timestamp(&cursor));
            cursor = match add_units(cursor, unit, 1) {
                Some(next) => next,
                None => break,
            };
        }
        Ok(self.thin(points))
    }

    fn custom(
        &self,
        definition: &CustomGranularity,
        start: NaiveDateTime,
        end: NaiveDateTime,
        range: &[String; 2],
    ) -> ReshapeResult<Vec<String>> {
        let interval = Interval::parse(&definition.interval)?;
        if interval.approx_seconds() <= 0 {
            return Err(ReshapeError::InvalidInterval(definition.interval.clone()));
        }
        self.check_limit(&interval, start, end, range)?;

        let mut points = Vec::new();
        let mut cursor = interval.align_to_origin(start, definition.anchor()?)?;
        let invalid = || ReshapeError::InvalidInterval(definition.interval.clone());
        while cursor <= end {
            points.push(format_timestamp(&cursor));
            // Mixed-sign intervals can land on or before the previous point
            let next = interval.add_to(cursor).ok_or_else(invalid)?;
            if next <= cursor {
                return Err(invalid());
            }
            cursor = next;
        }
        Ok(self.thin(points))
    }

    fn check_limit(
        &self,
        interval: &Interval,
        start: NaiveDateTime,
        end: NaiveDateTime,
        range: &[String; 2],
    ) -> ReshapeResult<()> {
        let step = interval.approx_seconds().max(1);
        let count = (end - start).num_seconds().max(0) / step;
        if count as u64 > self.max_points {
            return Err(ReshapeError::TooManyPoints {
                count: count as u64,
                start: range[0].clone(),
                end: range[1].clone(),
                interval: interval.to_string(),
                limit: self.max_points,
            });
        }
        Ok(())
    }

    fn thin(&self, points: Vec<String>) -> Vec<String> {
        if self.every_nth == 1 {
            return points;
        }
        points.into_iter().step_by(self.every_nth).collect()
    }
}

fn parse_bound(text: &str) -> ReshapeResult<NaiveDateTime> {
    parse_timestamp(text).ok_or_else(|| ReshapeError::InvalidTimestamp(text.to_string()))
}
