//! Drill-down query construction.
//!
//! Clicking a pivot cell yields the query listing the rows behind it: the
//! clicked measure's drill members, filtered to the cell's dimension values
//! and narrowed to the cell's time bucket.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::pivot_config::{PivotConfigInput, MEASURES_KEY};
use super::result_set::ResultSet;
use crate::error::{ReshapeError, ReshapeResult};
use crate::query::{Filter, FilterOperator, MemberFilter, MemberPath, QueryType, TimeDimension};
use crate::time::datetime::{end_of, start_of};
use crate::time::{format_timestamp, parse_timestamp, Granularity, Interval};

/// The clicked cell, as `x` and `y` axis values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DrillDownLocator {
    pub x_values: Vec<Value>,
    pub y_values: Vec<Value>,
}

impl DrillDownLocator {
    pub fn x(values: Vec<Value>) -> Self {
        Self {
            x_values: values,
            y_values: Vec::new(),
        }
    }

    pub fn with_y_values(mut self, values: Vec<Value>) -> Self {
        self.y_values = values;
        self
    }
}

/// A query selecting the rows behind a cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrillDownQuery {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub measures: Vec<String>,
    pub dimensions: Vec<String>,
    pub filters: Vec<Filter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<String>,
    pub time_dimensions: Vec<TimeDimension>,
    pub timezone: String,
}

impl ResultSet {
    /// Build the drill-down query for a cell.
    ///
    /// Returns `None` when the clicked measure declares no drill members.
    pub fn drill_down(
        &self,
        locator: &DrillDownLocator,
        input: Option<&PivotConfigInput>,
    ) -> ReshapeResult<Option<DrillDownQuery>> {
        match self.query_type() {
            QueryType::CompareDateRange => {
                return Err(ReshapeError::UnsupportedDrillDown("compareDateRange".into()))
            }
            QueryType::Blending => {
                return Err(ReshapeError::UnsupportedDrillDown("Data blending".into()))
            }
            QueryType::Regular => {}
        }

        let result = self.result(0)?;
        let query = &result.query;
        let config = self.normalize_pivot_config(input);

        let at = |values: &[Value], i: usize| values.get(i).cloned().unwrap_or(Value::Null);
        let cell: Vec<(&str, Value)> = config
            .x
            .iter()
            .enumerate()
            .map(|(i, m)| (m.as_str(), at(&locator.x_values, i)))
            .chain(
                config
                    .y
                    .iter()
                    .enumerate()
                    .map(|(i, m)| (m.as_str(), at(&locator.y_values, i))),
            )
            .collect();

        let clicked = cell
            .iter()
            .find(|(member, _)| *member == MEASURES_KEY)
            .and_then(|(_, value)| value.as_str())
            .map(str::to_string)
            .or_else(|| result.annotation.measures.keys().next().cloned());
        let Some(measure) = clicked else {
            return Ok(None);
        };
        let Some(annotation) = result.annotation.measures.get(&measure) else {
            return Ok(None);
        };
        if annotation.drill_members.is_empty() {
            return Ok(None);
        }

        let mut filters: Vec<Filter> =
            vec![MemberFilter::new(measure.clone(), FilterOperator::MeasureFilter).into()];
        filters.extend(query.filters.iter().cloned());

        let mut time_dimensions = Vec::new();
        for (member, value) in cell.into_iter().filter(|(m, _)| *m != MEASURES_KEY) {
            match MemberPath::parse(member) {
                Some(path) if path.granularity.is_some() => {
                    let granularity = Granularity::parse(path.granularity.as_deref().unwrap_or_default());
                    let [start, end] = self.bucket(member, &granularity, &value)?;
                    let parent = query
                        .time_dimensions
                        .iter()
                        .find(|td| td.member().as_deref() == Some(member))
                        .or_else(|| query.time_dimensions.iter().find(|td| td.dimension == path.member()));
                    let (start, end) = match parent.and_then(|td| td.date_range.as_ref()) {
                        Some([lo, hi]) => (
                            parse_timestamp(lo).map_or(start, |lo| lo.max(start)),
                            parse_timestamp(hi).map_or(end, |hi| hi.min(end)),
                        ),
                        None => (start, end),
                    };
                    time_dimensions.push(TimeDimension {
                        dimension: path.member(),
                        granularity: None,
                        date_range: Some([format_timestamp(&start), format_timestamp(&end)]),
                    });
                }
                _ if value.is_null() => {
                    filters.push(MemberFilter::new(member, FilterOperator::NotSet).into());
                }
                _ => {
                    let text = match value {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    filters.push(
                        MemberFilter::new(member, FilterOperator::Equals)
                            .with_values([text])
                            .into(),
                    );
                }
            }
        }

        if time_dimensions.is_empty() {
            if let Some(td) = query.time_dimensions.first().filter(|td| td.granularity.is_none()) {
                time_dimensions.push(td.clone());
            }
        }

        let (measures, dimensions) = match &annotation.drill_members_grouped {
            Some(grouped) => (grouped.measures.clone(), grouped.dimensions.clone()),
            None => (Vec::new(), annotation.drill_members.clone()),
        };

        Ok(Some(DrillDownQuery {
            measures,
            dimensions,
            filters,
            segments: query.segments.clone(),
            time_dimensions,
            timezone: query.timezone.clone(),
        }))
    }

    /// Start and end of the bucket a time value falls in.
    fn bucket(
        &self,
        member: &str,
        granularity: &Granularity,
        value: &Value,
    ) -> ReshapeResult<[NaiveDateTime; 2]> {
        let text = value.as_str().unwrap_or_default();
        let at = parse_timestamp(text).ok_or_else(|| ReshapeError::InvalidTimestamp(text.to_string()))?;

        match granularity {
            Granularity::Standard(unit) => Ok([start_of(at, *unit), end_of(at, *unit)]),
            Granularity::Custom(name) => {
                let (dimension, _) = member.rsplit_once('.').unwrap_or((member, ""));
                let definition = self
                    .result(0)?
                    .annotation
                    .custom_granularity(member)
                    .ok_or_else(|| ReshapeError::UnknownGranularity {
                        dimension: dimension.to_string(),
                        granularity: name.clone(),
                    })?;
                let next = Interval::parse(&definition.interval)?
                    .add_to(at)
                    .ok_or_else(|| ReshapeError::InvalidInterval(definition.interval.clone()))?;
                Ok([at, next - Duration::milliseconds(1)])
            }
        }
    }
}
