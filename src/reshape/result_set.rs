//! Result sets and pivoting.
//!
//! A [`ResultSet`] holds the annotated results of every query a request was
//! split into, plus the pivot query describing how to render them as one.
//!
//! ```text
//!   result 0 rows ──▶ pivot(0) ──┐
//!   result 1 rows ──▶ pivot(1) ──┼──▶ merge ──▶ PivotRow[]
//!   result N rows ──▶ pivot(N) ──┘
//! ```
//!
//! Each per-result pivot groups rows by their `x` values in input order. When
//! the only `x` member is the granular time dimension and missing dates are
//! filled, the groups are instead laid over the generated time series.

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use tracing::debug;

use super::annotation::{MemberType, QueryAnnotations};
use super::pivot_config::{normalize_pivot_config, PivotConfig, PivotConfigInput, MEASURES_KEY};
use super::transform::{ResultData, Row};
use crate::error::{ReshapeError, ReshapeResult};
use crate::query::{NormalizedQuery, PivotQuery, QueryType, TimeDimension};
use crate::time::{
    format_timestamp, is_date_only, parse_timestamp, Granularity, TimeSeriesGenerator,
};

// ============================================================================
// Response types
// ============================================================================

/// The annotated result of one executed query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadResult {
    pub query: NormalizedQuery,
    pub data: ResultData,
    pub annotation: QueryAnnotations,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_refresh_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_pre_aggregations: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

impl LoadResult {
    pub fn new(query: NormalizedQuery, rows: Vec<Row>, annotation: QueryAnnotations) -> Self {
        Self {
            query,
            data: ResultData::Rows(rows),
            annotation,
            last_refresh_time: None,
            used_pre_aggregations: None,
            total: None,
        }
    }
}

/// Every result of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadResponse {
    pub query_type: QueryType,
    pub results: Vec<LoadResult>,
    pub pivot_query: PivotQuery,
}

/// Storable form of a [`ResultSet`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedResult {
    pub load_response: LoadResponse,
}

/// One pivoted row: the `x` values and one value per `y` key path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotRow {
    pub x_values: Vec<Value>,
    pub y_values_array: Vec<(Vec<Value>, Value)>,
}

// ============================================================================
// Axis value helpers
// ============================================================================

/// Display form of an axis value (`∅` for null).
pub(crate) fn axis_value_string(value: &Value) -> String {
    match value {
        Value::Null => "∅".to_string(),
        Value::String(s) if s.is_empty() => "[Empty string]".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn axis_values_string(values: &[Value], delimiter: &str) -> String {
    values
        .iter()
        .map(axis_value_string)
        .collect::<Vec<_>>()
        .join(delimiter)
}

/// Plain join where null is empty, used for flat column keys.
pub(crate) fn join_values(values: &[Value], delimiter: &str) -> String {
    values
        .iter()
        .map(|v| match v {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(delimiter)
}

/// The measure an axis tuple ends with.
pub(crate) fn measure_from_axis(values: &[Value]) -> Option<&str> {
    values.last().and_then(Value::as_str)
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(_) => true,
    }
}

// ============================================================================
// ResultSet
// ============================================================================

/// Annotated results of a request, ready to be reshaped.
#[derive(Debug, Clone)]
pub struct ResultSet {
    response: LoadResponse,
    /// Per result: rows with `member.granularity` keys filled in.
    data: Vec<Vec<Row>>,
    generator: TimeSeriesGenerator,
}

impl ResultSet {
    pub fn new(response: LoadResponse) -> Self {
        let data = response.results.iter().map(backward_compatible_rows).collect();
        Self {
            response,
            data,
            generator: TimeSeriesGenerator::default(),
        }
    }

    /// A regular result set around a single result.
    pub fn from_result(result: LoadResult) -> Self {
        Self::new(LoadResponse {
            query_type: QueryType::Regular,
            pivot_query: PivotQuery::regular(result.query.clone()),
            results: vec![result],
        })
    }

    pub fn with_time_series(mut self, generator: TimeSeriesGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn deserialize(serialized: SerializedResult) -> Self {
        Self::new(serialized.load_response)
    }

    pub fn serialize(&self) -> SerializedResult {
        SerializedResult {
            load_response: self.response.clone(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<SerializedResult>(json).map(Self::deserialize)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.serialize())
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn query_type(&self) -> QueryType {
        self.response.query_type
    }

    pub fn load_response(&self) -> &LoadResponse {
        &self.response
    }

    pub fn results(&self) -> &[LoadResult] {
        &self.response.results
    }

    pub fn pivot_query(&self) -> &PivotQuery {
        &self.response.pivot_query
    }

    pub fn result(&self, index: usize) -> ReshapeResult<&LoadResult> {
        self.response
            .results
            .get(index)
            .ok_or(ReshapeError::ResultIndex {
                index,
                len: self.response.results.len(),
            })
    }

    fn require_regular(&self) -> ReshapeResult<&LoadResult> {
        if self.response.query_type != QueryType::Regular {
            return Err(ReshapeError::UnsupportedForQueryType(
                self.response.query_type.to_string(),
            ));
        }
        self.result(0)
    }

    /// The query of a regular result set.
    pub fn query(&self) -> ReshapeResult<&NormalizedQuery> {
        self.require_regular().map(|r| &r.query)
    }

    /// The rows of a regular result set, as returned by the gateway.
    pub fn raw_data(&self) -> ReshapeResult<Vec<Row>> {
        self.require_regular().map(|r| r.data.to_rows())
    }

    pub fn annotation(&self) -> ReshapeResult<&QueryAnnotations> {
        self.require_regular().map(|r| &r.annotation)
    }

    pub fn total_rows(&self) -> Option<u64> {
        self.response.results.first().and_then(|r| r.total)
    }

    pub(crate) fn rows(&self, index: usize) -> &[Row] {
        self.data.get(index).map(Vec::as_slice).unwrap_or_default()
    }

    /// Split into one regular result set per result.
    pub fn decompose(&self) -> Vec<ResultSet> {
        self.response
            .results
            .iter()
            .map(|result| {
                ResultSet::from_result(result.clone()).with_time_series(self.generator.clone())
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Pivoting
    // ------------------------------------------------------------------------

    /// Resolve a pivot configuration against this result's pivot query.
    pub fn normalize_pivot_config(&self, input: Option<&PivotConfigInput>) -> PivotConfig {
        let mut config = normalize_pivot_config(&self.response.pivot_query, input);

        let explicit_join = input.and_then(|i| i.join_date_range).is_some();
        if !explicit_join && self.response.query_type == QueryType::Blending {
            let ranges: IndexSet<Option<&[String; 2]>> = self
                .response
                .results
                .iter()
                .map(|r| r.query.time_dimensions.first().and_then(|td| td.date_range.as_ref()))
                .collect();
            config.join_date_range = ranges.len() > 1;
        }
        config
    }

    /// Time series of a time dimension in one result.
    ///
    /// Returns `None` when the time dimension has no granularity, or has no
    /// date range and the result has no time values to derive one from.
    pub fn time_series(
        &self,
        td: &TimeDimension,
        result_index: usize,
    ) -> ReshapeResult<Option<Vec<String>>> {
        let (Some(granularity), Some(member)) = (&td.granularity, td.member()) else {
            return Ok(None);
        };

        let range = match &td.date_range {
            Some(range) => range.clone(),
            None => match self.data_range(&member, result_index) {
                Some(range) => range,
                None => return Ok(None),
            },
        };

        let pad_to_day = match &td.date_range {
            Some(range) => range.iter().any(|d| is_date_only(d)),
            None => granularity.unit().map_or(true, |u| !u.is_sub_day()),
        };

        let series = match granularity {
            Granularity::Standard(_) => self.generator.generate(granularity, &range, pad_to_day, None)?,
            Granularity::Custom(name) => {
                let definition = self
                    .result(result_index)?
                    .annotation
                    .custom_granularity(&member)
                    .ok_or_else(|| ReshapeError::UnknownGranularity {
                        dimension: td.dimension.clone(),
                        granularity: name.clone(),
                    })?;
                self.generator
                    .generate(granularity, &range, false, Some(&definition))?
            }
        };
        Ok(Some(series))
    }

    /// Earliest and latest values of `member` in a result.
    fn data_range(&self, member: &str, result_index: usize) -> Option<[String; 2]> {
        let mut times = self
            .rows(result_index)
            .iter()
            .filter_map(|row| row.get(member).and_then(Value::as_str))
            .filter_map(parse_timestamp);
        let first = times.next()?;
        let (min, max) = times.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
        Some([format_timestamp(&min), format_timestamp(&max)])
    }

    fn result_series(&self, result_index: usize) -> ReshapeResult<Option<Vec<String>>> {
        match self
            .result(result_index)?
            .query
            .time_dimensions
            .first()
        {
            Some(td) => self.time_series(td, result_index),
            None => Ok(None),
        }
    }

    /// Axis tuples of a row: one per measure when `measures` is on the axis.
    pub(crate) fn axis_values(&self, axis: &[String], result_index: usize, row: &Row) -> Vec<Vec<Value>> {
        let values: Vec<Value> = axis
            .iter()
            .filter(|k| k.as_str() != MEASURES_KEY)
            .map(|k| row.get(k).cloned().unwrap_or(Value::Null))
            .collect();

        let measures = self
            .response
            .results
            .get(result_index)
            .map(|r| r.query.measures.as_slice())
            .unwrap_or_default();

        if axis.iter().any(|k| k == MEASURES_KEY) && !measures.is_empty() {
            measures
                .iter()
                .map(|m| {
                    let mut tuple = values.clone();
                    tuple.push(Value::String(m.clone()));
                    tuple
                })
                .collect()
        } else {
            vec![values]
        }
    }

    /// Pivot every result into rows of `x` values and `y` cells.
    pub fn pivot(&self, input: Option<&PivotConfigInput>) -> ReshapeResult<Vec<PivotRow>> {
        let config = self.normalize_pivot_config(input);
        self.pivot_with(&config)
    }

    pub(crate) fn pivot_with(&self, config: &PivotConfig) -> ReshapeResult<Vec<PivotRow>> {
        let rows = match self.response.results.len() {
            0 => Vec::new(),
            1 => self.pivot_result(config, 0)?,
            n => {
                let pivots = (0..n)
                    .map(|i| self.pivot_result(config, i))
                    .collect::<ReshapeResult<Vec<_>>>()?;
                merge_pivots(&pivots, config.join_date_range)
            }
        };
        debug!(
            query_type = %self.response.query_type,
            rows = rows.len(),
            "Pivoted result"
        );
        Ok(rows)
    }

    fn pivot_result(&self, config: &PivotConfig, result_index: usize) -> ReshapeResult<Vec<PivotRow>> {
        let empty = Row::new();
        let entries: Vec<(Vec<Value>, &Row)> = self
            .rows(result_index)
            .iter()
            .flat_map(|row| {
                self.axis_values(&config.x, result_index, row)
                    .into_iter()
                    .map(move |x| (x, row))
            })
            .collect();

        let groups = match self.filled_series(config, result_index)? {
            Some(series) => {
                let mut by_date: HashMap<String, Vec<&(Vec<Value>, &Row)>> = HashMap::new();
                for entry in &entries {
                    let key = entry.0.first().map(axis_value_string).unwrap_or_default();
                    by_date.entry(key).or_default().push(entry);
                }
                series
                    .into_iter()
                    .map(|date| match by_date.get(&date) {
                        Some(found) => {
                            let x = found[0].0.clone();
                            (x, found.iter().map(|e| e.1).collect::<Vec<_>>())
                        }
                        None => (vec![Value::String(date)], vec![&empty]),
                    })
                    .collect::<Vec<_>>()
            }
            None => {
                let mut grouped: IndexMap<String, (Vec<Value>, Vec<&Row>)> = IndexMap::new();
                for (x, row) in &entries {
                    grouped
                        .entry(axis_values_string(x, ", "))
                        .or_insert_with(|| (x.clone(), Vec::new()))
                        .1
                        .push(*row);
                }
                grouped.into_values().collect()
            }
        };

        // Every y tuple seen in any non-empty row, in first-seen order
        let mut all_y: IndexMap<String, Vec<Value>> = IndexMap::new();
        for (_, rows) in &groups {
            for row in rows.iter().filter(|r| !r.is_empty()) {
                for y in self.axis_values(&config.y, result_index, row) {
                    all_y.entry(join_values(&y, ",")).or_insert(y);
                }
            }
        }

        let annotation = &self.result(result_index)?.annotation;
        let measure_on_x = config.measures_on_x();
        Ok(groups
            .into_iter()
            .map(|(x_values, rows)| {
                let mut by_y: HashMap<String, &Row> = HashMap::new();
                for row in rows {
                    for y in self.axis_values(&config.y, result_index, row) {
                        by_y.insert(axis_values_string(&y, ", "), row);
                    }
                }
                let y_values_array = all_y
                    .values()
                    .map(|y| {
                        let measure = if measure_on_x {
                            measure_from_axis(&x_values)
                        } else {
                            measure_from_axis(y)
                        };
                        let row = by_y.get(&axis_values_string(y, ", ")).copied();
                        let member_type = measure
                            .and_then(|m| annotation.measures.get(m))
                            .map(|a| a.member_type);
                        (y.clone(), measure_value(row, measure, member_type, config))
                    })
                    .collect();
                PivotRow {
                    x_values,
                    y_values_array,
                }
            })
            .collect())
    }

    /// The series to lay groups over, when missing dates are filled.
    fn filled_series(
        &self,
        config: &PivotConfig,
        result_index: usize,
    ) -> ReshapeResult<Option<Vec<String>>> {
        if !config.fill_missing_dates || config.x.len() != 1 {
            return Ok(None);
        }
        if config.x != self.response.pivot_query.time_dimension_members() {
            return Ok(None);
        }
        // The first result decides whether a series applies at all
        let Some(first) = self.result_series(0)? else {
            return Ok(None);
        };
        if result_index == 0 {
            Ok(Some(first))
        } else {
            self.result_series(result_index)
        }
    }
}

/// A measure cell: missing and empty values take the fill value, numeric
/// strings become numbers unless the measure is annotated otherwise.
fn measure_value(
    row: Option<&Row>,
    measure: Option<&str>,
    member_type: Option<MemberType>,
    config: &PivotConfig,
) -> Value {
    let value = row.zip(measure).and_then(|(row, m)| row.get(m));
    match value {
        None | Some(Value::Null) => config.fill_with_value.clone().unwrap_or(Value::from(0)),
        Some(Value::String(s)) if s.is_empty() => {
            config.fill_with_value.clone().unwrap_or(Value::from(0))
        }
        Some(v) => match member_type {
            None | Some(MemberType::Number) => numeric_value(v),
            Some(_) => v.clone(),
        },
    }
}

/// Numeric-looking strings become numbers; anything else passes through.
pub(crate) fn numeric_value(value: &Value) -> Value {
    match value {
        Value::String(s) => {
            if let Ok(n) = s.parse::<i64>() {
                Value::from(n)
            } else if let Some(n) = s.parse::<f64>().ok().and_then(Number::from_f64) {
                Value::Number(n)
            } else {
                value.clone()
            }
        }
        _ => value.clone(),
    }
}

/// Combine per-result pivots position by position.
///
/// The shortest pivot decides the row count. With `join_date_range` the `x`
/// values of all pivots at a position are joined into a single label.
fn merge_pivots(pivots: &[Vec<PivotRow>], join_date_range: bool) -> Vec<PivotRow> {
    let Some(shortest) = pivots.iter().min_by_key(|p| p.len()) else {
        return Vec::new();
    };

    (0..shortest.len())
        .map(|index| {
            let x_values = if join_date_range {
                let joined = pivots
                    .iter()
                    .map(|p| join_values(&p[index].x_values, ","))
                    .collect::<Vec<_>>()
                    .join(", ");
                vec![Value::String(joined)]
            } else {
                shortest[index].x_values.clone()
            };
            PivotRow {
                x_values,
                y_values_array: pivots
                    .iter()
                    .flat_map(|p| p[index].y_values_array.iter().cloned())
                    .collect(),
            }
        })
        .collect()
}

/// Rows with `member.granularity` keys copied from the base time dimension
/// key when the executor only returned the latter.
fn backward_compatible_rows(result: &LoadResult) -> Vec<Row> {
    let granular: Vec<(&str, String)> = result
        .query
        .granular_time_dimensions()
        .filter_map(|td| td.member().map(|m| (td.dimension.as_str(), m)))
        .collect();

    result
        .data
        .to_rows()
        .into_iter()
        .map(|mut row| {
            let extra: Vec<(String, Value)> = row
                .iter()
                .filter_map(|(field, value)| {
                    let (_, member) = granular.iter().find(|(d, _)| *d == field.as_str())?;
                    (!is_truthy(row.get(member))).then(|| (member.clone(), value.clone()))
                })
                .collect();
            row.extend(extra);
            row
        })
        .collect()
}
