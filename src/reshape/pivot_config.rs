//! Pivot configuration.
//!
//! A pivot configuration decides which members become rows (`x`) and which
//! become columns (`y`). The literal `measures` stands for "one entry per
//! measure" on whichever axis it is placed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::query::{NormalizedQuery, COMPARE_DATE_RANGE_DIMENSION};

/// Axis placeholder expanding to the query's measures.
pub const MEASURES_KEY: &str = "measures";

/// Pivot configuration as callers supply it; unset fields get defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PivotConfigInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_missing_dates: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_date_range: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_with_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_series: Option<Vec<String>>,
}

impl PivotConfigInput {
    pub fn axes<X, Y>(x: X, y: Y) -> Self
    where
        X: IntoIterator,
        X::Item: Into<String>,
        Y: IntoIterator,
        Y::Item: Into<String>,
    {
        Self {
            x: Some(x.into_iter().map(Into::into).collect()),
            y: Some(y.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    pub fn with_fill_missing_dates(mut self, fill: bool) -> Self {
        self.fill_missing_dates = Some(fill);
        self
    }

    pub fn with_join_date_range(mut self, join: bool) -> Self {
        self.join_date_range = Some(join);
        self
    }

    pub fn with_fill_with_value(mut self, value: Value) -> Self {
        self.fill_with_value = Some(value);
        self
    }

    pub fn with_alias_series<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alias_series = Some(aliases.into_iter().map(Into::into).collect());
        self
    }
}

/// A fully resolved pivot configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotConfig {
    pub x: Vec<String>,
    pub y: Vec<String>,
    pub fill_missing_dates: bool,
    pub join_date_range: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_with_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alias_series: Vec<String>,
}

impl PivotConfig {
    pub fn measures_on_x(&self) -> bool {
        self.x.iter().any(|k| k == MEASURES_KEY)
    }

    pub fn has_measures(&self) -> bool {
        self.measures_on_x() || self.y.iter().any(|k| k == MEASURES_KEY)
    }
}

impl From<&PivotConfig> for PivotConfigInput {
    fn from(config: &PivotConfig) -> Self {
        Self {
            x: Some(config.x.clone()),
            y: Some(config.y.clone()),
            fill_missing_dates: Some(config.fill_missing_dates),
            join_date_range: Some(config.join_date_range),
            fill_with_value: config.fill_with_value.clone(),
            alias_series: Some(config.alias_series.clone()),
        }
    }
}

/// Resolve a pivot configuration against the query it renders.
///
/// Without a configuration, granular time dimensions go on `x` and plain
/// dimensions on `y` (or dimensions on `x` when there is no granular time
/// dimension). Members named by their base time dimension are rewritten to
/// their `member.granularity` key. Dimensions missing from both axes are
/// appended to `x`, `measures` is appended to `y` when absent, and members
/// the query does not select are dropped.
pub fn normalize_pivot_config(
    query: &NormalizedQuery,
    input: Option<&PivotConfigInput>,
) -> PivotConfig {
    let granular: Vec<_> = query.granular_time_dimensions().collect();
    let granular_members: Vec<String> = granular.iter().filter_map(|td| td.member()).collect();
    let dimensions = &query.dimensions;

    let (x, y) = match input {
        Some(input) => (
            input.x.clone().unwrap_or_default(),
            input.y.clone().unwrap_or_default(),
        ),
        None if !granular_members.is_empty() => (granular_members.clone(), dimensions.clone()),
        None => (dimensions.clone(), Vec::new()),
    };

    let substitute = |axis: Vec<String>| -> Vec<String> {
        axis.into_iter()
            .map(|key| {
                match granular.iter().find(|td| td.dimension == key) {
                    Some(td) if !dimensions.contains(&key) => td.member().unwrap_or(key),
                    _ => key,
                }
            })
            .collect()
    };
    let mut x = substitute(x);
    let mut y = substitute(y);

    let all_dimensions: Vec<&String> = granular_members.iter().chain(dimensions).collect();
    let is_known = |key: &String| all_dimensions.contains(&key) || key == MEASURES_KEY;

    let missing: Vec<String> = all_dimensions
        .iter()
        .filter(|d| !x.contains(d) && !y.contains(d) && d.as_str() != COMPARE_DATE_RANGE_DIMENSION)
        .map(|d| d.to_string())
        .collect();
    x.extend(missing);
    x.retain(|k| is_known(k));
    y.retain(|k| is_known(k));

    if !x.iter().chain(&y).any(|k| k == MEASURES_KEY) {
        y.push(MEASURES_KEY.to_string());
    }

    let compare = COMPARE_DATE_RANGE_DIMENSION.to_string();
    if dimensions.contains(&compare) && !x.contains(&compare) && !y.contains(&compare) {
        y.insert(0, compare);
    }

    if query.measures.is_empty() {
        x.retain(|k| k != MEASURES_KEY);
        y.retain(|k| k != MEASURES_KEY);
    }

    // Only a lone, ranged time dimension that is all of `x` is filled by default
    let fill_default =
        granular.len() == 1 && granular[0].date_range.is_some() && x == granular_members;

    PivotConfig {
        x,
        y,
        fill_missing_dates: input
            .and_then(|i| i.fill_missing_dates)
            .unwrap_or(fill_default),
        join_date_range: input.and_then(|i| i.join_date_range).unwrap_or(false),
        fill_with_value: input.and_then(|i| i.fill_with_value.clone()),
        alias_series: input
            .and_then(|i| i.alias_series.clone())
            .unwrap_or_default(),
    }
}
