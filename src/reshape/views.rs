//! Projections of pivoted rows for charts and tables.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::annotation::{Annotation, MemberType, QueryAnnotations};
use super::pivot_config::{PivotConfigInput, MEASURES_KEY};
use super::result_set::{axis_values_string, join_values, measure_from_axis, ResultSet};
use crate::error::ReshapeResult;
use crate::query::QueryType;

/// A chart point: the `x` label plus one value per series key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPivotRow {
    pub x: String,
    pub x_values: Vec<Value>,
    #[serde(flatten)]
    pub values: IndexMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesName {
    pub key: String,
    pub title: String,
    pub short_title: String,
    pub y_values: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub x: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    pub key: String,
    pub title: String,
    pub short_title: String,
    pub series: Vec<SeriesPoint>,
}

/// Column descriptor for [`ResultSet::table_pivot`] rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableColumn {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_index: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_title: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub member_type: Option<MemberType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TableColumn>,
}

impl TableColumn {
    fn member(key: &str, annotation: Option<&Annotation>) -> Self {
        Self {
            key: key.to_string(),
            data_index: Some(key.to_string()),
            title: annotation.map(|a| a.title.clone()),
            short_title: annotation.map(|a| a.short_title.clone()),
            member_type: annotation.map(|a| a.member_type),
            format: annotation.and_then(|a| a.format.clone()),
            meta: annotation.and_then(|a| a.meta.clone()),
            children: Vec::new(),
        }
    }

    fn synthetic(key: &str, title: &str) -> Self {
        Self {
            key: key.to_string(),
            data_index: Some(key.to_string()),
            title: Some(title.to_string()),
            short_title: Some(title.to_string()),
            member_type: Some(MemberType::String),
            format: None,
            meta: None,
            children: Vec::new(),
        }
    }
}

/// Prefix a series key so identical measures of different queries stay apart.
///
/// An explicit alias for the position wins; otherwise a measure that occurs
/// in several blended queries is prefixed with the position.
pub fn alias_series(
    values: &[Value],
    index: usize,
    aliases: &[String],
    duplicate_measures: &HashSet<String>,
) -> Vec<Value> {
    let non_null: Vec<Value> = values.iter().filter(|v| !v.is_null()).cloned().collect();

    if let Some(alias) = aliases.get(index).filter(|a| !a.is_empty()) {
        return std::iter::once(Value::String(alias.clone()))
            .chain(non_null)
            .collect();
    }
    let duplicated = non_null
        .first()
        .and_then(Value::as_str)
        .is_some_and(|m| duplicate_measures.contains(m));
    if duplicated {
        return std::iter::once(Value::from(index)).chain(non_null).collect();
    }
    non_null
}

/// Flat member lookup; segments shadow time dimensions, measures and dimensions.
fn lookup<'a>(annotations: &'a QueryAnnotations, key: &str) -> Option<&'a Annotation> {
    annotations
        .segments
        .get(key)
        .or_else(|| annotations.time_dimensions.get(key))
        .or_else(|| annotations.measures.get(key))
        .or_else(|| annotations.dimensions.get(key))
}

struct Node {
    key: String,
    member: String,
    children: IndexMap<String, Node>,
}

impl ResultSet {
    fn duplicate_measures(&self) -> HashSet<String> {
        if self.query_type() != QueryType::Blending {
            return HashSet::new();
        }
        let mut seen = HashSet::new();
        self.results()
            .iter()
            .flat_map(|r| r.query.measures.iter())
            .filter(|m| !seen.insert(m.as_str()))
            .cloned()
            .collect()
    }

    /// Pivoted rows as flat chart points.
    pub fn chart_pivot(&self, input: Option<&PivotConfigInput>) -> ReshapeResult<Vec<ChartPivotRow>> {
        let config = self.normalize_pivot_config(input);
        let duplicates = self.duplicate_measures();

        Ok(self
            .pivot_with(&config)?
            .into_iter()
            .map(|row| {
                let values = row
                    .y_values_array
                    .iter()
                    .enumerate()
                    .map(|(i, (y, value))| {
                        let key = alias_series(y, i, &config.alias_series, &duplicates);
                        (axis_values_string(&key, ","), value.clone())
                    })
                    .collect();
                ChartPivotRow {
                    x: axis_values_string(&row.x_values, ","),
                    x_values: row.x_values,
                    values,
                }
            })
            .collect())
    }

    /// Pivoted rows as flat table records keyed by column.
    pub fn table_pivot(
        &self,
        input: Option<&PivotConfigInput>,
    ) -> ReshapeResult<Vec<IndexMap<String, Value>>> {
        let default = PivotConfigInput::default();
        let config = self.normalize_pivot_config(Some(input.unwrap_or(&default)));
        let with_measures = config.has_measures();

        Ok(self
            .pivot_with(&config)?
            .into_iter()
            .map(|row| {
                let mut record: IndexMap<String, Value> = config
                    .x
                    .iter()
                    .cloned()
                    .zip(row.x_values.iter().cloned().chain(std::iter::repeat(Value::Null)))
                    .collect();
                if with_measures {
                    for (y, value) in row.y_values_array {
                        let key = if y.is_empty() {
                            "value".to_string()
                        } else {
                            join_values(&y, ",")
                        };
                        record.insert(key, value);
                    }
                }
                record
            })
            .collect())
    }

    /// Column descriptors matching [`ResultSet::table_pivot`].
    ///
    /// Non-measure `y` members become nested column groups, one level per
    /// member.
    pub fn table_columns(&self, input: Option<&PivotConfigInput>) -> ReshapeResult<Vec<TableColumn>> {
        let default = PivotConfigInput::default();
        let config = self.normalize_pivot_config(Some(input.unwrap_or(&default)));

        let mut annotations = QueryAnnotations::default();
        for result in self.results() {
            annotations.merge(&result.annotation);
        }

        let pivot = self.pivot_with(&config)?;

        let mut schema: IndexMap<String, Node> = IndexMap::new();
        if let Some(first) = pivot.first() {
            for (y, _) in &first.y_values_array {
                let mut level = &mut schema;
                for (index, value) in y.iter().enumerate() {
                    let key = join_values(std::slice::from_ref(value), "");
                    let member = match config.y.get(index) {
                        Some(m) if m == MEASURES_KEY => key.clone(),
                        Some(m) => m.clone(),
                        None => key.clone(),
                    };
                    let node = level.entry(key.clone()).or_insert_with(|| Node {
                        key,
                        member: String::new(),
                        children: IndexMap::new(),
                    });
                    node.member = member;
                    level = &mut node.children;
                }
            }
        }

        fn to_columns(
            nodes: &IndexMap<String, Node>,
            path: &[String],
            annotations: &QueryAnnotations,
        ) -> Vec<TableColumn> {
            nodes
                .values()
                .map(|node| {
                    let mut node_path = path.to_vec();
                    node_path.push(node.key.clone());
                    let children = to_columns(&node.children, &node_path, annotations);

                    let annotation = lookup(annotations, &node.member);
                    let title = annotation.map(|a| a.title.clone());
                    let dimension_value = if node.key != node.member || title.is_none() {
                        node.key.clone()
                    } else {
                        String::new()
                    };
                    let mut column = TableColumn::member(&node.key, annotation);
                    column.title = Some(
                        format!("{} {}", title.unwrap_or_default(), dimension_value)
                            .trim()
                            .to_string(),
                    );
                    if !dimension_value.is_empty() {
                        column.short_title = Some(dimension_value);
                    }
                    if children.is_empty() {
                        column.data_index = Some(node_path.join(","));
                    } else {
                        column.data_index = None;
                        column.children = children;
                    }
                    column
                })
                .collect()
        }

        let mut columns: Vec<TableColumn> = config
            .x
            .iter()
            .map(|key| {
                if key == MEASURES_KEY {
                    TableColumn::synthetic(MEASURES_KEY, "Measures")
                } else {
                    TableColumn::member(key, lookup(&annotations, key))
                }
            })
            .collect();
        columns.extend(to_columns(&schema, &[], &annotations));

        if pivot.is_empty() && config.y.iter().any(|k| k == MEASURES_KEY) {
            if let Some(first) = self.results().first() {
                columns.extend(
                    first
                        .query
                        .measures
                        .iter()
                        .map(|m| TableColumn::member(m, lookup(&annotations, m))),
                );
            }
        }
        if config.y.is_empty() && config.measures_on_x() {
            columns.push(TableColumn::synthetic("value", "Value"));
        }
        Ok(columns)
    }

    /// Distinct series of the `y` axis, with display titles.
    pub fn series_names(&self, input: Option<&PivotConfigInput>) -> ReshapeResult<Vec<SeriesName>> {
        let config = self.normalize_pivot_config(input);
        let duplicates = self.duplicate_measures();

        let mut measures: IndexMap<&str, &Annotation> = IndexMap::new();
        for result in self.results() {
            for (member, annotation) in &result.annotation.measures {
                measures.insert(member.as_str(), annotation);
            }
        }

        let mut names = Vec::new();
        for index in 0..self.results().len() {
            let mut distinct: IndexMap<String, Vec<Value>> = IndexMap::new();
            for row in self.rows(index) {
                for axis in self.axis_values(&config.y, index, row) {
                    distinct
                        .entry(Value::Array(axis.clone()).to_string())
                        .or_insert(axis);
                }
            }
            names.extend(distinct.into_values());
        }

        let measures_on_y = config.y.iter().any(|k| k == MEASURES_KEY);
        Ok(names
            .into_iter()
            .enumerate()
            .map(|(i, axis)| {
                let aliased = alias_series(&axis, i, &config.alias_series, &duplicates);
                let titled = |pick: fn(&Annotation) -> &String| -> String {
                    if !measures_on_y {
                        return axis_values_string(&aliased, ", ");
                    }
                    let measure = measure_from_axis(&axis).unwrap_or_default();
                    let label = measures
                        .get(measure)
                        .map(|a| pick(a).clone())
                        .unwrap_or_else(|| measure.to_string());
                    let mut parts = aliased[..aliased.len().saturating_sub(1)].to_vec();
                    parts.push(Value::String(label));
                    axis_values_string(&parts, ", ")
                };
                SeriesName {
                    key: axis_values_string(&aliased, ","),
                    title: titled(|a| &a.title),
                    short_title: titled(|a| &a.short_title),
                    y_values: axis,
                }
            })
            .collect())
    }

    /// Per series, its points along `x`.
    pub fn series(&self, input: Option<&PivotConfigInput>) -> ReshapeResult<Vec<Series>> {
        let chart = self.chart_pivot(input)?;
        Ok(self
            .series_names(input)?
            .into_iter()
            .map(|name| Series {
                series: chart
                    .iter()
                    .map(|row| SeriesPoint {
                        x: row.x.clone(),
                        value: row.values.get(&name.key).cloned().unwrap_or(Value::Null),
                    })
                    .collect(),
                key: name.key,
                title: name.title,
                short_title: name.short_title,
            })
            .collect())
    }
}
