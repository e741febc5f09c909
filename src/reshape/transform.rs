//! Executor rows to annotated rows.
//!
//! ```text
//!   { "orders__count": "5", "orders__created_at_day": "2021-01-01T00:00:00Z" }
//!        │ alias map + annotations
//!        ▼
//!   { "Orders.count": "5",
//!     "Orders.createdAt.day": "2021-01-01T00:00:00.000",
//!     "Orders.createdAt": "2021-01-01T00:00:00.000" }      legacy key
//!        │ query type
//!        ▼
//!   + "compareDateRange": "<start> - <end>"               compare queries
//!   + "time.day": <value of Orders.createdAt.day>          blending queries
//! ```

use std::collections::HashMap;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::annotation::{Annotation, MemberType, QueryAnnotations};
use crate::error::{ReshapeError, ReshapeResult};
use crate::query::{NormalizedQuery, QueryType, BLENDING_TIME_DIMENSION};
use crate::time::{format_timestamp, parse_timestamp};

/// One result row, keyed by member.
pub type Row = Map<String, Value>;

/// Column-oriented rows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompactData {
    pub members: Vec<String>,
    pub dataset: Vec<Vec<Value>>,
}

impl CompactData {
    /// Pack rows; members are ordered by first appearance.
    pub fn from_rows(rows: &[Row]) -> Self {
        let members: IndexSet<&String> = rows.iter().flat_map(|row| row.keys()).collect();
        let dataset = rows
            .iter()
            .map(|row| {
                members
                    .iter()
                    .map(|m| row.get(m.as_str()).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Self {
            members: members.into_iter().cloned().collect(),
            dataset,
        }
    }

    pub fn to_rows(&self) -> Vec<Row> {
        self.dataset
            .iter()
            .map(|values| {
                self.members
                    .iter()
                    .cloned()
                    .zip(values.iter().cloned())
                    .collect()
            })
            .collect()
    }
}

/// Result data in either response format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultData {
    Rows(Vec<Row>),
    Compact(CompactData),
}

impl Default for ResultData {
    fn default() -> Self {
        ResultData::Rows(Vec::new())
    }
}

impl ResultData {
    pub fn to_rows(&self) -> Vec<Row> {
        match self {
            ResultData::Rows(rows) => rows.clone(),
            ResultData::Compact(compact) => compact.to_rows(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ResultData::Rows(rows) => rows.len(),
            ResultData::Compact(compact) => compact.dataset.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Re-emit a raw value according to the member type.
pub fn transform_value(value: &Value, member_type: MemberType) -> Value {
    match value {
        Value::String(s) if member_type == MemberType::Time && !s.is_empty() => {
            match parse_timestamp(s) {
                Some(ts) => Value::String(format_timestamp(&ts)),
                None => value.clone(),
            }
        }
        // Some drivers wrap values as `{ "value": ... }`
        Value::Object(obj) if obj.contains_key("value") => {
            obj.get("value").cloned().unwrap_or(Value::Null)
        }
        _ => value.clone(),
    }
}

/// Maps executor rows onto member-keyed rows.
pub struct RowTransformer<'a> {
    aliases: &'a HashMap<String, String>,
    annotations: HashMap<&'a str, &'a Annotation>,
    query: &'a NormalizedQuery,
    query_type: QueryType,
}

impl<'a> RowTransformer<'a> {
    pub fn new(
        aliases: &'a HashMap<String, String>,
        annotations: &'a QueryAnnotations,
        query: &'a NormalizedQuery,
        query_type: QueryType,
    ) -> Self {
        let annotations = annotations
            .measures
            .iter()
            .chain(&annotations.dimensions)
            .chain(&annotations.time_dimensions)
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        Self {
            aliases,
            annotations,
            query,
            query_type,
        }
    }

    pub fn transform(&self, rows: &[Row]) -> ReshapeResult<Vec<Row>> {
        rows.iter().map(|row| self.transform_row(row)).collect()
    }

    fn transform_row(&self, raw: &Row) -> ReshapeResult<Row> {
        let mut row = Row::new();

        for (alias, value) in raw {
            // Executors that already speak member names need no alias map
            let member = self.aliases.get(alias).unwrap_or(alias);
            let annotation = self
                .annotations
                .get(member.as_str())
                .ok_or_else(|| ReshapeError::HiddenMember(alias.clone()))?;
            let value = transform_value(value, annotation.member_type);

            let mut segments = member.split('.');
            if let (Some(cube), Some(field), Some(_), None) =
                (segments.next(), segments.next(), segments.next(), segments.next())
            {
                let base = format!("{}.{}", cube, field);
                if !self.query.dimensions.contains(&base) {
                    row.insert(member.clone(), value.clone());
                    row.insert(base, value);
                    continue;
                }
            }
            row.insert(member.clone(), value);
        }

        let Some(td) = self.query.time_dimensions.first() else {
            return Ok(row);
        };
        match self.query_type {
            QueryType::CompareDateRange => {
                if let Some([start, end]) = &td.date_range {
                    row.insert(
                        "compareDateRange".to_string(),
                        Value::String(format!("{} - {}", start, end)),
                    );
                }
            }
            QueryType::Blending => {
                if let (Some(granularity), Some(member)) = (&td.granularity, td.member()) {
                    let value = row.get(&member).cloned().unwrap_or(Value::Null);
                    row.insert(format!("{}.{}", BLENDING_TIME_DIMENSION, granularity), value);
                }
            }
            QueryType::Regular => {}
        }
        Ok(row)
    }
}

/// Transform executor rows for one query.
pub fn transform_data(
    aliases: &HashMap<String, String>,
    annotations: &QueryAnnotations,
    rows: &[Row],
    query: &NormalizedQuery,
    query_type: QueryType,
) -> ReshapeResult<Vec<Row>> {
    RowTransformer::new(aliases, annotations, query, query_type).transform(rows)
}
