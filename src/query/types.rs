//! Query types.
//!
//! Raw types mirror what clients send after structural validation. Normalized
//! types are the canonical, unambiguous form the rest of the crate consumes.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::filter::Filter;
use crate::config::{DEFAULT_LIMIT, DEFAULT_TIMEZONE};
use crate::time::{DateRangeInput, Granularity};

// ============================================================================
// Shared
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    Asc,
    Desc,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Default,
    Compact,
}

/// How a request is split into executable queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryType {
    #[serde(rename = "regularQuery")]
    Regular,
    #[serde(rename = "compareDateRangeQuery")]
    CompareDateRange,
    #[serde(rename = "blendingQuery")]
    Blending,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Regular => "regularQuery",
            QueryType::CompareDateRange => "compareDateRangeQuery",
            QueryType::Blending => "blendingQuery",
        }
    }
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Raw input
// ============================================================================

/// `order` as either `{member: dir}` or `[[member, dir]]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrderInput {
    List(Vec<(String, OrderDirection)>),
    Map(IndexMap<String, OrderDirection>),
}

impl OrderInput {
    pub fn into_pairs(self) -> Vec<(String, OrderDirection)> {
        match self {
            OrderInput::List(pairs) => pairs,
            OrderInput::Map(map) => map.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeDimensionInput {
    pub dimension: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granularity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRangeInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_date_range: Option<Vec<DateRangeInput>>,
}

/// A structurally valid query, before normalization.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryInput {
    pub measures: Vec<String>,
    pub dimensions: Vec<String>,
    pub segments: Vec<String>,
    pub time_dimensions: Vec<TimeDimensionInput>,
    /// Left raw; the filter normalizer owns their shape.
    pub filters: Vec<Value>,
    pub order: Option<OrderInput>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub timezone: Option<String>,
    pub renew_query: Option<bool>,
    pub ungrouped: Option<bool>,
    pub total: Option<bool>,
    pub response_format: Option<ResponseFormat>,
}

// ============================================================================
// Normalized
// ============================================================================

/// A time dimension with a concrete date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeDimension {
    pub dimension: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granularity: Option<Granularity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<[String; 2]>,
}

impl TimeDimension {
    pub fn new(dimension: impl Into<String>) -> Self {
        Self {
            dimension: dimension.into(),
            granularity: None,
            date_range: None,
        }
    }

    pub fn with_granularity(mut self, granularity: impl Into<Granularity>) -> Self {
        self.granularity = Some(granularity.into());
        self
    }

    pub fn with_date_range(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.date_range = Some([start.into(), end.into()]);
        self
    }

    /// Row key of the bucketed values (`Orders.createdAt.day`), when granular.
    pub fn member(&self) -> Option<String> {
        self.granularity
            .as_ref()
            .map(|g| super::member::time_dimension_member(&self.dimension, g.as_str()))
    }
}

/// The canonical form of one executable query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NormalizedQuery {
    pub measures: Vec<String>,
    pub dimensions: Vec<String>,
    pub segments: Vec<String>,
    pub time_dimensions: Vec<TimeDimension>,
    pub filters: Vec<Filter>,
    pub order: Vec<(String, OrderDirection)>,
    pub limit: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    pub timezone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renew_query: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ungrouped: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

impl Default for NormalizedQuery {
    fn default() -> Self {
        Self {
            measures: Vec::new(),
            dimensions: Vec::new(),
            segments: Vec::new(),
            time_dimensions: Vec::new(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: DEFAULT_LIMIT,
            offset: None,
            timezone: DEFAULT_TIMEZONE.to_string(),
            renew_query: None,
            ungrouped: None,
            total: None,
            response_format: None,
        }
    }
}

impl NormalizedQuery {
    /// Time dimensions that carry a granularity.
    pub fn granular_time_dimensions(&self) -> impl Iterator<Item = &TimeDimension> {
        self.time_dimensions.iter().filter(|td| td.granularity.is_some())
    }

    /// Row keys of all granular time dimensions, in query order.
    pub fn time_dimension_members(&self) -> Vec<String> {
        self.granular_time_dimensions()
            .filter_map(TimeDimension::member)
            .collect()
    }
}

/// Descriptor used to render N results as one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotQuery {
    #[serde(flatten)]
    pub query: NormalizedQuery,
    pub query_type: QueryType,
}

impl PivotQuery {
    pub fn regular(query: NormalizedQuery) -> Self {
        Self {
            query,
            query_type: QueryType::Regular,
        }
    }
}

impl std::ops::Deref for PivotQuery {
    type Target = NormalizedQuery;

    fn deref(&self) -> &Self::Target {
        &self.query
    }
}

/// The executable queries of a request, by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedQueries {
    Regular(NormalizedQuery),
    /// One query per compared date range, in request order.
    CompareDateRange(Vec<NormalizedQuery>),
    /// One query per blended sub-query, in request order.
    Blending(Vec<NormalizedQuery>),
}

impl NormalizedQueries {
    pub fn query_type(&self) -> QueryType {
        match self {
            NormalizedQueries::Regular(_) => QueryType::Regular,
            NormalizedQueries::CompareDateRange(_) => QueryType::CompareDateRange,
            NormalizedQueries::Blending(_) => QueryType::Blending,
        }
    }

    pub fn as_slice(&self) -> &[NormalizedQuery] {
        match self {
            NormalizedQueries::Regular(query) => std::slice::from_ref(query),
            NormalizedQueries::CompareDateRange(queries) | NormalizedQueries::Blending(queries) => {
                queries
            }
        }
    }

    pub fn into_vec(self) -> Vec<NormalizedQuery> {
        match self {
            NormalizedQueries::Regular(query) => vec![query],
            NormalizedQueries::CompareDateRange(queries) | NormalizedQueries::Blending(queries) => {
                queries
            }
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

/// Result of normalizing one request.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRequest {
    pub queries: NormalizedQueries,
    pub pivot_query: PivotQuery,
}

impl NormalizedRequest {
    pub fn query_type(&self) -> QueryType {
        self.queries.query_type()
    }

    pub fn into_parts(self) -> (QueryType, Vec<NormalizedQuery>, PivotQuery) {
        let query_type = self.queries.query_type();
        (query_type, self.queries.into_vec(), self.pivot_query)
    }
}
