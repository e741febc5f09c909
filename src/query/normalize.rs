//! Query normalization.
//!
//! ```text
//!   raw JSON ──▶ QuerySchema ──▶ classify ──┬── object ─────────────▶ regular
//!                                           ├── compareDateRange ───▶ N buckets
//!                                           └── array ──────────────▶ blending
//!                                                        │
//!            per query: filters, legacy dimensions, date ranges, order, limit
//!                                                        │
//!                                                        ▼
//!                                  NormalizedQueries + PivotQuery
//! ```

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use indexmap::IndexSet;
use serde_json::Value;
use tracing::{debug, warn};

use super::filter::FilterNormalizer;
use super::member::MemberPath;
use super::schema::QuerySchema;
use super::types::{
    NormalizedQueries, NormalizedQuery, NormalizedRequest, OrderInput, PivotQuery, QueryInput,
    QueryType, TimeDimension,
};
use crate::config::QuerySettings;
use crate::error::{NormalizationError, NormalizationResult, ValidationError, ValidationIssue};
use crate::time::date_range::resolve_date_range_value;
use crate::time::{
    parse_timestamp, DateExpressionParser, DateRangeInput, DateRangeResolver, Granularity,
    RelativeDateParser,
};

/// Pseudo-dimension naming the compared range of each row.
pub const COMPARE_DATE_RANGE_DIMENSION: &str = "compareDateRange";

/// Synthetic time dimension shared by blended queries.
pub const BLENDING_TIME_DIMENSION: &str = "time";

const EMPTY_QUERY: &str = "Query should contain either measures, dimensions or timeDimensions \
                           with granularities in order to be valid";

/// Turns raw queries into normalized ones.
#[derive(Debug, Clone)]
pub struct QueryNormalizer<P = RelativeDateParser> {
    settings: QuerySettings,
    schema: QuerySchema,
    filters: FilterNormalizer,
    resolver: DateRangeResolver<P>,
}

impl QueryNormalizer<RelativeDateParser> {
    pub fn new(settings: &QuerySettings) -> Self {
        Self {
            settings: settings.clone(),
            schema: QuerySchema,
            filters: FilterNormalizer,
            resolver: DateRangeResolver::new(),
        }
    }
}

impl Default for QueryNormalizer<RelativeDateParser> {
    fn default() -> Self {
        Self::new(&QuerySettings::default())
    }
}

impl<P: DateExpressionParser> QueryNormalizer<P> {
    /// Swap the grammar used for free-form date phrases.
    pub fn with_date_parser<Q: DateExpressionParser>(self, parser: Q) -> QueryNormalizer<Q> {
        QueryNormalizer {
            settings: self.settings,
            schema: self.schema,
            filters: self.filters,
            resolver: DateRangeResolver::with_parser(parser),
        }
    }

    pub fn settings(&self) -> &QuerySettings {
        &self.settings
    }

    /// Normalize a request. `persistent` lifts the limit ceiling.
    pub fn normalize(&self, raw: &Value, persistent: bool) -> NormalizationResult<NormalizedRequest> {
        self.normalize_at(raw, persistent, Utc::now())
    }

    /// Normalize with an explicit "now" for relative date expressions.
    pub fn normalize_at(
        &self,
        raw: &Value,
        persistent: bool,
        now: DateTime<Utc>,
    ) -> NormalizationResult<NormalizedRequest> {
        let (query_type, inputs) = self.classify(raw)?;

        let normalized = inputs
            .iter()
            .map(|input| self.normalize_input(input, persistent, now))
            .collect::<NormalizationResult<Vec<_>>>()?;
        self.assemble(query_type, normalized)
    }

    /// Check queries again after they were changed post-normalization.
    ///
    /// Every query goes back through validation and normalization, so a
    /// rewrite cannot smuggle in a shape the normalizer would reject.
    pub fn renormalize(
        &self,
        query_type: QueryType,
        queries: Vec<NormalizedQuery>,
        persistent: bool,
        now: DateTime<Utc>,
    ) -> NormalizationResult<NormalizedRequest> {
        let normalized = queries
            .iter()
            .map(|query| {
                let raw = serde_json::to_value(query)
                    .map_err(|e| ValidationError::single("", e.to_string()))?;
                self.schema.validate(&raw)?;
                self.normalize_input(&parse_input(&raw)?, persistent, now)
            })
            .collect::<NormalizationResult<Vec<_>>>()?;
        self.assemble(query_type, normalized)
    }

    fn assemble(
        &self,
        query_type: QueryType,
        normalized: Vec<NormalizedQuery>,
    ) -> NormalizationResult<NormalizedRequest> {
        let queries = match query_type {
            QueryType::Regular => match normalized.into_iter().next() {
                Some(query) => NormalizedQueries::Regular(query),
                None => return Err(NormalizationError::invalid_query(EMPTY_QUERY)),
            },
            QueryType::CompareDateRange => NormalizedQueries::CompareDateRange(normalized),
            QueryType::Blending => {
                check_blending_granularity(&normalized)?;
                NormalizedQueries::Blending(normalized)
            }
        };

        let pivot_query = pivot_query(&queries);
        debug!(
            query_type = %query_type,
            queries = queries.len(),
            "Query normalized"
        );

        Ok(NormalizedRequest {
            queries,
            pivot_query,
        })
    }

    /// Validate and split a request into raw sub-queries.
    fn classify(&self, raw: &Value) -> NormalizationResult<(QueryType, Vec<QueryInput>)> {
        if let Value::Array(items) = raw {
            if items.is_empty() {
                return Err(ValidationError::single("", "blending query must not be empty").into());
            }
            let mut issues = Vec::new();
            for (i, item) in items.iter().enumerate() {
                self.schema.check(item, &format!("[{}]", i), &mut issues);
            }
            if !issues.is_empty() {
                return Err(ValidationError::new(issues).into());
            }

            let inputs = items
                .iter()
                .map(parse_input)
                .collect::<NormalizationResult<Vec<_>>>()?;
            let has_compare = inputs
                .iter()
                .flat_map(|q| q.time_dimensions.iter())
                .any(|td| td.compare_date_range.is_some());
            if has_compare {
                return Err(NormalizationError::invalid_query(
                    "compareDateRange is not supported in data blending queries",
                ));
            }
            return Ok((QueryType::Blending, inputs));
        }

        self.schema.validate(raw)?;
        let input = parse_input(raw)?;
        match expand_compare_date_range(&input)? {
            Some(buckets) => Ok((QueryType::CompareDateRange, buckets)),
            None => Ok((QueryType::Regular, vec![input])),
        }
    }

    /// Normalize one structurally valid sub-query.
    pub fn normalize_input(
        &self,
        input: &QueryInput,
        persistent: bool,
        now: DateTime<Utc>,
    ) -> NormalizationResult<NormalizedQuery> {
        let timezone = input
            .timezone
            .clone()
            .unwrap_or_else(|| self.settings.default_timezone.clone());
        let tz: Tz = timezone.parse().map_err(|_| {
            ValidationError::single("timezone", format!("unknown timezone {}", timezone))
        })?;

        let filters = self.filters.normalize(&input.filters, "filters")?;

        let mut time_dimensions = Vec::with_capacity(input.time_dimensions.len());
        for td in &input.time_dimensions {
            let date_range = td
                .date_range
                .as_ref()
                .map(|range| resolve_date_range_value(&self.resolver, range, tz, now))
                .transpose()?;
            time_dimensions.push(TimeDimension {
                dimension: td.dimension.clone(),
                granularity: td.granularity.as_deref().map(Granularity::parse),
                date_range,
            });
        }

        // Granularity-suffixed dimensions are time dimensions in disguise
        let mut dimensions = Vec::with_capacity(input.dimensions.len());
        for dimension in &input.dimensions {
            match MemberPath::parse(dimension) {
                Some(path) if path.granularity.is_some() => {
                    let granularity = path.granularity.as_deref().map(Granularity::parse);
                    time_dimensions.push(TimeDimension {
                        dimension: path.member(),
                        granularity,
                        date_range: None,
                    });
                }
                _ => dimensions.push(dimension.clone()),
            }
        }

        let has_granular_time = time_dimensions.iter().any(|td| td.granularity.is_some());
        if input.measures.is_empty() && dimensions.is_empty() && !has_granular_time {
            return Err(NormalizationError::invalid_query(EMPTY_QUERY));
        }

        let limit = match input.limit {
            None => self.settings.default_limit,
            Some(limit) if limit > self.settings.max_limit && !persistent => {
                return Err(ValidationError::single(
                    "limit",
                    format!("must be less than or equal to {}", self.settings.max_limit),
                )
                .into());
            }
            Some(limit) => limit,
        };

        Ok(NormalizedQuery {
            measures: input.measures.clone(),
            dimensions,
            segments: input.segments.clone(),
            time_dimensions,
            filters,
            order: input
                .order
                .clone()
                .map(OrderInput::into_pairs)
                .unwrap_or_default(),
            limit,
            offset: input.offset,
            timezone,
            renew_query: input.renew_query,
            ungrouped: input.ungrouped,
            total: input.total,
            response_format: input.response_format,
        })
    }
}

fn parse_input(raw: &Value) -> NormalizationResult<QueryInput> {
    serde_json::from_value(raw.clone()).map_err(|e| {
        NormalizationError::from(ValidationError::new(vec![ValidationIssue::new(
            "",
            e.to_string(),
        )]))
    })
}

/// Split a query with a `compareDateRange` into one query per range.
///
/// Returns `None` when no time dimension compares ranges.
pub fn expand_compare_date_range(
    input: &QueryInput,
) -> NormalizationResult<Option<Vec<QueryInput>>> {
    let mut comparing = input
        .time_dimensions
        .iter()
        .enumerate()
        .filter(|(_, td)| td.compare_date_range.is_some());

    let Some((index, td)) = comparing.next() else {
        return Ok(None);
    };
    if comparing.next().is_some() {
        return Err(NormalizationError::invalid_query(
            "compareDateRange can only exist for one timeDimension",
        ));
    }

    let ranges: &[DateRangeInput] = td.compare_date_range.as_deref().unwrap_or_default();
    let buckets = ranges
        .iter()
        .map(|range| {
            let mut bucket = input.clone();
            let target = &mut bucket.time_dimensions[index];
            target.compare_date_range = None;
            target.date_range = Some(range.clone());
            bucket
        })
        .collect();
    Ok(Some(buckets))
}

/// Blended queries must agree on the granularity of their first time dimension.
fn check_blending_granularity(queries: &[NormalizedQuery]) -> NormalizationResult<()> {
    let granularities = blending_granularities(queries);
    if granularities.len() > 1 {
        warn!(
            granularities = ?granularities.iter().map(Granularity::as_str).collect::<Vec<_>>(),
            "Blending granularity mismatch"
        );
        return Err(NormalizationError::invalid_query(
            "Data blending query granularities must match",
        ));
    }
    if granularities.is_empty() {
        return Err(NormalizationError::invalid_query(
            "Data blending query without granularity is not supported",
        ));
    }
    Ok(())
}

fn blending_granularities(queries: &[NormalizedQuery]) -> IndexSet<Granularity> {
    queries
        .iter()
        .filter_map(|q| q.time_dimensions.first())
        .filter_map(|td| td.granularity.clone())
        .collect()
}

/// Build the descriptor used to render all results as one.
pub fn pivot_query(queries: &NormalizedQueries) -> PivotQuery {
    match queries {
        NormalizedQueries::Regular(query) => PivotQuery::regular(query.clone()),
        NormalizedQueries::CompareDateRange(buckets) => {
            let mut query = buckets.first().cloned().unwrap_or_default();
            query
                .dimensions
                .insert(0, COMPARE_DATE_RANGE_DIMENSION.to_string());
            PivotQuery {
                query,
                query_type: QueryType::CompareDateRange,
            }
        }
        NormalizedQueries::Blending(parts) => {
            let mut query = parts.first().cloned().unwrap_or_default();
            let measures: IndexSet<&String> = parts.iter().flat_map(|q| &q.measures).collect();
            let dimensions: IndexSet<&String> = parts.iter().flat_map(|q| &q.dimensions).collect();
            query.measures = measures.into_iter().cloned().collect();
            query.dimensions = dimensions.into_iter().cloned().collect();
            query.time_dimensions = vec![TimeDimension {
                dimension: BLENDING_TIME_DIMENSION.to_string(),
                granularity: blending_granularities(parts).into_iter().next(),
                date_range: date_range_envelope(parts),
            }];
            PivotQuery {
                query,
                query_type: QueryType::Blending,
            }
        }
    }
}

/// Earliest start and latest end over each query's first time dimension.
fn date_range_envelope(queries: &[NormalizedQuery]) -> Option<[String; 2]> {
    let mut envelope: Option<[String; 2]> = None;
    for [start, end] in queries
        .iter()
        .filter_map(|q| q.time_dimensions.first())
        .filter_map(|td| td.date_range.as_ref())
    {
        envelope = Some(match envelope {
            None => [start.clone(), end.clone()],
            Some([lo, hi]) => [
                if earlier(start, &lo) { start.clone() } else { lo },
                if earlier(&hi, end) { end.clone() } else { hi },
            ],
        });
    }
    envelope
}

fn earlier(a: &str, b: &str) -> bool {
    match (parse_timestamp(a), parse_timestamp(b)) {
        (Some(a), Some(b)) => a < b,
        _ => a < b,
    }
}
