use chrono::{DateTime, TimeZone, Utc};
use insta::assert_snapshot;
use semgate::config::QuerySettings;
use semgate::error::NormalizationError;
use semgate::query::{
    FilterOperator, MemberFilter, NormalizedQueries, NormalizedQuery, OrderDirection,
    QueryNormalizer, QueryType, TimeDimension,
};
use semgate::time::Granularity;
use serde_json::{json, Value};

fn now() -> DateTime<Utc> {
    // Wednesday
    Utc.with_ymd_and_hms(2021, 3, 17, 15, 30, 0).unwrap()
}

fn normalize(raw: Value) -> Result<Vec<NormalizedQuery>, NormalizationError> {
    QueryNormalizer::default()
        .normalize_at(&raw, false, now())
        .map(|request| request.queries.into_vec())
}

fn single(raw: Value) -> NormalizedQuery {
    normalize(raw).unwrap().remove(0)
}

// ============================================================================
// Regular queries
// ============================================================================

#[test]
fn test_normalizing_twice_is_identity() {
    let first = single(json!({
        "measures": ["Orders.count"],
        "dimensions": ["Orders.status", "Orders.createdAt.month"],
        "timeDimensions": [{ "dimension": "Orders.completedAt", "dateRange": "last 7 days" }],
        "filters": [
            { "dimension": "Orders.amount", "operator": "gte", "values": [10] },
            { "or": [{ "member": "Orders.city", "operator": "set" }] }
        ],
        "order": { "Orders.count": "desc", "Orders.status": "asc" },
        "limit": 500,
        "timezone": "Europe/Berlin"
    }));

    let second = single(serde_json::to_value(&first).unwrap());
    assert_eq!(first, second);
}

#[test]
fn test_legacy_dimension_becomes_time_dimension() {
    let query = single(json!({ "dimensions": ["Orders.createdAt.day"] }));
    assert!(query.dimensions.is_empty());
    assert_eq!(
        query.time_dimensions,
        vec![TimeDimension::new("Orders.createdAt").with_granularity("day")]
    );
}

#[test]
fn test_legacy_dimension_keeps_custom_granularity() {
    let query = single(json!({
        "measures": ["Orders.count"],
        "dimensions": ["Orders.status", "Orders.createdAt.fiscal_quarter"]
    }));
    assert_eq!(query.dimensions, vec!["Orders.status"]);
    assert_eq!(
        query.time_dimensions[0].granularity,
        Some(Granularity::Custom("fiscal_quarter".into()))
    );
}

#[test]
fn test_date_range_forms() {
    let query = single(json!({
        "measures": ["Orders.count"],
        "timeDimensions": [
            { "dimension": "Orders.createdAt", "dateRange": "yesterday" },
            { "dimension": "Orders.shippedAt", "dateRange": ["2021-01-01"] },
            { "dimension": "Orders.paidAt", "dateRange": ["2021-01-01", "2021-02-01"] }
        ]
    }));
    let ranges: Vec<_> = query
        .time_dimensions
        .iter()
        .map(|td| td.date_range.clone().unwrap())
        .collect();
    assert_eq!(
        ranges,
        vec![
            ["2021-03-16T00:00:00.000".to_string(), "2021-03-16T23:59:59.999".to_string()],
            ["2021-01-01".to_string(), "2021-01-01".to_string()],
            ["2021-01-01".to_string(), "2021-02-01".to_string()],
        ]
    );
}

#[test]
fn test_relative_range_uses_query_timezone() {
    // 15:30 UTC on the 17th is already the 18th in Tokyo
    let query = single(json!({
        "measures": ["Orders.count"],
        "timezone": "Asia/Tokyo",
        "timeDimensions": [{ "dimension": "Orders.createdAt", "dateRange": "today" }]
    }));
    assert_eq!(
        query.time_dimensions[0].date_range,
        Some(["2021-03-18T00:00:00.000".to_string(), "2021-03-18T23:59:59.999".to_string()])
    );
}

#[test]
fn test_order_forms_agree() {
    let from_map = single(json!({
        "measures": ["Orders.count"],
        "order": { "Orders.count": "desc", "Orders.status": "asc" }
    }));
    let from_list = single(json!({
        "measures": ["Orders.count"],
        "order": [["Orders.count", "desc"], ["Orders.status", "asc"]]
    }));
    assert_eq!(from_map.order, from_list.order);
    assert_eq!(
        from_map.order,
        vec![
            ("Orders.count".to_string(), OrderDirection::Desc),
            ("Orders.status".to_string(), OrderDirection::Asc),
        ]
    );
}

#[test]
fn test_filters_are_normalized() {
    let query = single(json!({
        "measures": ["Orders.count"],
        "filters": [{ "dimension": "Orders.amount", "operator": "lt", "values": [5.5] }]
    }));
    assert_eq!(
        query.filters,
        vec![MemberFilter::new("Orders.amount", FilterOperator::Lt)
            .with_values(["5.5"])
            .into()]
    );
}

#[test]
fn test_flags_pass_through() {
    let query = single(json!({
        "measures": ["Orders.count"],
        "ungrouped": true,
        "total": true,
        "renewQuery": false,
        "responseFormat": "compact",
        "offset": 20
    }));
    assert_eq!(query.ungrouped, Some(true));
    assert_eq!(query.total, Some(true));
    assert_eq!(query.renew_query, Some(false));
    assert_eq!(query.offset, Some(20));
    assert_eq!(
        query.response_format,
        Some(semgate::query::ResponseFormat::Compact)
    );
}

#[test]
fn test_configured_limits() {
    let settings = QuerySettings {
        default_limit: 100,
        max_limit: 1000,
        default_timezone: "America/New_York".into(),
    };
    let normalizer = QueryNormalizer::new(&settings);
    let request = normalizer
        .normalize_at(&json!({ "measures": ["Orders.count"] }), false, now())
        .unwrap();
    assert_eq!(request.pivot_query.limit, 100);
    assert_eq!(request.pivot_query.timezone, "America/New_York");

    let err = normalizer
        .normalize_at(&json!({ "measures": ["Orders.count"], "limit": 1001 }), false, now())
        .unwrap_err();
    assert_snapshot!(err.to_string(), @"Invalid query format: limit: must be less than or equal to 1000");
}

#[test]
fn test_persistent_query_may_exceed_max_limit() {
    let normalizer = QueryNormalizer::default();
    let raw = json!({ "measures": ["Orders.count"], "limit": 75000 });

    assert!(normalizer.normalize(&raw, false).is_err());
    let request = normalizer.normalize(&raw, true).unwrap();
    assert_eq!(request.queries.as_slice()[0].limit, 75_000);
}

#[test]
fn test_empty_query() {
    let err = normalize(json!({ "timeDimensions": [{ "dimension": "Orders.createdAt" }] })).unwrap_err();
    assert_snapshot!(err.to_string(), @"Invalid query: Query should contain either measures, dimensions or timeDimensions with granularities in order to be valid");
}

#[test]
fn test_invalid_date_expression() {
    let err = normalize(json!({
        "measures": ["Orders.count"],
        "timeDimensions": [{ "dimension": "Orders.createdAt", "dateRange": "whenever" }]
    }))
    .unwrap_err();
    assert!(err.is_user_error());
    assert_snapshot!(err.to_string(), @"Can't parse date: 'whenever'");
}

// ============================================================================
// Compare date range
// ============================================================================

#[test]
fn test_compare_date_range_expands() {
    let request = QueryNormalizer::default()
        .normalize_at(
            &json!({
                "measures": ["Orders.count"],
                "dimensions": ["Orders.status"],
                "timeDimensions": [{
                    "dimension": "Orders.createdAt",
                    "granularity": "day",
                    "compareDateRange": ["this month", "last month"]
                }]
            }),
            false,
            now(),
        )
        .unwrap();

    assert_eq!(request.query_type(), QueryType::CompareDateRange);
    let queries = request.queries.as_slice();
    assert_eq!(
        queries[0].time_dimensions[0].date_range,
        Some(["2021-03-01T00:00:00.000".to_string(), "2021-03-31T23:59:59.999".to_string()])
    );
    assert_eq!(
        queries[1].time_dimensions[0].date_range,
        Some(["2021-02-01T00:00:00.000".to_string(), "2021-02-28T23:59:59.999".to_string()])
    );
    assert_eq!(
        request.pivot_query.dimensions,
        vec!["compareDateRange", "Orders.status"]
    );
    assert_eq!(request.pivot_query.query_type, QueryType::CompareDateRange);
}

#[test]
fn test_two_compare_date_ranges() {
    let err = normalize(json!({
        "measures": ["Orders.count"],
        "timeDimensions": [
            { "dimension": "Orders.createdAt", "compareDateRange": ["this week", "last week"] },
            { "dimension": "Orders.shippedAt", "compareDateRange": ["this week", "last week"] }
        ]
    }))
    .unwrap_err();
    assert_snapshot!(err.to_string(), @"Invalid query: compareDateRange can only exist for one timeDimension");
}

// ============================================================================
// Blending
// ============================================================================

#[test]
fn test_blending_granularities_must_match() {
    let err = normalize(json!([
        { "measures": ["Orders.count"], "timeDimensions": [{ "dimension": "Orders.createdAt", "granularity": "day" }] },
        { "measures": ["Users.count"], "timeDimensions": [{ "dimension": "Orders.createdAt", "granularity": "month" }] }
    ]))
    .unwrap_err();
    assert!(matches!(err, NormalizationError::InvalidQuery(_)));
    assert_snapshot!(err.to_string(), @"Invalid query: Data blending query granularities must match");
}

#[test]
fn test_blending_needs_granularity() {
    let err = normalize(json!([
        { "measures": ["Orders.count"] },
        { "measures": ["Users.count"] }
    ]))
    .unwrap_err();
    assert_snapshot!(err.to_string(), @"Invalid query: Data blending query without granularity is not supported");
}

#[test]
fn test_blending_only_checks_first_time_dimension() {
    let queries = normalize(json!([
        {
            "measures": ["Orders.count"],
            "timeDimensions": [
                { "dimension": "Orders.createdAt", "granularity": "day" },
                { "dimension": "Orders.shippedAt", "granularity": "year" }
            ]
        },
        { "measures": ["Users.count"], "timeDimensions": [{ "dimension": "Users.createdAt", "granularity": "day" }] }
    ]))
    .unwrap();
    assert_eq!(queries.len(), 2);
}

#[test]
fn test_blending_pivot_query() {
    let request = QueryNormalizer::default()
        .normalize_at(
            &json!([
                {
                    "measures": ["Orders.count"],
                    "dimensions": ["Orders.status"],
                    "timeDimensions": [{ "dimension": "Orders.createdAt", "granularity": "week" }]
                },
                {
                    "measures": ["Orders.count", "Users.count"],
                    "dimensions": ["Orders.status"],
                    "timeDimensions": [{ "dimension": "Users.createdAt", "granularity": "week" }]
                }
            ]),
            false,
            now(),
        )
        .unwrap();

    assert!(matches!(request.queries, NormalizedQueries::Blending(_)));
    let pivot = &request.pivot_query;
    assert_eq!(pivot.query_type, QueryType::Blending);
    assert_eq!(pivot.measures, vec!["Orders.count", "Users.count"]);
    assert_eq!(pivot.dimensions, vec!["Orders.status"]);
    assert_eq!(
        pivot.time_dimensions,
        vec![TimeDimension::new("time").with_granularity("week")]
    );
}

#[test]
fn test_blending_issue_paths_are_indexed() {
    let err = normalize(json!([
        { "measures": ["Orders.count"], "timeDimensions": [{ "dimension": "Orders.createdAt", "granularity": "day" }] },
        { "measures": ["Users"] }
    ]))
    .unwrap_err();
    assert_snapshot!(err.to_string(), @"Invalid query format: [1].measures[0]: must match <cube>.<member>");
}

#[test]
fn test_blending_rejects_compare_date_range() {
    let err = normalize(json!([
        {
            "measures": ["Orders.count"],
            "timeDimensions": [{
                "dimension": "Orders.createdAt",
                "granularity": "day",
                "compareDateRange": ["this week", "last week"]
            }]
        },
        {
            "measures": ["Users.count"],
            "timeDimensions": [{ "dimension": "Users.createdAt", "granularity": "day" }]
        }
    ]))
    .unwrap_err();
    assert_snapshot!(err.to_string(), @"Invalid query: compareDateRange is not supported in data blending queries");
}
