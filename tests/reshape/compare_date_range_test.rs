use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use insta::assert_snapshot;
use semgate::query::{QueryNormalizer, QueryType};
use semgate::reshape::{
    prepare_annotation, transform_data, Annotation, DrillDownLocator, LoadResponse, LoadResult,
    MemberType, ResultSet, Row, StaticAnnotations,
};
use serde_json::{json, Value};

const THIS_WEEK: &str = "2021-03-15T00:00:00.000 - 2021-03-21T23:59:59.999";
const LAST_WEEK: &str = "2021-03-08T00:00:00.000 - 2021-03-14T23:59:59.999";

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 3, 17, 15, 30, 0).unwrap()
}

fn provider() -> StaticAnnotations {
    StaticAnnotations::new()
        .measure(
            "Orders.count",
            Annotation::new("Orders Count", "Count", MemberType::Number),
        )
        .dimension(
            "Orders.createdAt",
            Annotation::new("Orders Created at", "Created at", MemberType::Time),
        )
}

fn load(raw: Value, data: Vec<Value>) -> ResultSet {
    let request = QueryNormalizer::default()
        .normalize_at(&raw, false, now())
        .unwrap();
    let (query_type, queries, pivot_query) = request.into_parts();
    let aliases = HashMap::new();
    let results = queries
        .into_iter()
        .zip(data)
        .map(|(query, data)| {
            let annotation = prepare_annotation(&provider(), &query);
            let raw_rows: Vec<Row> = serde_json::from_value(data).unwrap();
            let rows = transform_data(&aliases, &annotation, &raw_rows, &query, query_type).unwrap();
            LoadResult::new(query, rows, annotation)
        })
        .collect();
    ResultSet::new(LoadResponse {
        query_type,
        results,
        pivot_query,
    })
}

fn weekly_comparison() -> ResultSet {
    load(
        json!({
            "measures": ["Orders.count"],
            "timeDimensions": [{
                "dimension": "Orders.createdAt",
                "granularity": "day",
                "compareDateRange": ["this week", "last week"]
            }]
        }),
        vec![
            json!([
                { "Orders.createdAt.day": "2021-03-15T00:00:00.000", "Orders.count": "3" },
                { "Orders.createdAt.day": "2021-03-17T00:00:00Z", "Orders.count": "1" }
            ]),
            json!([
                { "Orders.createdAt.day": "2021-03-08T00:00:00.000", "Orders.count": "4" },
                { "Orders.createdAt.day": "2021-03-09T00:00:00.000", "Orders.count": "6" }
            ]),
        ],
    )
}

#[test]
fn test_rows_carry_compared_range() {
    let result = weekly_comparison();
    assert_eq!(result.query_type(), QueryType::CompareDateRange);
    let first = &result.results()[0].data.to_rows()[0];
    assert_eq!(first["compareDateRange"], json!(THIS_WEEK));
    assert_eq!(first["Orders.createdAt"], json!("2021-03-15T00:00:00.000"));
}

#[test]
fn test_pivot_config_puts_range_on_y() {
    let config = weekly_comparison().normalize_pivot_config(None);
    assert_eq!(config.x, vec!["Orders.createdAt.day"]);
    assert_eq!(config.y, vec!["compareDateRange", "measures"]);
    assert!(config.fill_missing_dates);
}

#[test]
fn test_chart_pivot_lines_up_ranges() {
    let chart = weekly_comparison().chart_pivot(None).unwrap();
    assert_eq!(chart.len(), 7);
    assert_eq!(chart[0].x, "2021-03-15T00:00:00.000");

    let this_week = format!("{},Orders.count", THIS_WEEK);
    let last_week = format!("{},Orders.count", LAST_WEEK);
    let column = |key: &str| -> Vec<Value> { chart.iter().map(|row| row.values[key].clone()).collect() };
    assert_eq!(
        column(&this_week),
        vec![json!(3), json!(0), json!(1), json!(0), json!(0), json!(0), json!(0)]
    );
    assert_eq!(
        column(&last_week),
        vec![json!(4), json!(6), json!(0), json!(0), json!(0), json!(0), json!(0)]
    );
}

#[test]
fn test_series_names_per_range() {
    let names = weekly_comparison().series_names(None).unwrap();
    let titles: Vec<&str> = names.iter().map(|n| n.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            format!("{}, Orders Count", THIS_WEEK),
            format!("{}, Orders Count", LAST_WEEK),
        ]
    );
}

#[test]
fn test_regular_accessors_are_refused() {
    let err = weekly_comparison().raw_data().unwrap_err();
    assert_snapshot!(err.to_string(), @"Method is not supported for a 'compareDateRangeQuery' query type. Please use decompose");

    let parts = weekly_comparison().decompose();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[1].raw_data().unwrap().len(), 2);
}

#[test]
fn test_drill_down_is_refused() {
    let err = weekly_comparison()
        .drill_down(&DrillDownLocator::x(vec![json!("2021-03-15T00:00:00.000")]), None)
        .unwrap_err();
    assert_snapshot!(err.to_string(), @"compareDateRange drillDown query is not currently supported");
}
