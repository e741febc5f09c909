use semgate::query::{NormalizedQuery, TimeDimension};
use semgate::reshape::{
    Annotation, LoadResult, MemberType, PivotConfigInput, QueryAnnotations, ResultSet, Row,
};
use serde_json::{json, Value};

fn rows(value: Value) -> Vec<Row> {
    serde_json::from_value(value).unwrap()
}

fn annotations() -> QueryAnnotations {
    let mut annotations = QueryAnnotations::default();
    annotations.measures.insert(
        "Orders.count".into(),
        Annotation::new("Orders Count", "Count", MemberType::Number),
    );
    annotations.measures.insert(
        "Orders.total".into(),
        Annotation::new("Orders Total", "Total", MemberType::Number),
    );
    annotations.dimensions.insert(
        "Orders.status".into(),
        Annotation::new("Orders Status", "Status", MemberType::String),
    );
    annotations
}

fn result_set(query: NormalizedQuery, data: Value) -> ResultSet {
    ResultSet::from_result(LoadResult::new(query, rows(data), annotations()))
}

fn daily_query(dimensions: &[&str]) -> NormalizedQuery {
    NormalizedQuery {
        measures: vec!["Orders.count".into()],
        dimensions: dimensions.iter().map(|d| d.to_string()).collect(),
        time_dimensions: vec![TimeDimension::new("Orders.createdAt")
            .with_granularity("day")
            .with_date_range("2020-01-01", "2020-01-04")],
        ..Default::default()
    }
}

fn sparse_days() -> Value {
    json!([
        { "Orders.createdAt.day": "2020-01-01T00:00:00.000", "Orders.count": "5" },
        { "Orders.createdAt.day": "2020-01-03T00:00:00.000", "Orders.count": "2" }
    ])
}

#[test]
fn test_rows_keep_input_order() {
    let query = NormalizedQuery {
        measures: vec!["Users.count".into()],
        dimensions: vec!["Users.visits".into()],
        ..Default::default()
    };
    let result = ResultSet::from_result(LoadResult::new(
        query,
        rows(json!([
            { "Users.visits": 1, "Users.count": 3 },
            { "Users.visits": 0.9, "Users.count": 4 },
            { "Users.visits": 0.7, "Users.count": 1 },
            { "Users.visits": 0, "Users.count": 7 }
        ])),
        QueryAnnotations::default(),
    ));

    let x: Vec<Value> = result
        .pivot(None)
        .unwrap()
        .into_iter()
        .map(|row| row.x_values[0].clone())
        .collect();
    assert_eq!(x, vec![json!(1), json!(0.9), json!(0.7), json!(0)]);
}

#[test]
fn test_missing_dates_are_filled() {
    let chart = result_set(daily_query(&[]), sparse_days())
        .chart_pivot(None)
        .unwrap();

    let points: Vec<(String, Value)> = chart
        .iter()
        .map(|row| (row.x.clone(), row.values["Orders.count"].clone()))
        .collect();
    assert_eq!(
        points,
        vec![
            ("2020-01-01T00:00:00.000".to_string(), json!(5)),
            ("2020-01-02T00:00:00.000".to_string(), json!(0)),
            ("2020-01-03T00:00:00.000".to_string(), json!(2)),
            ("2020-01-04T00:00:00.000".to_string(), json!(0)),
        ]
    );
}

#[test]
fn test_fill_with_value() {
    let input = PivotConfigInput::default().with_fill_with_value(Value::Null);
    let pivot = result_set(daily_query(&[]), sparse_days())
        .pivot(Some(&input))
        .unwrap();
    assert_eq!(pivot.len(), 4);
    assert_eq!(pivot[1].y_values_array, vec![(vec![json!("Orders.count")], Value::Null)]);
}

#[test]
fn test_without_filling() {
    let input = PivotConfigInput::default().with_fill_missing_dates(false);
    let pivot = result_set(daily_query(&[]), sparse_days())
        .pivot(Some(&input))
        .unwrap();
    let x: Vec<Value> = pivot.into_iter().map(|row| row.x_values[0].clone()).collect();
    assert_eq!(
        x,
        vec![json!("2020-01-01T00:00:00.000"), json!("2020-01-03T00:00:00.000")]
    );
}

#[test]
fn test_dimension_on_y_axis() {
    let result = result_set(
        daily_query(&["Orders.status"]),
        json!([
            { "Orders.createdAt.day": "2020-01-01T00:00:00.000", "Orders.status": "shipped", "Orders.count": 1 },
            { "Orders.createdAt.day": "2020-01-01T00:00:00.000", "Orders.status": "new", "Orders.count": 2 },
            { "Orders.createdAt.day": "2020-01-02T00:00:00.000", "Orders.status": "shipped", "Orders.count": 3 }
        ]),
    );

    let chart = result.chart_pivot(None).unwrap();
    assert_eq!(chart.len(), 4);
    assert_eq!(
        serde_json::to_value(&chart[1]).unwrap(),
        json!({
            "x": "2020-01-02T00:00:00.000",
            "xValues": ["2020-01-02T00:00:00.000"],
            "shipped,Orders.count": 3,
            "new,Orders.count": 0
        })
    );

    let names = result.series_names(None).unwrap();
    let summary: Vec<(&str, &str, &str)> = names
        .iter()
        .map(|n| (n.key.as_str(), n.title.as_str(), n.short_title.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("shipped,Orders.count", "shipped, Orders Count", "shipped, Count"),
            ("new,Orders.count", "new, Orders Count", "new, Count"),
        ]
    );
}

#[test]
fn test_series_points() {
    let series = result_set(daily_query(&[]), sparse_days())
        .series(None)
        .unwrap();
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].key, "Orders.count");
    assert_eq!(series[0].title, "Orders Count");
    let values: Vec<Value> = series[0].series.iter().map(|p| p.value.clone()).collect();
    assert_eq!(values, vec![json!(5), json!(0), json!(2), json!(0)]);
}

#[test]
fn test_measures_on_x_axis() {
    let query = NormalizedQuery {
        measures: vec!["Orders.count".into(), "Orders.total".into()],
        dimensions: vec!["Orders.status".into()],
        ..Default::default()
    };
    let result = result_set(
        query,
        json!([
            { "Orders.status": "a", "Orders.count": 1, "Orders.total": 10 },
            { "Orders.status": "b", "Orders.count": 2, "Orders.total": 20 }
        ]),
    );

    let input = PivotConfigInput::axes(["measures"], ["Orders.status"]);
    let pivot = result.pivot(Some(&input)).unwrap();
    assert_eq!(pivot.len(), 2);
    assert_eq!(pivot[0].x_values, vec![json!("Orders.count")]);
    assert_eq!(
        pivot[1].y_values_array,
        vec![(vec![json!("a")], json!(10)), (vec![json!("b")], json!(20))]
    );
}

#[test]
fn test_null_dimension_values_group_together() {
    let query = NormalizedQuery {
        measures: vec!["Orders.count".into()],
        dimensions: vec!["Orders.status".into()],
        ..Default::default()
    };
    let chart = result_set(
        query,
        json!([
            { "Orders.status": null, "Orders.count": 1 },
            { "Orders.status": "", "Orders.count": 2 }
        ]),
    )
    .chart_pivot(None)
    .unwrap();
    let labels: Vec<&str> = chart.iter().map(|row| row.x.as_str()).collect();
    assert_eq!(labels, vec!["∅", "[Empty string]"]);
}

#[test]
fn test_data_range_without_date_range() {
    let query = NormalizedQuery {
        measures: vec!["Orders.count".into()],
        time_dimensions: vec![TimeDimension::new("Orders.createdAt").with_granularity("month")],
        ..Default::default()
    };
    let result = result_set(
        query,
        json!([
            { "Orders.createdAt.month": "2020-03-01T00:00:00.000", "Orders.count": 1 },
            { "Orders.createdAt.month": "2020-01-01T00:00:00.000", "Orders.count": 4 }
        ]),
    );

    // Without a date range nothing is filled unless asked for
    assert_eq!(result.pivot(None).unwrap().len(), 2);

    let input = PivotConfigInput::default().with_fill_missing_dates(true);
    let x: Vec<Value> = result
        .pivot(Some(&input))
        .unwrap()
        .into_iter()
        .map(|row| row.x_values[0].clone())
        .collect();
    assert_eq!(
        x,
        vec![
            json!("2020-01-01T00:00:00.000"),
            json!("2020-02-01T00:00:00.000"),
            json!("2020-03-01T00:00:00.000"),
        ]
    );
}

#[test]
fn test_empty_measure_values_are_filled() {
    let query = NormalizedQuery {
        measures: vec!["Orders.count".into()],
        dimensions: vec!["Orders.status".into()],
        ..Default::default()
    };
    let result = result_set(
        query,
        json!([
            { "Orders.status": "a", "Orders.count": "" },
            { "Orders.status": "b", "Orders.count": "7" }
        ]),
    );

    let values = |input: Option<&PivotConfigInput>| -> Vec<Value> {
        result
            .pivot(input)
            .unwrap()
            .into_iter()
            .map(|row| row.y_values_array[0].1.clone())
            .collect()
    };
    assert_eq!(values(None), vec![json!(0), json!(7)]);

    let input = PivotConfigInput::default().with_fill_with_value(json!("n/a"));
    assert_eq!(values(Some(&input)), vec![json!("n/a"), json!(7)]);
}
