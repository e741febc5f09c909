use semgate::query::{Filter, FilterOperator, MemberFilter, NormalizedQuery, TimeDimension};
use semgate::reshape::{
    Annotation, DrillDownLocator, DrillMembersGrouped, GranularityAnnotation, LoadResult,
    MemberType, QueryAnnotations, ResultSet,
};
use semgate::time::CustomGranularity;
use serde_json::json;

fn count() -> Annotation {
    Annotation::new("Orders Count", "Count", MemberType::Number)
        .with_drill_members(["Orders.id", "Orders.title"])
}

fn result_set(query: NormalizedQuery, measure: Annotation) -> ResultSet {
    let mut annotation = QueryAnnotations::default();
    annotation.measures.insert("Orders.count".into(), measure);
    annotation.dimensions.insert(
        "Orders.status".into(),
        Annotation::new("Orders Status", "Status", MemberType::String),
    );
    annotation.time_dimensions.insert(
        "Orders.ts.two_weeks".into(),
        Annotation::new("Orders Ts", "Ts", MemberType::Time).with_granularity(
            GranularityAnnotation::custom(
                "two_weeks",
                "Two weeks",
                &CustomGranularity::new("2 weeks").with_origin("2020-08-03"),
            ),
        ),
    );
    ResultSet::from_result(LoadResult::new(query, Vec::new(), annotation))
}

fn daily(range: [&str; 2]) -> NormalizedQuery {
    NormalizedQuery {
        measures: vec!["Orders.count".into()],
        time_dimensions: vec![TimeDimension::new("Orders.ts")
            .with_granularity("day")
            .with_date_range(range[0], range[1])],
        ..Default::default()
    }
}

fn measure_filter() -> Filter {
    MemberFilter::new("Orders.count", FilterOperator::MeasureFilter).into()
}

#[test]
fn test_day_bucket() {
    let drill = result_set(daily(["2020-08-01", "2020-08-07"]), count())
        .drill_down(&DrillDownLocator::x(vec![json!("2020-08-01T00:00:00.000")]), None)
        .unwrap()
        .unwrap();

    assert!(drill.measures.is_empty());
    assert_eq!(drill.dimensions, vec!["Orders.id", "Orders.title"]);
    assert_eq!(drill.filters, vec![measure_filter()]);
    assert_eq!(
        drill.time_dimensions,
        vec![TimeDimension::new("Orders.ts")
            .with_date_range("2020-08-01T00:00:00.000", "2020-08-01T23:59:59.999")]
    );
    assert_eq!(drill.timezone, "UTC");

    let wire = serde_json::to_value(&drill).unwrap();
    assert!(wire.get("measures").is_none());
    assert!(wire.get("segments").is_none());
}

#[test]
fn test_y_dimension_becomes_equals_filter() {
    let mut query = daily(["2020-08-01", "2020-08-07"]);
    query.dimensions = vec!["Orders.status".into()];
    query.filters = vec![MemberFilter::new("Orders.city", FilterOperator::Equals)
        .with_values(["NY"])
        .into()];

    let locator = DrillDownLocator::x(vec![json!("2020-08-02T00:00:00.000")])
        .with_y_values(vec![json!("shipped"), json!("Orders.count")]);
    let drill = result_set(query, count())
        .drill_down(&locator, None)
        .unwrap()
        .unwrap();

    assert_eq!(
        drill.filters,
        vec![
            measure_filter(),
            MemberFilter::new("Orders.city", FilterOperator::Equals)
                .with_values(["NY"])
                .into(),
            MemberFilter::new("Orders.status", FilterOperator::Equals)
                .with_values(["shipped"])
                .into(),
        ]
    );
    assert_eq!(
        drill.time_dimensions[0].date_range,
        Some(["2020-08-02T00:00:00.000".to_string(), "2020-08-02T23:59:59.999".to_string()])
    );
}

#[test]
fn test_bucket_is_clamped_to_query_range() {
    let query = NormalizedQuery {
        measures: vec!["Orders.count".into()],
        time_dimensions: vec![TimeDimension::new("Orders.ts")
            .with_granularity("week")
            .with_date_range("2020-08-05", "2020-08-20")],
        ..Default::default()
    };
    let drill = result_set(query, count())
        .drill_down(&DrillDownLocator::x(vec![json!("2020-08-03T00:00:00.000")]), None)
        .unwrap()
        .unwrap();
    assert_eq!(
        drill.time_dimensions[0].date_range,
        Some(["2020-08-05T00:00:00.000".to_string(), "2020-08-09T23:59:59.999".to_string()])
    );
}

#[test]
fn test_custom_granularity_bucket() {
    let query = NormalizedQuery {
        measures: vec!["Orders.count".into()],
        time_dimensions: vec![TimeDimension::new("Orders.ts").with_granularity("two_weeks")],
        ..Default::default()
    };
    let drill = result_set(query, count())
        .drill_down(&DrillDownLocator::x(vec![json!("2020-08-03T00:00:00.000")]), None)
        .unwrap()
        .unwrap();
    assert_eq!(
        drill.time_dimensions[0].date_range,
        Some(["2020-08-03T00:00:00.000".to_string(), "2020-08-16T23:59:59.999".to_string()])
    );
}

#[test]
fn test_grouped_drill_members() {
    let grouped = DrillMembersGrouped {
        measures: vec!["Orders.amount".into()],
        dimensions: vec!["Orders.id".into()],
    };
    let drill = result_set(
        daily(["2020-08-01", "2020-08-07"]),
        count().with_drill_members_grouped(grouped),
    )
    .drill_down(&DrillDownLocator::x(vec![json!("2020-08-01T00:00:00.000")]), None)
    .unwrap()
    .unwrap();
    assert_eq!(drill.measures, vec!["Orders.amount"]);
    assert_eq!(drill.dimensions, vec!["Orders.id"]);
}

#[test]
fn test_no_drill_members() {
    let plain = Annotation::new("Orders Count", "Count", MemberType::Number);
    let drill = result_set(daily(["2020-08-01", "2020-08-07"]), plain)
        .drill_down(&DrillDownLocator::x(vec![json!("2020-08-01T00:00:00.000")]), None)
        .unwrap();
    assert_eq!(drill, None);
}

#[test]
fn test_parent_range_is_kept_without_granularity() {
    let parent = TimeDimension::new("Orders.ts").with_date_range("2020-08-01", "2020-08-31");
    let query = NormalizedQuery {
        measures: vec!["Orders.count".into()],
        dimensions: vec!["Orders.status".into()],
        time_dimensions: vec![parent.clone()],
        ..Default::default()
    };
    let drill = result_set(query, count())
        .drill_down(&DrillDownLocator::x(vec![json!("shipped")]), None)
        .unwrap()
        .unwrap();
    assert_eq!(drill.time_dimensions, vec![parent]);
    assert_eq!(drill.filters.len(), 2);
}

#[test]
fn test_empty_string_dimension_is_matched_exactly() {
    let mut query = daily(["2020-08-01", "2020-08-07"]);
    query.dimensions = vec!["Orders.status".into()];

    let locator = DrillDownLocator::x(vec![json!("2020-08-02T00:00:00.000")])
        .with_y_values(vec![json!(""), json!("Orders.count")]);
    let drill = result_set(query, count())
        .drill_down(&locator, None)
        .unwrap()
        .unwrap();

    assert_eq!(
        drill.filters,
        vec![
            measure_filter(),
            MemberFilter::new("Orders.status", FilterOperator::Equals)
                .with_values([""])
                .into(),
        ]
    );
}

#[test]
fn test_each_time_dimension_is_clamped_to_its_own_range() {
    let query = NormalizedQuery {
        measures: vec!["Orders.count".into()],
        time_dimensions: vec![
            TimeDimension::new("Orders.ts")
                .with_granularity("day")
                .with_date_range("2020-08-05T00:00:00.000", "2020-08-06T23:59:59.999"),
            TimeDimension::new("Orders.shippedAt")
                .with_granularity("day")
                .with_date_range("2020-09-01T00:00:00.000", "2020-09-30T23:59:59.999"),
        ],
        ..Default::default()
    };
    let locator = DrillDownLocator::x(vec![
        json!("2020-08-05T00:00:00.000"),
        json!("2020-09-10T00:00:00.000"),
    ]);
    let drill = result_set(query, count())
        .drill_down(&locator, None)
        .unwrap()
        .unwrap();

    assert_eq!(
        drill.time_dimensions,
        vec![
            TimeDimension::new("Orders.ts")
                .with_date_range("2020-08-05T00:00:00.000", "2020-08-05T23:59:59.999"),
            TimeDimension::new("Orders.shippedAt")
                .with_date_range("2020-09-10T00:00:00.000", "2020-09-10T23:59:59.999"),
        ]
    );
}
