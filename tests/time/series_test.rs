use semgate::config::TimeSeriesSettings;
use semgate::error::ReshapeError;
use semgate::time::{CustomGranularity, Granularity, Interval, TimeSeriesGenerator, TimeUnit};

fn range(start: &str, end: &str) -> [String; 2] {
    [start.to_string(), end.to_string()]
}

#[test]
fn test_month_series_for_a_year() {
    let series = TimeSeriesGenerator::default()
        .generate(
            &Granularity::Standard(TimeUnit::Month),
            &range("2015-01-01", "2015-12-31"),
            true,
            None,
        )
        .unwrap();
    assert_eq!(series.len(), 12);
    assert_eq!(series.first().unwrap(), "2015-01-01T00:00:00.000");
    assert_eq!(series.last().unwrap(), "2015-12-01T00:00:00.000");
}

#[test]
fn test_week_series_starts_on_monday() {
    let series = TimeSeriesGenerator::default()
        .generate(
            &Granularity::Standard(TimeUnit::Week),
            &range("2021-03-03", "2021-03-20"),
            true,
            None,
        )
        .unwrap();
    assert_eq!(
        series,
        vec![
            "2021-03-01T00:00:00.000",
            "2021-03-08T00:00:00.000",
            "2021-03-15T00:00:00.000",
        ]
    );
}

#[test]
fn test_hour_series_without_padding() {
    let series = TimeSeriesGenerator::default()
        .generate(
            &Granularity::Standard(TimeUnit::Hour),
            &range("2021-03-17T10:15:00.000", "2021-03-17T12:59:59.999"),
            false,
            None,
        )
        .unwrap();
    assert_eq!(
        series,
        vec![
            "2021-03-17T10:00:00.000",
            "2021-03-17T11:00:00.000",
            "2021-03-17T12:00:00.000",
        ]
    );
}

#[test]
fn test_custom_interval_anchored_to_origin() {
    let definition = CustomGranularity::new("2 months").with_origin("2019-01-01");
    let series = TimeSeriesGenerator::default()
        .generate(
            &Granularity::parse("two_months"),
            &range("2021-01-01", "2021-12-31"),
            false,
            Some(&definition),
        )
        .unwrap();
    assert_eq!(
        series,
        vec![
            "2021-01-01T00:00:00.000",
            "2021-03-01T00:00:00.000",
            "2021-05-01T00:00:00.000",
            "2021-07-01T00:00:00.000",
            "2021-09-01T00:00:00.000",
            "2021-11-01T00:00:00.000",
        ]
    );
}

#[test]
fn test_custom_interval_starts_before_range() {
    let definition = CustomGranularity::new("1 year").with_offset("3 months");
    let series = TimeSeriesGenerator::default()
        .generate(
            &Granularity::parse("fiscal_year"),
            &range("2020-01-01", "2021-12-31"),
            false,
            Some(&definition),
        )
        .unwrap();
    assert_eq!(
        series,
        vec![
            "2019-04-01T00:00:00.000",
            "2020-04-01T00:00:00.000",
            "2021-04-01T00:00:00.000",
        ]
    );
}

#[test]
fn test_point_limit() {
    let generator = TimeSeriesGenerator::new(&TimeSeriesSettings { max_points: 100 });
    let err = generator
        .generate(
            &Granularity::Standard(TimeUnit::Hour),
            &range("2021-01-01", "2021-01-31"),
            true,
            None,
        )
        .unwrap_err();
    assert!(matches!(err, ReshapeError::TooManyPoints { limit: 100, .. }));
}

#[test]
fn test_invalid_bound() {
    let err = TimeSeriesGenerator::default()
        .generate(
            &Granularity::Standard(TimeUnit::Day),
            &range("yesterday", "2021-01-31"),
            true,
            None,
        )
        .unwrap_err();
    assert_eq!(err, ReshapeError::InvalidTimestamp("yesterday".into()));
}

#[test]
fn test_interval_parsing() {
    let interval = Interval::parse("2 months 3 weeks").unwrap();
    assert_eq!(interval.to_string(), "2 months 3 weeks");
    assert!(Interval::parse("fortnight").is_err());
}
