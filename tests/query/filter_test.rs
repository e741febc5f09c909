use insta::assert_snapshot;
use semgate::query::{Filter, FilterNormalizer, FilterOperator, MemberFilter, ValueArity};
use serde_json::{json, Value};

fn normalize(filters: Value) -> Result<Vec<Filter>, semgate::error::ValidationError> {
    let list = filters.as_array().cloned().unwrap_or_default();
    FilterNormalizer.normalize(&list, "filters")
}

#[test]
fn test_nested_groups_keep_shape_and_order() {
    let filters = normalize(json!([
        {
            "or": [
                { "member": "Orders.status", "operator": "equals", "values": ["shipped"] },
                {
                    "and": [
                        { "dimension": "Orders.amount", "operator": "gt", "values": [100] },
                        { "member": "Orders.city", "operator": "set" }
                    ]
                }
            ]
        },
        { "member": "Orders.count", "operator": "measureFilter" }
    ]))
    .unwrap();

    assert_eq!(
        filters,
        vec![
            Filter::Or {
                or: vec![
                    MemberFilter::new("Orders.status", FilterOperator::Equals)
                        .with_values(["shipped"])
                        .into(),
                    Filter::And {
                        and: vec![
                            MemberFilter::new("Orders.amount", FilterOperator::Gt)
                                .with_values(["100"])
                                .into(),
                            MemberFilter::new("Orders.city", FilterOperator::Set).into(),
                        ],
                    },
                ],
            },
            MemberFilter::new("Orders.count", FilterOperator::MeasureFilter).into(),
        ]
    );
}

#[test]
fn test_serializes_in_wire_shape() {
    let filters = normalize(json!([
        { "or": [{ "dimension": "Orders.status", "operator": "notEquals", "values": ["x"] }] }
    ]))
    .unwrap();
    assert_eq!(
        serde_json::to_value(&filters).unwrap(),
        json!([{ "or": [{ "member": "Orders.status", "operator": "notEquals", "values": ["x"] }] }])
    );
}

#[test]
fn test_missing_operator() {
    let err = normalize(json!([{ "member": "Orders.status", "values": ["a"] }])).unwrap_err();
    assert_snapshot!(err.to_string(), @"Invalid query format: filters[0].operator: Operator required for filter");
}

#[test]
fn test_unknown_operator() {
    let err = normalize(json!([{ "member": "Orders.status", "operator": "like", "values": ["a"] }]))
        .unwrap_err();
    assert_snapshot!(err.to_string(), @"Invalid query format: filters[0].operator: Operator like not supported");
}

#[test]
fn test_values_required() {
    let err = normalize(json!([{ "member": "Orders.status", "operator": "equals", "values": [] }]))
        .unwrap_err();
    assert_snapshot!(err.to_string(), @"Invalid query format: filters[0].values: Values required for filter");
}

#[test]
fn test_member_and_dimension_both_set() {
    let err = normalize(json!([
        { "member": "Orders.status", "dimension": "Orders.status", "operator": "set" }
    ]))
    .unwrap_err();
    assert_snapshot!(err.to_string(), @"Invalid query format: filters[0]: must contain only one of member, dimension");
}

#[test]
fn test_neither_member_nor_dimension() {
    let err = normalize(json!([{ "operator": "set" }])).unwrap_err();
    assert_snapshot!(err.to_string(), @"Invalid query format: filters[0]: must contain one of member, dimension");
}

#[test]
fn test_issues_in_groups_have_nested_paths() {
    let err = normalize(json!([
        { "and": [{ "member": "Orders.status", "operator": "equals" }] }
    ]))
    .unwrap_err();
    assert_eq!(err.issues[0].path, "filters[0].and[0].values");
}

#[test]
fn test_date_operator_arity() {
    assert_eq!(FilterOperator::InDateRange.arity(), ValueArity::OneOrTwo);
    assert_eq!(FilterOperator::BeforeDate.arity(), ValueArity::ExactlyOne);
    assert_eq!(FilterOperator::NotSet.arity(), ValueArity::Optional);

    let err = normalize(json!([
        { "member": "Orders.createdAt", "operator": "beforeDate", "values": ["2021-01-01", "2021-02-01"] }
    ]))
    .unwrap_err();
    assert_snapshot!(err.to_string(), @"Invalid query format: filters[0].values: Operator beforeDate takes exactly one value");
}

#[test]
fn test_operator_names_round_trip() {
    for name in ["equals", "notStartsWith", "inDateRange", "afterOrOnDate", "measureFilter"] {
        let op = FilterOperator::from_str(name).unwrap();
        assert_eq!(op.as_str(), name);
        assert_eq!(serde_json::to_value(op).unwrap(), json!(name));
    }
}
