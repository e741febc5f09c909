//! Filter trees and their normalization.
//!
//! Clients send filters as loosely-shaped JSON:
//!
//! ```text
//! { "dimension": "Orders.status", "operator": "equals", "values": ["shipped", 1] }
//! { "or": [ { "member": ... }, { "and": [ ... ] } ] }
//! ```
//!
//! Normalization checks every node, rewrites `dimension` to `member`,
//! stringifies values, and recurses into groups. Order is preserved.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::member;
use crate::error::{ValidationError, ValidationIssue};

/// Filter operators accepted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    NotStartsWith,
    EndsWith,
    NotEndsWith,
    In,
    NotIn,
    Gt,
    Gte,
    Lt,
    Lte,
    Set,
    NotSet,
    InDateRange,
    NotInDateRange,
    OnTheDate,
    BeforeDate,
    BeforeOrOnDate,
    AfterDate,
    AfterOrOnDate,
    MeasureFilter,
}

/// How many values an operator takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueArity {
    /// Values are optional and kept when given.
    Optional,
    AtLeastOne,
    OneOrTwo,
    ExactlyOne,
}

impl FilterOperator {
    pub fn from_str(s: &str) -> Option<Self> {
        let op = match s {
            "equals" => FilterOperator::Equals,
            "notEquals" => FilterOperator::NotEquals,
            "contains" => FilterOperator::Contains,
            "notContains" => FilterOperator::NotContains,
            "startsWith" => FilterOperator::StartsWith,
            "notStartsWith" => FilterOperator::NotStartsWith,
            "endsWith" => FilterOperator::EndsWith,
            "notEndsWith" => FilterOperator::NotEndsWith,
            "in" => FilterOperator::In,
            "notIn" => FilterOperator::NotIn,
            "gt" => FilterOperator::Gt,
            "gte" => FilterOperator::Gte,
            "lt" => FilterOperator::Lt,
            "lte" => FilterOperator::Lte,
            "set" => FilterOperator::Set,
            "notSet" => FilterOperator::NotSet,
            "inDateRange" => FilterOperator::InDateRange,
            "notInDateRange" => FilterOperator::NotInDateRange,
            "onTheDate" => FilterOperator::OnTheDate,
            "beforeDate" => FilterOperator::BeforeDate,
            "beforeOrOnDate" => FilterOperator::BeforeOrOnDate,
            "afterDate" => FilterOperator::AfterDate,
            "afterOrOnDate" => FilterOperator::AfterOrOnDate,
            "measureFilter" => FilterOperator::MeasureFilter,
            _ => return None,
        };
        Some(op)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Equals => "equals",
            FilterOperator::NotEquals => "notEquals",
            FilterOperator::Contains => "contains",
            FilterOperator::NotContains => "notContains",
            FilterOperator::StartsWith => "startsWith",
            FilterOperator::NotStartsWith => "notStartsWith",
            FilterOperator::EndsWith => "endsWith",
            FilterOperator::NotEndsWith => "notEndsWith",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "notIn",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::Set => "set",
            FilterOperator::NotSet => "notSet",
            FilterOperator::InDateRange => "inDateRange",
            FilterOperator::NotInDateRange => "notInDateRange",
            FilterOperator::OnTheDate => "onTheDate",
            FilterOperator::BeforeDate => "beforeDate",
            FilterOperator::BeforeOrOnDate => "beforeOrOnDate",
            FilterOperator::AfterDate => "afterDate",
            FilterOperator::AfterOrOnDate => "afterOrOnDate",
            FilterOperator::MeasureFilter => "measureFilter",
        }
    }

    pub fn arity(&self) -> ValueArity {
        match self {
            FilterOperator::Set | FilterOperator::NotSet | FilterOperator::MeasureFilter => {
                ValueArity::Optional
            }
            FilterOperator::InDateRange
            | FilterOperator::NotInDateRange
            | FilterOperator::OnTheDate => ValueArity::OneOrTwo,
            FilterOperator::BeforeDate
            | FilterOperator::BeforeOrOnDate
            | FilterOperator::AfterDate
            | FilterOperator::AfterOrOnDate => ValueArity::ExactlyOne,
            _ => ValueArity::AtLeastOne,
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Filter {
    And { and: Vec<Filter> },
    Or { or: Vec<Filter> },
    Leaf(MemberFilter),
}

/// A condition on one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberFilter {
    pub member: String,
    pub operator: FilterOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

impl MemberFilter {
    pub fn new(member: impl Into<String>, operator: FilterOperator) -> Self {
        Self {
            member: member.into(),
            operator,
            values: None,
        }
    }

    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = Some(values.into_iter().map(Into::into).collect());
        self
    }
}

impl From<MemberFilter> for Filter {
    fn from(leaf: MemberFilter) -> Self {
        Filter::Leaf(leaf)
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Checks and canonicalizes raw filter lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterNormalizer;

impl FilterNormalizer {
    /// Normalize a raw filter list. `path` prefixes issue paths, e.g. `filters`.
    pub fn normalize(&self, filters: &[Value], path: &str) -> Result<Vec<Filter>, ValidationError> {
        let mut issues = Vec::new();
        let normalized = normalize_list(filters, path, &mut issues);
        if issues.is_empty() {
            Ok(normalized)
        } else {
            Err(ValidationError::new(issues))
        }
    }

    /// Collect issues without building anything.
    pub fn check(&self, filters: &[Value], path: &str, issues: &mut Vec<ValidationIssue>) {
        normalize_list(filters, path, issues);
    }
}

fn normalize_list(filters: &[Value], path: &str, issues: &mut Vec<ValidationIssue>) -> Vec<Filter> {
    filters
        .iter()
        .enumerate()
        .filter_map(|(i, value)| normalize_node(value, &format!("{}[{}]", path, i), issues))
        .collect()
}

fn normalize_node(value: &Value, path: &str, issues: &mut Vec<ValidationIssue>) -> Option<Filter> {
    let Some(obj) = value.as_object() else {
        issues.push(ValidationIssue::new(path, "must be an object"));
        return None;
    };

    match (obj.get("and"), obj.get("or")) {
        (Some(_), Some(_)) => {
            issues.push(ValidationIssue::new(path, "must contain only one of and, or"));
            None
        }
        (Some(children), None) => {
            check_group_keys(obj, "and", path, issues);
            let children = group_children(children, &format!("{}.and", path), issues)?;
            Some(Filter::And { and: children })
        }
        (None, Some(children)) => {
            check_group_keys(obj, "or", path, issues);
            let children = group_children(children, &format!("{}.or", path), issues)?;
            Some(Filter::Or { or: children })
        }
        (None, None) => normalize_leaf(obj, path, issues).map(Filter::Leaf),
    }
}

fn check_group_keys(
    obj: &Map<String, Value>,
    group: &str,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    for key in obj.keys().filter(|k| k.as_str() != group) {
        issues.push(ValidationIssue::new(
            format!("{}.{}", path, key),
            "is not allowed in a logical group",
        ));
    }
}

fn group_children(
    value: &Value,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<Vec<Filter>> {
    match value.as_array() {
        Some(children) => Some(normalize_list(children, path, issues)),
        None => {
            issues.push(ValidationIssue::new(path, "must be an array"));
            None
        }
    }
}

fn normalize_leaf(
    obj: &Map<String, Value>,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<MemberFilter> {
    let before = issues.len();

    for key in obj.keys() {
        if !matches!(key.as_str(), "member" | "dimension" | "operator" | "values") {
            issues.push(ValidationIssue::new(format!("{}.{}", path, key), "is not allowed"));
        }
    }

    let member = match (obj.get("member"), obj.get("dimension")) {
        (Some(_), Some(_)) => {
            issues.push(ValidationIssue::new(path, "must contain only one of member, dimension"));
            None
        }
        (None, None) => {
            issues.push(ValidationIssue::new(path, "must contain one of member, dimension"));
            None
        }
        (Some(m), None) => member_name(m, &format!("{}.member", path), issues),
        (None, Some(d)) => member_name(d, &format!("{}.dimension", path), issues),
    };

    let operator = match obj.get("operator") {
        None | Some(Value::Null) => {
            issues.push(ValidationIssue::new(
                format!("{}.operator", path),
                "Operator required for filter",
            ));
            None
        }
        Some(Value::String(op)) => match FilterOperator::from_str(op) {
            Some(op) => Some(op),
            None => {
                issues.push(ValidationIssue::new(
                    format!("{}.operator", path),
                    format!("Operator {} not supported", op),
                ));
                None
            }
        },
        Some(_) => {
            issues.push(ValidationIssue::new(format!("{}.operator", path), "must be a string"));
            None
        }
    };

    let values_path = format!("{}.values", path);
    let values = match obj.get("values") {
        None | Some(Value::Null) => None,
        Some(Value::Array(values)) => Some(stringify_values(values, &values_path, issues)),
        Some(_) => {
            issues.push(ValidationIssue::new(&values_path, "must be an array"));
            None
        }
    };

    if let Some(op) = operator {
        check_arity(op, values.as_deref(), &values_path, issues);
    }

    if issues.len() > before {
        return None;
    }
    Some(MemberFilter {
        member: member?,
        operator: operator?,
        values,
    })
}

fn member_name(value: &Value, path: &str, issues: &mut Vec<ValidationIssue>) -> Option<String> {
    match value.as_str() {
        Some(name) if member::is_dimension(name) => Some(name.to_string()),
        Some(_) => {
            issues.push(ValidationIssue::new(path, "must match <cube>.<member>"));
            None
        }
        None => {
            issues.push(ValidationIssue::new(path, "must be a string"));
            None
        }
    }
}

fn stringify_values(values: &[Value], path: &str, issues: &mut Vec<ValidationIssue>) -> Vec<String> {
    values
        .iter()
        .enumerate()
        .filter_map(|(i, value)| match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => {
                issues.push(ValidationIssue::new(
                    format!("{}[{}]", path, i),
                    "must be a string, number or boolean",
                ));
                None
            }
        })
        .collect()
}

fn check_arity(
    op: FilterOperator,
    values: Option<&[String]>,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    let count = values.map(|v| v.len());
    let problem = match (op.arity(), count) {
        (ValueArity::Optional, _) => None,
        (_, None) | (_, Some(0)) => Some("Values required for filter".to_string()),
        (ValueArity::OneOrTwo, Some(n)) if n > 2 => {
            Some(format!("Operator {} takes one or two values", op))
        }
        (ValueArity::ExactlyOne, Some(n)) if n != 1 => {
            Some(format!("Operator {} takes exactly one value", op))
        }
        _ => None,
    };
    if let Some(reason) = problem {
        issues.push(ValidationIssue::new(path, reason));
    }
}
