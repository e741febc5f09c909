//! Structural validation of raw queries.
//!
//! Runs over the raw JSON before anything is deserialized, so every problem
//! is reported with a path (`timeDimensions[0].dateRange`) instead of a
//! serde error. All issues are collected, not just the first.

use chrono_tz::Tz;
use serde_json::{Map, Value};

use super::filter::FilterNormalizer;
use super::member;
use crate::error::{ValidationError, ValidationIssue};

const QUERY_KEYS: &[&str] = &[
    "measures",
    "dimensions",
    "segments",
    "timeDimensions",
    "filters",
    "order",
    "limit",
    "offset",
    "timezone",
    "renewQuery",
    "ungrouped",
    "total",
    "responseFormat",
];

const TIME_DIMENSION_KEYS: &[&str] = &["dimension", "granularity", "dateRange", "compareDateRange"];

/// Validator for the accepted query shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuerySchema;

impl QuerySchema {
    /// Validate a single (non-blending) query.
    pub fn validate(&self, query: &Value) -> Result<(), ValidationError> {
        let mut issues = Vec::new();
        self.check(query, "", &mut issues);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(issues))
        }
    }

    /// Collect the issues of one query, with paths under `prefix`.
    pub fn check(&self, query: &Value, prefix: &str, issues: &mut Vec<ValidationIssue>) {
        let Some(obj) = query.as_object() else {
            issues.push(ValidationIssue::new(prefix, "query must be an object"));
            return;
        };

        for key in obj.keys() {
            if !QUERY_KEYS.contains(&key.as_str()) {
                issues.push(ValidationIssue::new(join(prefix, key), "is not allowed"));
            }
        }

        check_members(obj, "measures", prefix, member::is_member, issues);
        check_members(obj, "dimensions", prefix, member::is_dimension, issues);
        check_members(obj, "segments", prefix, member::is_member, issues);

        if let Some(value) = obj.get("timeDimensions") {
            let path = join(prefix, "timeDimensions");
            match value.as_array() {
                Some(items) => {
                    for (i, td) in items.iter().enumerate() {
                        check_time_dimension(td, &format!("{}[{}]", path, i), issues);
                    }
                }
                None => issues.push(ValidationIssue::new(path, "must be an array")),
            }
        }

        if let Some(value) = obj.get("filters") {
            let path = join(prefix, "filters");
            match value.as_array() {
                Some(items) => FilterNormalizer.check(items, &path, issues),
                None => issues.push(ValidationIssue::new(path, "must be an array")),
            }
        }

        if let Some(value) = obj.get("order") {
            check_order(value, &join(prefix, "order"), issues);
        }

        for key in ["limit", "offset"] {
            if let Some(value) = obj.get(key) {
                if !value.is_u64() {
                    issues.push(ValidationIssue::new(
                        join(prefix, key),
                        "must be a non-negative integer",
                    ));
                }
            }
        }

        if let Some(value) = obj.get("timezone") {
            let path = join(prefix, "timezone");
            match value.as_str() {
                Some(tz) if tz.parse::<Tz>().is_ok() => {}
                Some(tz) => issues.push(ValidationIssue::new(path, format!("unknown timezone {}", tz))),
                None => issues.push(ValidationIssue::new(path, "must be a string")),
            }
        }

        for key in ["renewQuery", "ungrouped", "total"] {
            if let Some(value) = obj.get(key) {
                if !value.is_boolean() {
                    issues.push(ValidationIssue::new(join(prefix, key), "must be a boolean"));
                }
            }
        }

        if let Some(value) = obj.get("responseFormat") {
            if !matches!(value.as_str(), Some("default" | "compact")) {
                issues.push(ValidationIssue::new(
                    join(prefix, "responseFormat"),
                    "must be one of default, compact",
                ));
            }
        }
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn check_members(
    obj: &Map<String, Value>,
    key: &str,
    prefix: &str,
    is_valid: fn(&str) -> bool,
    issues: &mut Vec<ValidationIssue>,
) {
    let Some(value) = obj.get(key) else {
        return;
    };
    let path = join(prefix, key);
    let Some(items) = value.as_array() else {
        issues.push(ValidationIssue::new(path, "must be an array"));
        return;
    };
    for (i, item) in items.iter().enumerate() {
        match item.as_str() {
            Some(name) if is_valid(name) => {}
            Some(_) => issues.push(ValidationIssue::new(
                format!("{}[{}]", path, i),
                "must match <cube>.<member>",
            )),
            None => issues.push(ValidationIssue::new(format!("{}[{}]", path, i), "must be a string")),
        }
    }
}

fn check_time_dimension(value: &Value, path: &str, issues: &mut Vec<ValidationIssue>) {
    let Some(obj) = value.as_object() else {
        issues.push(ValidationIssue::new(path, "must be an object"));
        return;
    };

    for key in obj.keys() {
        if !TIME_DIMENSION_KEYS.contains(&key.as_str()) {
            issues.push(ValidationIssue::new(format!("{}.{}", path, key), "is not allowed"));
        }
    }

    match obj.get("dimension").map(Value::as_str) {
        Some(Some(name)) if member::is_member(name) => {}
        Some(Some(_)) => issues.push(ValidationIssue::new(
            format!("{}.dimension", path),
            "must match <cube>.<member>",
        )),
        Some(None) => issues.push(ValidationIssue::new(
            format!("{}.dimension", path),
            "must be a string",
        )),
        None => issues.push(ValidationIssue::new(
            format!("{}.dimension", path),
            "is required",
        )),
    }

    match obj.get("granularity") {
        None | Some(Value::Null) => {}
        Some(Value::String(g)) if member::is_granularity_name(g) => {}
        Some(_) => issues.push(ValidationIssue::new(
            format!("{}.granularity", path),
            "must be a granularity name",
        )),
    }

    let date_range = obj.get("dateRange").filter(|v| !v.is_null());
    let compare = obj.get("compareDateRange").filter(|v| !v.is_null());

    if date_range.is_some() && compare.is_some() {
        issues.push(ValidationIssue::new(
            path,
            "must contain only one of dateRange, compareDateRange",
        ));
    }

    if let Some(range) = date_range {
        check_date_range(range, &format!("{}.dateRange", path), issues);
    }

    if let Some(ranges) = compare {
        let compare_path = format!("{}.compareDateRange", path);
        match ranges.as_array() {
            Some(items) if !items.is_empty() => {
                for (i, range) in items.iter().enumerate() {
                    check_date_range(range, &format!("{}[{}]", compare_path, i), issues);
                }
            }
            _ => issues.push(ValidationIssue::new(compare_path, "must be a non-empty array")),
        }
    }
}

fn check_date_range(value: &Value, path: &str, issues: &mut Vec<ValidationIssue>) {
    match value {
        Value::String(_) => {}
        Value::Array(items) if (1..=2).contains(&items.len()) => {
            if !items.iter().all(Value::is_string) {
                issues.push(ValidationIssue::new(path, "must contain only strings"));
            }
        }
        _ => issues.push(ValidationIssue::new(
            path,
            "must be a string or an array of one or two strings",
        )),
    }
}

fn check_order(value: &Value, path: &str, issues: &mut Vec<ValidationIssue>) {
    let direction_ok = |v: &Value| matches!(v.as_str(), Some("asc" | "desc" | "none"));
    match value {
        Value::Object(map) => {
            for (key, direction) in map {
                if !member::is_dimension(key) {
                    issues.push(ValidationIssue::new(
                        format!("{}.{}", path, key),
                        "must match <cube>.<member>",
                    ));
                }
                if !direction_ok(direction) {
                    issues.push(ValidationIssue::new(
                        format!("{}.{}", path, key),
                        "must be one of asc, desc, none",
                    ));
                }
            }
        }
        Value::Array(pairs) => {
            for (i, pair) in pairs.iter().enumerate() {
                let item_path = format!("{}[{}]", path, i);
                match pair.as_array().map(Vec::as_slice) {
                    Some([Value::String(name), direction]) => {
                        if !member::is_dimension(name) {
                            issues.push(ValidationIssue::new(
                                format!("{}[0]", item_path),
                                "must match <cube>.<member>",
                            ));
                        }
                        if !direction_ok(direction) {
                            issues.push(ValidationIssue::new(
                                format!("{}[1]", item_path),
                                "must be one of asc, desc, none",
                            ));
                        }
                    }
                    _ => issues.push(ValidationIssue::new(
                        item_path,
                        "must be a [member, direction] pair",
                    )),
                }
            }
        }
        _ => issues.push(ValidationIssue::new(path, "must be an object or an array of pairs")),
    }
}
