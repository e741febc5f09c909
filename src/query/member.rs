//! Member path parsing.
//!
//! Members are addressed as `<cube>.<field>`. Dimensions may carry an
//! embedded granularity (`<cube>.<field>.<granularity>`), the legacy way of
//! asking for a time dimension.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static SEGMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").unwrap());

/// A parsed member reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberPath {
    pub cube: String,
    pub field: String,
    pub granularity: Option<String>,
}

impl MemberPath {
    /// Parse `cube.field` or `cube.field.granularity`.
    pub fn parse(s: &str) -> Option<Self> {
        let segments: Vec<&str> = s.split('.').collect();
        if !segments.iter().all(|seg| SEGMENT.is_match(seg)) {
            return None;
        }
        match segments.as_slice() {
            [cube, field] => Some(Self {
                cube: cube.to_string(),
                field: field.to_string(),
                granularity: None,
            }),
            [cube, field, granularity] => Some(Self {
                cube: cube.to_string(),
                field: field.to_string(),
                granularity: Some(granularity.to_string()),
            }),
            _ => None,
        }
    }

    /// `cube.field`, without any granularity.
    pub fn member(&self) -> String {
        format!("{}.{}", self.cube, self.field)
    }
}

impl fmt::Display for MemberPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.granularity {
            Some(granularity) => write!(f, "{}.{}.{}", self.cube, self.field, granularity),
            None => write!(f, "{}.{}", self.cube, self.field),
        }
    }
}

/// A plain `cube.field` reference.
pub fn is_member(s: &str) -> bool {
    MemberPath::parse(s).is_some_and(|path| path.granularity.is_none())
}

/// A dimension reference, with or without embedded granularity.
pub fn is_dimension(s: &str) -> bool {
    MemberPath::parse(s).is_some()
}

/// A granularity name (`day`, `fiscal_quarter`).
pub fn is_granularity_name(s: &str) -> bool {
    SEGMENT.is_match(s)
}

/// Key under which a time dimension's bucketed values appear in rows.
pub fn time_dimension_member(dimension: &str, granularity: &str) -> String {
    format!("{}.{}", dimension, granularity)
}
