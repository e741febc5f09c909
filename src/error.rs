//! Error types for the gateway core.
//!
//! Three user-facing kinds come out of normalization:
//! - [`ValidationError`]: the query has the wrong shape
//! - [`NormalizationError::InvalidQuery`]: well-formed but inconsistent
//! - [`InvalidDateExpression`]: a date phrase that cannot be parsed
//!
//! All of them are terminal for the request. Nothing in this crate retries.

use std::fmt;

use thiserror::Error;

/// Result type for normalization.
pub type NormalizationResult<T> = Result<T, NormalizationError>;

/// Result type for reshaping.
pub type ReshapeResult<T> = Result<T, ReshapeError>;

/// A single structural problem found in a raw query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// JSON-ish path to the offending value, e.g. `filters[0].operator`.
    pub path: String,
    pub reason: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.reason)
        } else {
            write!(f, "{}: {}", self.path, self.reason)
        }
    }
}

/// The raw query does not match the accepted shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    pub fn single(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            issues: vec![ValidationIssue::new(path, reason)],
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let issues: Vec<String> = self.issues.iter().map(|i| i.to_string()).collect();
        write!(f, "Invalid query format: {}", issues.join("; "))
    }
}

impl std::error::Error for ValidationError {}

/// A natural-language date expression that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Can't parse date: '{text}'")]
pub struct InvalidDateExpression {
    pub text: String,
}

impl InvalidDateExpression {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Errors produced while turning a raw query into normalized queries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error(transparent)]
    InvalidDate(#[from] InvalidDateExpression),
}

impl NormalizationError {
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery(message.into())
    }

    /// Every normalization failure is caused by the request itself.
    pub fn is_user_error(&self) -> bool {
        true
    }
}

/// Errors produced while reshaping results.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReshapeError {
    /// Custom granularity used without an annotation describing it.
    #[error("Granularity \"{granularity}\" not found in time dimension \"{dimension}\"")]
    UnknownGranularity {
        dimension: String,
        granularity: String,
    },

    #[error("Unsupported time granularity: {0}")]
    UnsupportedGranularity(String),

    #[error(
        "The count of generated date ranges ({count}) for the request from [{start}] to [{end}] \
         by {interval} is over limit ({limit}). Please reduce the requested date interval or use \
         bigger granularity."
    )]
    TooManyPoints {
        count: u64,
        start: String,
        end: String,
        interval: String,
        limit: u64,
    },

    #[error("Invalid interval: '{0}'")]
    InvalidInterval(String),

    #[error("Invalid timestamp: '{0}'")]
    InvalidTimestamp(String),

    #[error("{0} drillDown query is not currently supported")]
    UnsupportedDrillDown(String),

    #[error(
        "You requested hidden member: '{0}'. Please make it visible using `shown: true`"
    )]
    HiddenMember(String),

    #[error("Method is not supported for a '{0}' query type. Please use decompose")]
    UnsupportedForQueryType(String),

    #[error("Result index {index} out of range ({len} results)")]
    ResultIndex { index: usize, len: usize },
}

impl ReshapeError {
    /// Whether the failure is caused by the request rather than the data.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, Self::ResultIndex { .. })
    }
}

/// Errors surfaced by the async gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Normalization(#[from] NormalizationError),

    #[error(transparent)]
    Reshape(#[from] ReshapeError),

    /// The executor failed to run one of the request's queries.
    #[error("Error while executing query {query_index}: {message}")]
    Execution { query_index: usize, message: String },

    /// The rewrite hook rejected or broke the query.
    #[error("Query rewrite failed: {0}")]
    Rewrite(String),
}

impl GatewayError {
    /// Whether a transport should report this as a client error.
    pub fn is_user_error(&self) -> bool {
        match self {
            Self::Normalization(e) => e.is_user_error(),
            Self::Reshape(e) => e.is_user_error(),
            Self::Execution { .. } => false,
            Self::Rewrite(_) => true,
        }
    }
}
