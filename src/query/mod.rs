//! Query model and normalization.
//!
//! - [`member`]: member path parsing
//! - [`types`]: raw and normalized query types
//! - [`filter`]: filter trees and their normalization
//! - [`schema`]: structural validation of raw JSON
//! - [`normalize`]: the [`QueryNormalizer`]

pub mod filter;
pub mod member;
pub mod normalize;
pub mod schema;
pub mod types;

pub use filter::{Filter, FilterNormalizer, FilterOperator, MemberFilter, ValueArity};
pub use member::MemberPath;
pub use normalize::{
    expand_compare_date_range, pivot_query, QueryNormalizer, BLENDING_TIME_DIMENSION,
    COMPARE_DATE_RANGE_DIMENSION,
};
pub use schema::QuerySchema;
pub use types::{
    NormalizedQueries, NormalizedQuery, NormalizedRequest, OrderDirection, OrderInput, PivotQuery,
    QueryInput, QueryType, ResponseFormat, TimeDimension, TimeDimensionInput,
};
