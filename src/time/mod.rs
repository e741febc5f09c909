//! Calendar arithmetic, date range resolution and time series generation.
//!
//! All timestamps handled here are zone-less wall-clock times. A request
//! timezone only matters when "now" is needed to resolve a relative
//! expression.

pub mod date_range;
pub mod datetime;
pub mod granularity;
pub mod interval;
pub mod series;

pub use date_range::{
    resolve_date_expression, DateExpressionParser, DateRangeInput, DateRangeResolver, ParsedDate,
    RelativeDateParser,
};
pub use datetime::{format_timestamp, is_date_only, parse_timestamp, TIMESTAMP_FORMAT};
pub use granularity::{Granularity, TimeUnit};
pub use interval::Interval;
pub use series::{CustomGranularity, TimeSeriesGenerator};
