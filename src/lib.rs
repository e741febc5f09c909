//! # Semgate
//!
//! The query-facing core of a semantic-layer gateway: it turns loosely shaped
//! analytics queries into canonical executable ones, and turns flat result
//! rows into pivot, chart and table views.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   Raw query (JSON)                       │
//! │   single object, or an array for data blending           │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [query]
//! ┌─────────────────────────────────────────────────────────┐
//! │   validate → filters → date ranges → compare expansion   │
//! │   NormalizedRequest + pivot query                        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [gateway]  QueryExecutor (caller supplied)
//! ┌─────────────────────────────────────────────────────────┐
//! │   rows + annotations per query                           │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [reshape]
//! ┌─────────────────────────────────────────────────────────┐
//! │   ResultSet: pivot, chart_pivot, table_pivot,            │
//! │   table_columns, series, drill_down                      │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Calendar arithmetic, relative date phrases and time series generation
//! live in [`time`]; both sides of the pipeline use it.

pub mod config;
pub mod error;
pub mod gateway;
pub mod query;
pub mod reshape;
pub mod time;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::error::{GatewayError, NormalizationError, ReshapeError, ValidationError};
    pub use crate::gateway::{Gateway, QueryExecutor, QueryOutput, QueryRewriter, RequestContext};
    pub use crate::query::{
        MemberPath, NormalizedQuery, NormalizedRequest, QueryNormalizer, QueryType,
        TimeDimension,
    };
    pub use crate::reshape::{
        Annotation, AnnotationProvider, DrillDownLocator, MemberType, PivotConfigInput,
        QueryAnnotations, ResultSet, StaticAnnotations,
    };
    pub use crate::time::{Granularity, TimeSeriesGenerator, TimeUnit};
}
