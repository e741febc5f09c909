//! Result reshaping.
//!
//! ```text
//!   executor rows ──▶ transform ──▶ LoadResult ──┐
//!                        ▲                       ├──▶ ResultSet ──▶ pivot ──┬──▶ chart_pivot / series
//!           annotation ──┘          pivot query ─┘                          ├──▶ table_pivot / table_columns
//!                                                                           └──▶ drill_down
//! ```

pub mod annotation;
pub mod drill_down;
pub mod pivot_config;
pub mod result_set;
pub mod transform;
pub mod views;

pub use annotation::{
    prepare_annotation, Annotation, AnnotationProvider, DrillMembersGrouped, GranularityAnnotation,
    MemberKind, MemberType, QueryAnnotations, StaticAnnotations,
};
pub use drill_down::{DrillDownLocator, DrillDownQuery};
pub use pivot_config::{normalize_pivot_config, PivotConfig, PivotConfigInput, MEASURES_KEY};
pub use result_set::{LoadResponse, LoadResult, PivotRow, ResultSet, SerializedResult};
pub use transform::{transform_data, transform_value, CompactData, ResultData, Row, RowTransformer};
pub use views::{alias_series, ChartPivotRow, Series, SeriesName, SeriesPoint, TableColumn};
