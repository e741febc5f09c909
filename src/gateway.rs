//! Async request orchestration.
//!
//! ```text
//!   raw query
//!       │ QueryNormalizer
//!       ▼
//!   NormalizedRequest ──▶ QueryRewriter (optional) ──▶ renormalize
//!       │
//!       │ one task per query, bounded by max_concurrent_queries
//!       ▼
//!   ┌─────────────┐  ┌─────────────┐       ┌─────────────┐
//!   │ execute(0)  │  │ execute(1)  │  ...  │ execute(N)  │   QueryExecutor
//!   └──────┬──────┘  └──────┬──────┘       └──────┬──────┘
//!          └── annotate + transform rows ─────────┘
//!                           │ all results
//!                           ▼
//!                       ResultSet
//! ```
//!
//! Executing SQL is not this crate's business: callers plug in a
//! [`QueryExecutor`] and an [`AnnotationProvider`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::Settings;
use crate::error::GatewayError;
use crate::query::{NormalizedQuery, NormalizedRequest, QueryNormalizer, QueryType, ResponseFormat};
use crate::reshape::{
    prepare_annotation, transform_data, AnnotationProvider, CompactData, LoadResponse, LoadResult,
    ResultData, ResultSet, Row,
};
use crate::time::TimeSeriesGenerator;

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Per-request information handed to hooks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    /// Generated when absent.
    pub request_id: Option<String>,
    /// Caller identity, opaque to the gateway.
    #[serde(default)]
    pub security_context: Value,
    /// Persistent (streaming/export) requests may exceed the row ceiling.
    #[serde(default)]
    pub persistent: bool,
}

impl RequestContext {
    pub fn with_request_id(request_id: impl Into<String>) -> Self {
        Self {
            request_id: Some(request_id.into()),
            ..Default::default()
        }
    }

    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }
}

/// What an executor returns for one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutput {
    pub rows: Vec<Row>,
    /// SQL alias to member name; rows already keyed by member need none.
    #[serde(default)]
    pub alias_to_member: HashMap<String, String>,
    #[serde(default)]
    pub last_refresh_time: Option<String>,
    #[serde(default)]
    pub used_pre_aggregations: Option<Value>,
    #[serde(default)]
    pub total: Option<u64>,
}

impl QueryOutput {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Default::default()
        }
    }
}

/// Runs normalized queries against a data source.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(
        &self,
        query: &NormalizedQuery,
        context: &RequestContext,
    ) -> Result<QueryOutput, String>;
}

/// Rewrites queries before execution, e.g. to apply row-level security.
#[async_trait]
pub trait QueryRewriter: Send + Sync {
    async fn rewrite(
        &self,
        query: NormalizedQuery,
        context: &RequestContext,
    ) -> Result<NormalizedQuery, String>;
}

/// Normalizes, executes and reshapes requests.
pub struct Gateway {
    settings: Settings,
    normalizer: QueryNormalizer,
    executor: Arc<dyn QueryExecutor>,
    annotations: Arc<dyn AnnotationProvider>,
    rewriter: Option<Arc<dyn QueryRewriter>>,
    limiter: Arc<Semaphore>,
}

impl Gateway {
    pub fn new(
        settings: &Settings,
        executor: Arc<dyn QueryExecutor>,
        annotations: Arc<dyn AnnotationProvider>,
    ) -> Self {
        Self {
            settings: settings.clone(),
            normalizer: QueryNormalizer::new(&settings.query),
            executor,
            annotations,
            rewriter: None,
            limiter: Arc::new(Semaphore::new(settings.gateway.max_concurrent_queries.max(1))),
        }
    }

    pub fn with_rewriter(mut self, rewriter: Arc<dyn QueryRewriter>) -> Self {
        self.rewriter = Some(rewriter);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Normalize a request and apply the rewrite hook, without executing it.
    pub async fn normalize(
        &self,
        raw: &Value,
        context: &RequestContext,
    ) -> GatewayResult<NormalizedRequest> {
        let now = Utc::now();
        let request = self.normalizer.normalize_at(raw, context.persistent, now)?;
        let Some(rewriter) = &self.rewriter else {
            return Ok(request);
        };

        let (query_type, queries, _) = request.into_parts();
        let mut rewritten = Vec::with_capacity(queries.len());
        for query in queries {
            let query = rewriter
                .rewrite(query, context)
                .await
                .map_err(GatewayError::Rewrite)?;
            rewritten.push(query);
        }
        debug!(queries = rewritten.len(), "Queries rewritten");

        Ok(self
            .normalizer
            .renormalize(query_type, rewritten, context.persistent, now)?)
    }

    /// Run a request end to end.
    pub async fn load(&self, raw: &Value, context: &RequestContext) -> GatewayResult<ResultSet> {
        let request_id = context
            .request_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut context = context.clone();
        context.request_id = Some(request_id.clone());

        let span = info_span!("load", request_id = %request_id);
        async move {
            let started = Instant::now();
            let (query_type, queries, pivot_query) = self.normalize(raw, &context).await?.into_parts();
            info!(query_type = %query_type, queries = queries.len(), "Load request");

            let results = join_all(
                queries
                    .iter()
                    .enumerate()
                    .map(|(index, query)| self.run(index, query, query_type, &context)),
            )
            .await
            .into_iter()
            .collect::<GatewayResult<Vec<_>>>()?;

            info!(
                duration_ms = started.elapsed().as_millis() as u64,
                "Load request succeeded"
            );

            let generator = TimeSeriesGenerator::new(&self.settings.time_series);
            Ok(ResultSet::new(LoadResponse {
                query_type,
                results,
                pivot_query,
            })
            .with_time_series(generator))
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        index: usize,
        query: &NormalizedQuery,
        query_type: QueryType,
        context: &RequestContext,
    ) -> GatewayResult<LoadResult> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|e| GatewayError::Execution {
                query_index: index,
                message: e.to_string(),
            })?;

        let started = Instant::now();
        let output = self
            .executor
            .execute(query, context)
            .await
            .map_err(|message| {
                warn!(query_index = index, error = %message, "Query execution failed");
                GatewayError::Execution {
                    query_index: index,
                    message,
                }
            })?;
        debug!(
            query_index = index,
            rows = output.rows.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Query executed"
        );

        let annotation = prepare_annotation(self.annotations.as_ref(), query);
        let rows = transform_data(
            &output.alias_to_member,
            &annotation,
            &output.rows,
            query,
            query_type,
        )?;
        let data = match query.response_format {
            Some(ResponseFormat::Compact) => ResultData::Compact(CompactData::from_rows(&rows)),
            _ => ResultData::Rows(rows),
        };

        Ok(LoadResult {
            query: query.clone(),
            data,
            annotation,
            last_refresh_time: output.last_refresh_time,
            used_pre_aggregations: output.used_pre_aggregations,
            total: output.total,
        })
    }
}
