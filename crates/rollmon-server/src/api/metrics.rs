use crate::api::pagination::PaginationParams;
use crate::api::{success_response, ApiError};
use crate::logging::TraceId;
use crate::services::Ingestion;
use crate::state::AppState;
use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use rollmon_common::types::{MetricRecord, SubmitMetricRequest};
use serde::Deserialize;
use utoipa::IntoParams;
use utoipa_axum::{router::OpenApiRouter, routes};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct MetricListParams {
    /// Only metrics from this section.
    #[param(required = false)]
    section_id: Option<String>,
}

/// Submit one production measurement. The metric is evaluated against the
/// target effective now; any alerts raised are returned with it.
#[utoipa::path(
    post,
    path = "/v1/metrics",
    tag = "Metrics",
    request_body = SubmitMetricRequest,
    responses(
        (status = 201, description = "Metric stored and evaluated", body = Ingestion),
        (status = 400, description = "Invalid metric", body = ApiError),
        (status = 500, description = "Storage failure, nothing evaluated", body = ApiError)
    )
)]
async fn submit_metric(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(req): Json<SubmitMetricRequest>,
) -> impl IntoResponse {
    match state.monitor.submit_metric(req).await {
        Ok(ingestion) => success_response(StatusCode::CREATED, &trace_id, ingestion),
        Err(e) => e.to_response(&trace_id),
    }
}

/// List metrics, newest first.
#[utoipa::path(
    get,
    path = "/v1/metrics",
    tag = "Metrics",
    params(MetricListParams, PaginationParams),
    responses(
        (status = 200, description = "Metrics", body = Vec<MetricRecord>)
    )
)]
async fn list_metrics(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<MetricListParams>,
    Query(pagination): Query<PaginationParams>,
) -> impl IntoResponse {
    match state
        .monitor
        .list_metrics(
            params.section_id.as_deref(),
            pagination.limit(),
            pagination.offset(),
        )
        .await
    {
        Ok(metrics) => success_response(StatusCode::OK, &trace_id, metrics),
        Err(e) => e.to_response(&trace_id),
    }
}

pub fn metric_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(submit_metric, list_metrics))
}
