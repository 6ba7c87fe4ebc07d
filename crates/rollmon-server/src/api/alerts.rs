use crate::api::pagination::PaginationParams;
use crate::api::{paginate, success_paginated_response, success_response, ApiError};
use crate::identity::Caller;
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use rollmon_common::types::{Alert, AlertSummary};
use rollmon_storage::AlertQuery;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct AlertListParams {
    /// Only alerts raised for this section.
    #[param(required = false)]
    section_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ResolveAlertRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

/// List alerts, newest first.
#[utoipa::path(
    get,
    path = "/v1/alerts",
    tag = "Alerts",
    params(AlertListParams, PaginationParams),
    responses(
        (status = 200, description = "Paged alerts", body = Vec<Alert>)
    )
)]
async fn list_alerts(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<AlertListParams>,
    Query(pagination): Query<PaginationParams>,
) -> impl IntoResponse {
    let query = match params.section_id {
        Some(section) => AlertQuery::section(section),
        None => AlertQuery::all(),
    };
    match state.alerts.list(&query).await {
        Ok(alerts) => {
            let (limit, offset) = (pagination.limit(), pagination.offset());
            let (items, total) = paginate(alerts, limit, offset);
            success_paginated_response(StatusCode::OK, &trace_id, items, total, limit, offset)
        }
        Err(e) => e.to_response(&trace_id),
    }
}

/// Alerts still in the `active` state, newest first.
#[utoipa::path(
    get,
    path = "/v1/alerts/active",
    tag = "Alerts",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paged active alerts", body = Vec<Alert>)
    )
)]
async fn active_alerts(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> impl IntoResponse {
    match state.alerts.list_active().await {
        Ok(alerts) => {
            let (limit, offset) = (pagination.limit(), pagination.offset());
            let (items, total) = paginate(alerts, limit, offset);
            success_paginated_response(StatusCode::OK, &trace_id, items, total, limit, offset)
        }
        Err(e) => e.to_response(&trace_id),
    }
}

/// Alert counts by status and severity.
#[utoipa::path(
    get,
    path = "/v1/alerts/summary",
    tag = "Alerts",
    responses(
        (status = 200, description = "Alert summary", body = AlertSummary)
    )
)]
async fn alert_summary(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.alerts.summary().await {
        Ok(summary) => success_response(StatusCode::OK, &trace_id, summary),
        Err(e) => e.to_response(&trace_id),
    }
}

/// Acknowledge an alert as the caller. Resolved alerts are returned
/// unchanged.
#[utoipa::path(
    post,
    path = "/v1/alerts/{id}/acknowledge",
    tag = "Alerts",
    params(("id" = i64, Path, description = "Alert id")),
    responses(
        (status = 200, description = "Alert after acknowledgement", body = Alert),
        (status = 404, description = "Unknown alert", body = ApiError)
    )
)]
async fn acknowledge_alert(
    Extension(trace_id): Extension<TraceId>,
    Extension(caller): Extension<Caller>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.alerts.acknowledge(id, &caller.user_id).await {
        Ok(alert) => success_response(StatusCode::OK, &trace_id, alert),
        Err(e) => e.to_response(&trace_id),
    }
}

/// Resolve an alert as the caller. The body is optional. Resolving again
/// overwrites the earlier resolution.
#[utoipa::path(
    post,
    path = "/v1/alerts/{id}/resolve",
    tag = "Alerts",
    params(("id" = i64, Path, description = "Alert id")),
    request_body = ResolveAlertRequest,
    responses(
        (status = 200, description = "Resolved alert", body = Alert),
        (status = 404, description = "Unknown alert", body = ApiError)
    )
)]
async fn resolve_alert(
    Extension(trace_id): Extension<TraceId>,
    Extension(caller): Extension<Caller>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Option<Json<ResolveAlertRequest>>,
) -> impl IntoResponse {
    let notes = body.and_then(|Json(req)| req.notes);
    match state.alerts.resolve(id, &caller.user_id, notes).await {
        Ok(alert) => success_response(StatusCode::OK, &trace_id, alert),
        Err(e) => e.to_response(&trace_id),
    }
}

pub fn alert_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_alerts))
        .routes(routes!(active_alerts))
        .routes(routes!(alert_summary))
        .routes(routes!(acknowledge_alert))
        .routes(routes!(resolve_alert))
}
