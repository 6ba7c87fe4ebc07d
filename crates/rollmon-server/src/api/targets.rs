use crate::api::{success_response, ApiError};
use crate::identity::Caller;
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use rollmon_common::types::{CreateTargetRequest, Target, UpdateTargetRequest};
use serde::Deserialize;
use utoipa::IntoParams;
use utoipa_axum::{router::OpenApiRouter, routes};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct TargetListParams {
    #[param(required = false)]
    section_id: Option<String>,
}

/// List targets, all or for one section.
#[utoipa::path(
    get,
    path = "/v1/targets",
    tag = "Targets",
    params(TargetListParams),
    responses(
        (status = 200, description = "Targets", body = Vec<Target>)
    )
)]
async fn list_targets(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<TargetListParams>,
) -> impl IntoResponse {
    match state.targets.list(params.section_id.as_deref()).await {
        Ok(targets) => success_response(StatusCode::OK, &trace_id, targets),
        Err(e) => e.to_response(&trace_id),
    }
}

/// Create a target. `created_by` defaults to the caller.
#[utoipa::path(
    post,
    path = "/v1/targets",
    tag = "Targets",
    request_body = CreateTargetRequest,
    responses(
        (status = 201, description = "Target created", body = Target),
        (status = 400, description = "Invalid target", body = ApiError)
    )
)]
async fn create_target(
    Extension(trace_id): Extension<TraceId>,
    Extension(caller): Extension<Caller>,
    State(state): State<AppState>,
    Json(mut req): Json<CreateTargetRequest>,
) -> impl IntoResponse {
    if req.created_by.is_none() {
        req.created_by = Some(caller.user_id);
    }
    match state.targets.create(req).await {
        Ok(target) => success_response(StatusCode::CREATED, &trace_id, target),
        Err(e) => e.to_response(&trace_id),
    }
}

#[utoipa::path(
    get,
    path = "/v1/targets/{id}",
    tag = "Targets",
    params(("id" = i64, Path, description = "Target id")),
    responses(
        (status = 200, description = "Target", body = Target),
        (status = 404, description = "Unknown target", body = ApiError)
    )
)]
async fn get_target(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.targets.get(id).await {
        Ok(target) => success_response(StatusCode::OK, &trace_id, target),
        Err(e) => e.to_response(&trace_id),
    }
}

/// Partially update a target. Metrics already ingested are not
/// re-evaluated.
#[utoipa::path(
    put,
    path = "/v1/targets/{id}",
    tag = "Targets",
    params(("id" = i64, Path, description = "Target id")),
    request_body = UpdateTargetRequest,
    responses(
        (status = 200, description = "Target updated", body = Target),
        (status = 400, description = "Invalid update", body = ApiError),
        (status = 404, description = "Unknown target", body = ApiError)
    )
)]
async fn update_target(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateTargetRequest>,
) -> impl IntoResponse {
    match state.targets.update(id, req).await {
        Ok(target) => success_response(StatusCode::OK, &trace_id, target),
        Err(e) => e.to_response(&trace_id),
    }
}

pub fn target_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_targets, create_target))
        .routes(routes!(get_target, update_target))
}
