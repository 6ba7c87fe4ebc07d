use crate::api::{error_response, success_empty_response, success_response, ApiError};
use crate::identity::Caller;
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use rollmon_common::notification::{
    CreateTemplateRequest, Notification, NotificationTarget, NotificationTemplate,
    UpdateTemplateRequest,
};
use rollmon_notify::template::{FanOut, Variables};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct TemplateListParams {
    #[param(required = false)]
    category: Option<String>,
}

/// Raise a named event. With `target_users` one notification is created per
/// user and template, otherwise one per role in `target_roles`, otherwise a
/// single broadcast per template.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateFromEventRequest {
    pub event: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: Variables,
    #[serde(default)]
    pub target_users: Option<Vec<String>>,
    #[serde(default)]
    pub target_roles: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ExpandTemplateRequest {
    #[serde(default)]
    #[schema(value_type = Object)]
    pub variables: Variables,
    #[serde(default)]
    pub target_user_id: Option<String>,
    #[serde(default)]
    pub target_role: Option<String>,
}

#[utoipa::path(
    get,
    path = "/v1/templates",
    tag = "Templates",
    params(TemplateListParams),
    responses(
        (status = 200, description = "Templates", body = Vec<NotificationTemplate>)
    )
)]
async fn list_templates(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<TemplateListParams>,
) -> impl IntoResponse {
    match state.templates.list(params.category.as_deref()).await {
        Ok(templates) => success_response(StatusCode::OK, &trace_id, templates),
        Err(e) => e.to_response(&trace_id),
    }
}

#[utoipa::path(
    post,
    path = "/v1/templates",
    tag = "Templates",
    request_body = CreateTemplateRequest,
    responses(
        (status = 201, description = "Template created", body = NotificationTemplate),
        (status = 400, description = "Invalid template", body = ApiError)
    )
)]
async fn create_template(
    Extension(trace_id): Extension<TraceId>,
    Extension(caller): Extension<Caller>,
    State(state): State<AppState>,
    Json(mut req): Json<CreateTemplateRequest>,
) -> impl IntoResponse {
    if req.created_by.is_none() {
        req.created_by = Some(caller.user_id);
    }
    match state.templates.create(req).await {
        Ok(template) => success_response(StatusCode::CREATED, &trace_id, template),
        Err(e) => e.to_response(&trace_id),
    }
}

#[utoipa::path(
    put,
    path = "/v1/templates/{id}",
    tag = "Templates",
    params(("id" = i64, Path, description = "Template id")),
    request_body = UpdateTemplateRequest,
    responses(
        (status = 200, description = "Template updated", body = NotificationTemplate),
        (status = 400, description = "Invalid update", body = ApiError),
        (status = 404, description = "Unknown template", body = ApiError)
    )
)]
async fn update_template(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateTemplateRequest>,
) -> impl IntoResponse {
    match state.templates.update(id, req).await {
        Ok(template) => success_response(StatusCode::OK, &trace_id, template),
        Err(e) => e.to_response(&trace_id),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/templates/{id}",
    tag = "Templates",
    params(("id" = i64, Path, description = "Template id")),
    responses(
        (status = 200, description = "Template deleted"),
        (status = 404, description = "Unknown template", body = ApiError)
    )
)]
async fn delete_template(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.templates.delete(id).await {
        Ok(()) => success_empty_response(StatusCode::OK, &trace_id, "Template deleted"),
        Err(e) => e.to_response(&trace_id),
    }
}

/// Render one template into a stored notification. `data` is null when the
/// template is missing or inactive.
#[utoipa::path(
    post,
    path = "/v1/templates/{id}/expand",
    tag = "Templates",
    params(("id" = i64, Path, description = "Template id")),
    request_body = ExpandTemplateRequest,
    responses(
        (status = 200, description = "Created notification, or none", body = Option<Notification>),
        (status = 400, description = "Both a user and a role given", body = ApiError)
    )
)]
async fn expand_template(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<ExpandTemplateRequest>,
) -> impl IntoResponse {
    let target = match NotificationTarget::from_parts(req.target_user_id, req.target_role) {
        Ok(target) => target,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &trace_id, "bad_request", &msg),
    };
    match state.templates.expand(id, &req.variables, target).await {
        Ok(created) => success_response(StatusCode::OK, &trace_id, created),
        Err(e) => e.to_response(&trace_id),
    }
}

/// Generate notifications from every active template listening on `event`
/// whose conditions match `data`.
#[utoipa::path(
    post,
    path = "/v1/templates/generate",
    tag = "Templates",
    request_body = GenerateFromEventRequest,
    responses(
        (status = 200, description = "Created notifications", body = Vec<Notification>),
        (status = 400, description = "Missing event name", body = ApiError)
    )
)]
async fn generate_from_event(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(req): Json<GenerateFromEventRequest>,
) -> impl IntoResponse {
    if req.event.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "bad_request",
            "event must not be empty",
        );
    }
    let fan_out = FanOut::from_lists(req.target_users, req.target_roles);
    match state
        .templates
        .generate_from_event(&req.event, &req.data, &fan_out)
        .await
    {
        Ok(created) => success_response(StatusCode::OK, &trace_id, created),
        Err(e) => e.to_response(&trace_id),
    }
}

pub fn template_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_templates, create_template))
        .routes(routes!(update_template, delete_template))
        .routes(routes!(expand_template))
        .routes(routes!(generate_from_event))
}
