use crate::api::pagination::PaginationParams;
use crate::api::{error_response, success_paginated_response, success_response, ApiError};
use crate::identity::Caller;
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use rollmon_common::notification::{
    Notification, NotificationDraft, NotificationPriority, NotificationTarget,
};
use rollmon_notify::stats::{NotificationStats, UnreadCount};
use rollmon_notify::visibility::NotificationFilter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

/// Notification content plus an optional audience. Without a user or role
/// the notification goes to everyone.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateNotificationRequest {
    pub title: String,
    pub message: String,
    #[serde(rename = "type", default)]
    pub notification_type: Option<String>,
    /// Derived from type and category when absent.
    #[serde(default)]
    pub priority: Option<NotificationPriority>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub target_user_id: Option<String>,
    #[serde(default)]
    pub target_role: Option<String>,
    #[serde(default)]
    pub action_required: bool,
    #[serde(default)]
    pub action_url: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub action_data: Option<Value>,
    /// Derived from the priority when absent.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: HashMap<String, Value>,
}

impl CreateNotificationRequest {
    fn into_draft(self) -> Result<NotificationDraft, String> {
        let target = NotificationTarget::from_parts(self.target_user_id, self.target_role)?;
        let defaults = NotificationDraft::default();
        Ok(NotificationDraft {
            title: self.title,
            message: self.message,
            notification_type: self
                .notification_type
                .unwrap_or(defaults.notification_type),
            priority: self.priority,
            category: self.category.unwrap_or(defaults.category),
            source: self.source,
            target,
            action_required: self.action_required,
            action_url: self.action_url,
            action_data: self.action_data,
            expires_at: self.expires_at,
            metadata: self.metadata,
        })
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct NotificationListParams {
    #[param(required = false)]
    category: Option<String>,
    #[param(required = false)]
    priority: Option<NotificationPriority>,
    /// Skip notifications already read.
    #[param(required = false)]
    unread_only: Option<bool>,
    /// Also return archived and dismissed notifications.
    #[param(required = false)]
    include_archived: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct CategoryParams {
    #[param(required = false)]
    category: Option<String>,
}

#[derive(Serialize, ToSchema)]
struct MarkedResponse {
    marked: u64,
}

/// The caller's notifications, highest priority first, newest first within
/// a priority. Expired notifications are never returned.
#[utoipa::path(
    get,
    path = "/v1/notifications",
    tag = "Notifications",
    params(NotificationListParams, PaginationParams),
    responses(
        (status = 200, description = "Paged notifications", body = Vec<Notification>)
    )
)]
async fn list_notifications(
    Extension(trace_id): Extension<TraceId>,
    Extension(caller): Extension<Caller>,
    State(state): State<AppState>,
    Query(params): Query<NotificationListParams>,
    Query(pagination): Query<PaginationParams>,
) -> impl IntoResponse {
    let filter = NotificationFilter {
        category: params.category,
        priority: params.priority,
        unread_only: params.unread_only.unwrap_or(false),
        include_archived: params.include_archived.unwrap_or(false),
        limit: pagination.limit(),
        offset: pagination.offset(),
    };
    match state.notifications.list(&caller, &filter).await {
        Ok(page) => success_paginated_response(
            StatusCode::OK,
            &trace_id,
            page.items,
            page.total,
            filter.limit,
            filter.offset,
        ),
        Err(e) => e.to_response(&trace_id),
    }
}

#[utoipa::path(
    post,
    path = "/v1/notifications",
    tag = "Notifications",
    request_body = CreateNotificationRequest,
    responses(
        (status = 201, description = "Notification created", body = Notification),
        (status = 400, description = "Invalid notification", body = ApiError)
    )
)]
async fn create_notification(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(req): Json<CreateNotificationRequest>,
) -> impl IntoResponse {
    let draft = match req.into_draft() {
        Ok(draft) => draft,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &trace_id, "bad_request", &msg),
    };
    match state.notifications.create(draft).await {
        Ok(n) => success_response(StatusCode::CREATED, &trace_id, n),
        Err(e) => e.to_response(&trace_id),
    }
}

/// Send to everyone, or to everyone holding `target_role`.
#[utoipa::path(
    post,
    path = "/v1/notifications/broadcast",
    tag = "Notifications",
    request_body = CreateNotificationRequest,
    responses(
        (status = 201, description = "Notification broadcast", body = Notification),
        (status = 400, description = "Invalid notification", body = ApiError)
    )
)]
async fn broadcast_notification(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(req): Json<CreateNotificationRequest>,
) -> impl IntoResponse {
    if req.target_user_id.is_some() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "bad_request",
            "a broadcast cannot target a single user",
        );
    }
    let role = req.target_role.clone();
    let draft = match req.into_draft() {
        Ok(draft) => draft,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &trace_id, "bad_request", &msg),
    };
    match state.notifications.broadcast(draft, role).await {
        Ok(n) => success_response(StatusCode::CREATED, &trace_id, n),
        Err(e) => e.to_response(&trace_id),
    }
}

/// Unread counts for the caller. Only urgent, critical and high are broken
/// out.
#[utoipa::path(
    get,
    path = "/v1/notifications/unread-count",
    tag = "Notifications",
    responses(
        (status = 200, description = "Unread counts", body = UnreadCount)
    )
)]
async fn unread_count(
    Extension(trace_id): Extension<TraceId>,
    Extension(caller): Extension<Caller>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.notifications.unread_count(&caller).await {
        Ok(count) => success_response(StatusCode::OK, &trace_id, count),
        Err(e) => e.to_response(&trace_id),
    }
}

#[utoipa::path(
    get,
    path = "/v1/notifications/stats",
    tag = "Notifications",
    responses(
        (status = 200, description = "Notification statistics", body = NotificationStats)
    )
)]
async fn notification_stats(
    Extension(trace_id): Extension<TraceId>,
    Extension(caller): Extension<Caller>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.notifications.stats(&caller).await {
        Ok(stats) => success_response(StatusCode::OK, &trace_id, stats),
        Err(e) => e.to_response(&trace_id),
    }
}

/// Mark every visible unread notification as read, optionally for one
/// category.
#[utoipa::path(
    post,
    path = "/v1/notifications/read-all",
    tag = "Notifications",
    params(CategoryParams),
    responses(
        (status = 200, description = "Number of notifications marked", body = MarkedResponse)
    )
)]
async fn mark_all_read(
    Extension(trace_id): Extension<TraceId>,
    Extension(caller): Extension<Caller>,
    State(state): State<AppState>,
    Query(params): Query<CategoryParams>,
) -> impl IntoResponse {
    match state
        .notifications
        .mark_all_read(&caller, params.category.as_deref())
        .await
    {
        Ok(marked) => success_response(StatusCode::OK, &trace_id, MarkedResponse { marked }),
        Err(e) => e.to_response(&trace_id),
    }
}

#[utoipa::path(
    post,
    path = "/v1/notifications/{id}/read",
    tag = "Notifications",
    params(("id" = i64, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Notification marked read", body = Notification),
        (status = 404, description = "Unknown or not visible", body = ApiError)
    )
)]
async fn mark_read(
    Extension(trace_id): Extension<TraceId>,
    Extension(caller): Extension<Caller>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.notifications.mark_read(id, &caller).await {
        Ok(n) => success_response(StatusCode::OK, &trace_id, n),
        Err(e) => e.to_response(&trace_id),
    }
}

#[utoipa::path(
    post,
    path = "/v1/notifications/{id}/dismiss",
    tag = "Notifications",
    params(("id" = i64, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Notification dismissed", body = Notification),
        (status = 404, description = "Unknown or not visible", body = ApiError)
    )
)]
async fn dismiss(
    Extension(trace_id): Extension<TraceId>,
    Extension(caller): Extension<Caller>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.notifications.dismiss(id, &caller).await {
        Ok(n) => success_response(StatusCode::OK, &trace_id, n),
        Err(e) => e.to_response(&trace_id),
    }
}

/// Archive a notification. Archived notifications are deleted by the
/// sweeper once they expire.
#[utoipa::path(
    post,
    path = "/v1/notifications/{id}/archive",
    tag = "Notifications",
    params(("id" = i64, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Notification archived", body = Notification),
        (status = 404, description = "Unknown or not visible", body = ApiError)
    )
)]
async fn archive(
    Extension(trace_id): Extension<TraceId>,
    Extension(caller): Extension<Caller>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.notifications.archive(id, &caller).await {
        Ok(n) => success_response(StatusCode::OK, &trace_id, n),
        Err(e) => e.to_response(&trace_id),
    }
}

pub fn notification_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_notifications, create_notification))
        .routes(routes!(broadcast_notification))
        .routes(routes!(unread_count))
        .routes(routes!(notification_stats))
        .routes(routes!(mark_all_read))
        .routes(routes!(mark_read))
        .routes(routes!(dismiss))
        .routes(routes!(archive))
}
