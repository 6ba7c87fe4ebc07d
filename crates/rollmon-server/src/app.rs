use crate::state::AppState;
use crate::{api, identity, logging};
use axum::middleware;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "rollmon API",
        description = "Production bottleneck detection, alerts and notifications",
    ),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Metrics", description = "Production metric ingestion"),
        (name = "Targets", description = "Performance targets"),
        (name = "Alerts", description = "Bottleneck alerts and their lifecycle"),
        (name = "Notifications", description = "Per-user notification inbox"),
        (name = "Templates", description = "Notification templates and events")
    ),
    modifiers(&CallerHeaderAddon)
)]
struct ApiDoc;

struct CallerHeaderAddon;

impl utoipa::Modify for CallerHeaderAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "caller_id",
            utoipa::openapi::security::SecurityScheme::ApiKey(
                utoipa::openapi::security::ApiKey::Header(
                    utoipa::openapi::security::ApiKeyValue::new(identity::USER_ID_HEADER),
                ),
            ),
        );
    }
}

pub fn build_http_app(state: AppState) -> Router {
    let (public_router, public_spec) = api::public_routes().split_for_parts();
    let (protected_router, protected_spec) = api::protected_routes().split_for_parts();

    let mut merged_spec = ApiDoc::openapi();
    merged_spec.merge(public_spec);
    merged_spec.merge(protected_spec);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    public_router
        .merge(protected_router.layer(middleware::from_fn(identity::caller_middleware)))
        .with_state(state)
        .route(
            "/docs/openapi.json",
            get(move || {
                let spec = merged_spec.clone();
                async move { Json(spec) }
            }),
        )
        .layer(cors)
        .layer(middleware::from_fn(logging::request_logging))
}
