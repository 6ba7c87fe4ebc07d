use crate::api::error_response;
use crate::logging::TraceId;
use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The user a request acts on behalf of. Authentication happens upstream;
/// the gateway forwards the resolved identity in headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub role: Option<String>,
}

impl Caller {
    pub fn new(user_id: impl Into<String>, role: Option<&str>) -> Self {
        Self {
            user_id: user_id.into(),
            role: role.map(str::to_string),
        }
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }
}

pub(crate) fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Rejects requests without an `x-user-id` header and stores the [`Caller`]
/// as a request extension.
pub async fn caller_middleware(mut req: Request, next: Next) -> Response {
    let trace_id = req
        .extensions()
        .get::<TraceId>()
        .map(|t| t.0.clone())
        .unwrap_or_default();

    // the header borrow must end before `next.run(..).await`
    let (user_id, role) = {
        let headers = req.headers();
        (
            header_value(headers, USER_ID_HEADER),
            header_value(headers, USER_ROLE_HEADER),
        )
    };

    let Some(user_id) = user_id else {
        return error_response(
            StatusCode::UNAUTHORIZED,
            &trace_id,
            "unauthorized",
            "missing x-user-id header",
        );
    };

    req.extensions_mut().insert(Caller { user_id, role });
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn header_values_are_trimmed_and_blank_is_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("  op-1 "));
        headers.insert(USER_ROLE_HEADER, HeaderValue::from_static("   "));

        assert_eq!(header_value(&headers, USER_ID_HEADER).as_deref(), Some("op-1"));
        assert_eq!(header_value(&headers, USER_ROLE_HEADER), None);
        assert_eq!(header_value(&headers, "x-missing"), None);
    }
}
