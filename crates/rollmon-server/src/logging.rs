use crate::identity::{header_value, USER_ID_HEADER, USER_ROLE_HEADER};
use axum::{body::Body, extract::Request, http::HeaderValue, middleware::Next, response::Response};
use rand::Rng;
use std::fmt::Write;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber. `RUST_LOG` extends the default
/// `rollmon=info` directive.
pub fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("rollmon=info".parse()?);
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder
            .json()
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}"))
    } else {
        builder
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}"))
    }
}

/// Per-request trace id, stored as a request extension and echoed in the
/// `X-Trace-Id` header and the response envelope.
#[derive(Clone)]
pub struct TraceId(pub String);

impl std::ops::Deref for TraceId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

/// 16 hex characters (8 random bytes).
fn generate_trace_id() -> String {
    let bytes: [u8; 8] = rand::thread_rng().gen();
    let mut s = String::with_capacity(16);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

const MAX_BODY_LOG_CHARS: usize = 200;

/// Truncates to at most `max` bytes on a char boundary.
fn truncate_body(bytes: &[u8], max: usize) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) if s.len() > max => {
            let mut end = max;
            while end > 0 && !s.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &s[..end])
        }
        Ok(s) => s.to_string(),
        Err(_) => "<non-utf8 body>".to_string(),
    }
}

fn format_elapsed(elapsed_us: u128) -> String {
    if elapsed_us < 1000 {
        format!("{elapsed_us}µs")
    } else if elapsed_us < 1_000_000 {
        format!("{}ms", elapsed_us / 1000)
    } else {
        format!("{:.1}s", elapsed_us as f64 / 1_000_000.0)
    }
}

/// `user (role)` as sent in the caller headers; `-` for anonymous calls.
fn caller_label(user_id: Option<&str>, role: Option<&str>) -> String {
    match (user_id, role) {
        (Some(user), Some(role)) => format!("{user} ({role})"),
        (Some(user), None) => user.to_string(),
        (None, _) => "-".to_string(),
    }
}

/// Logs every API call with its caller. Request bodies are never logged;
/// the response envelope is captured only for failed calls, where it carries
/// the error code.
pub async fn request_logging(mut req: Request, next: Next) -> Response {
    let trace_id = generate_trace_id();
    req.extensions_mut().insert(TraceId(trace_id.clone()));

    if req.uri().path().starts_with("/docs") {
        return next.run(req).await;
    }

    let method = req.method().clone();
    let route = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_default();
    let caller = {
        let headers = req.headers();
        caller_label(
            header_value(headers, USER_ID_HEADER).as_deref(),
            header_value(headers, USER_ROLE_HEADER).as_deref(),
        )
    };

    tracing::info!(
        trace_id = %trace_id,
        method = %method,
        route = %route,
        caller = %caller,
        "--> request"
    );

    let start = Instant::now();
    let mut response = next.run(req).await;
    let elapsed = format_elapsed(start.elapsed().as_micros());
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let (parts, body) = response.into_parts();
        let body_bytes = axum::body::to_bytes(body, usize::MAX)
            .await
            .unwrap_or_default();
        let envelope = truncate_body(&body_bytes, MAX_BODY_LOG_CHARS);
        if status.is_server_error() {
            tracing::error!(
                trace_id = %trace_id,
                status = status.as_u16(),
                elapsed = %elapsed,
                caller = %caller,
                body = %envelope,
                "<-- failed"
            );
        } else {
            tracing::warn!(
                trace_id = %trace_id,
                status = status.as_u16(),
                elapsed = %elapsed,
                caller = %caller,
                body = %envelope,
                "<-- rejected"
            );
        }
        response = Response::from_parts(parts, Body::from(body_bytes));
    } else {
        tracing::info!(
            trace_id = %trace_id,
            status = status.as_u16(),
            elapsed = %elapsed,
            "<-- response"
        );
    }

    if let Ok(val) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert("X-Trace-Id", val);
    }
    response
}
