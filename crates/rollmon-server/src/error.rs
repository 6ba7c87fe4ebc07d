use crate::api::error_response;
use axum::http::StatusCode;
use axum::response::Response;
use rollmon_storage::StorageError;

/// Failure of an engine operation, as surfaced to callers.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The id does not exist, or is not visible to the caller.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        EngineError::NotFound { entity, id }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NotFound { .. } => "not_found",
            EngineError::Validation(_) => "bad_request",
            EngineError::Storage(_) => "storage_error",
        }
    }

    /// Envelope response for this error. Storage details are logged, not
    /// returned.
    pub fn to_response(&self, trace_id: &str) -> Response {
        let msg = match self {
            EngineError::Storage(e) => {
                tracing::error!(trace_id, error = %e, "Storage operation failed");
                "Database error".to_string()
            }
            other => other.to_string(),
        };
        error_response(self.status(), trace_id, self.code(), &msg)
    }
}
