/// Errors that can occur while building notifications or templates.
///
/// # Examples
///
/// ```rust
/// use rollmon_notify::error::NotifyError;
///
/// let err = NotifyError::InvalidTarget("both user and role".to_string());
/// assert!(err.to_string().contains("both user and role"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// A notification or template field is missing or malformed.
    #[error("Notify: invalid input: {0}")]
    Invalid(String),

    /// The requested audience cannot be expressed (e.g. user and role at once).
    #[error("Notify: invalid target: {0}")]
    InvalidTarget(String),

    /// A template seed document could not be parsed.
    #[error("Notify: JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Convenience `Result` alias for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
