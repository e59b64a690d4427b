//! The error taxonomy shared by every layer (Section 7).
//!
//! Each crate in the workspace defines its own narrower error enum for the
//! failures it can actually produce, and converts into `CoreError` at the
//! boundary where a caller needs the uniform kind the dispatcher and the
//! HTTP layer both switch on.

/// Uniform error kind surfaced to the dispatcher and the HTTP layer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CoreError {
    /// No valid principal could be established from the request.
    #[error("unauthenticated")]
    Unauthenticated,

    /// A valid principal attempted an action it isn't authorized for.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The referenced resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation would violate a uniqueness constraint.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The operation would violate a data-model invariant.
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// The request failed schema validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The repository, queue, or transport failed unexpectedly.
    #[error("backend error: {0}")]
    Backend(String),
}

impl CoreError {
    /// A short machine-readable tag, used in logs and in the WebSocket
    /// `error` frame's `error` field.
    pub fn tag(&self) -> &'static str {
        match self {
            CoreError::Unauthenticated => "unauthenticated",
            CoreError::Forbidden(_) => "forbidden",
            CoreError::NotFound(_) => "not_found",
            CoreError::Conflict(_) => "conflict",
            CoreError::Invariant(_) => "invariant",
            CoreError::Validation(_) => "validation",
            CoreError::Backend(_) => "backend",
        }
    }
}
