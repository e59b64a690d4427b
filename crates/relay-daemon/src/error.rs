//! The crate-top error type (Section 7).
//!
//! Every typed error from every crate in the workspace converges here, is
//! mapped onto the §7 taxonomy via `relay_types::CoreError`, and from there
//! is turned into either an HTTP response or a WebSocket `error` frame —
//! the two surfaces named in Section 6.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use relay_types::{CoreError, FrameKind};

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct AppError(#[from] CoreError);

impl From<relay_db::DbError> for AppError {
    fn from(e: relay_db::DbError) -> Self {
        AppError(e.into())
    }
}

impl From<relay_validate::ValidationError> for AppError {
    fn from(e: relay_validate::ValidationError) -> Self {
        AppError(CoreError::Validation(e.to_string()))
    }
}

impl From<relay_crypto::TokenError> for AppError {
    fn from(_: relay_crypto::TokenError) -> Self {
        AppError(CoreError::Unauthenticated)
    }
}

impl From<relay_queue::QueueError> for AppError {
    fn from(e: relay_queue::QueueError) -> Self {
        AppError(CoreError::Backend(e.to_string()))
    }
}

impl AppError {
    pub fn core(&self) -> &CoreError {
        &self.0
    }

    fn status(&self) -> StatusCode {
        match &self.0 {
            CoreError::Unauthenticated => StatusCode::UNAUTHORIZED,
            CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Conflict(_) => StatusCode::CONFLICT,
            CoreError::Invariant(_) | CoreError::Validation(_) => StatusCode::BAD_REQUEST,
            CoreError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The `error` frame this failure turns into when it's surfaced to the
    /// sender of a WebSocket frame instead of an HTTP caller (Section 4.8,
    /// closing paragraph). `kind` is the originating frame's kind and `id`
    /// is the message id it carried, if any, so the sender can correlate
    /// the error back to the frame that caused it (scenario S3).
    pub fn to_outbound_frame(&self, kind: FrameKind, id: Option<String>) -> relay_types::OutboundFrame {
        let mut message = serde_json::json!({ "kind": kind, "error": self.0.to_string() });
        if let Some(id) = id {
            message["id"] = serde_json::json!(id);
        }
        relay_types::OutboundFrame::error(message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "internal error surfaced to HTTP caller");
        }
        let body = axum::Json(serde_json::json!({ "success": false, "error": self.0.to_string() }));
        (status, body).into_response()
    }
}
