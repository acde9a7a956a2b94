//! Error-to-HTTP response conversion.
//!
//! Implements `IntoResponse` for [`ff_core::Error`] so that route handlers
//! can return `Result<T, AppError>` and use `?` on engine calls.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
pub struct AppError {
    inner: ff_core::Error,
    /// Replaces the inner reason as `error` in the body.
    summary: Option<&'static str>,
}

impl AppError {
    pub fn new(inner: ff_core::Error) -> Self {
        Self {
            inner,
            summary: None,
        }
    }

    /// Report server-side failures under `summary`. Client errors keep
    /// their own message.
    pub fn summarize_server_error(mut self, summary: &'static str) -> Self {
        if self.status().is_server_error() {
            self.summary = Some(summary);
        }
        self
    }

    fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.inner.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<ff_core::Error> for AppError {
    fn from(e: ff_core::Error) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self.inner,
                "Server error in API handler"
            );
        }

        let error = match self.summary {
            Some(summary) => summary.to_string(),
            None => self.inner.reason(),
        };
        let body = json!({
            "error": error,
            "details": self.inner.to_string(),
            "code": self.inner.code(),
        });

        (status, axum::Json(body)).into_response()
    }
}
