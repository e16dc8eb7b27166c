//! Application error taxonomy and its HTTP mapping.
//!
//! Four families, per the failure-handling design:
//! - `Validation` — caller mistakes, always 4xx with a short reason, never
//!   logged as a server fault.
//! - `Processing` / `Persistence` — server faults, logged with detail, the
//!   client gets a generic body.
//! - `Export` — 500 with the underlying cause in the body. Deliberate
//!   exception to "don't leak internals": export is an operator-facing
//!   debugging path.

use crate::export::ExportError;
use crate::normalize::NormalizeError;
use crate::store::StoreError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CuratorError {
    #[error("{0}")]
    Validation(String),
    #[error("image processing failed: {0}")]
    Processing(String),
    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),
    #[error("export failed: {0}")]
    Export(#[from] ExportError),
    #[error("export timed out after {0}s")]
    ExportTimeout(u64),
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<NormalizeError> for CuratorError {
    fn from(err: NormalizeError) -> Self {
        match err {
            NormalizeError::UnsupportedFormat(name) => {
                CuratorError::Validation(format!("file type not allowed: {}", name))
            }
            NormalizeError::Decode(msg) => CuratorError::Processing(msg),
            NormalizeError::Io(e) => CuratorError::Processing(e.to_string()),
        }
    }
}

impl CuratorError {
    fn status(&self) -> StatusCode {
        match self {
            CuratorError::Validation(_) => StatusCode::BAD_REQUEST,
            CuratorError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Body text sent to the client. Validation echoes its reason; export
    /// includes the cause; everything else stays generic (the detail goes to
    /// the log, not the wire).
    fn client_message(&self) -> String {
        match self {
            CuratorError::Validation(msg) | CuratorError::NotFound(msg) => msg.clone(),
            CuratorError::Export(err) => format!("PDF export failed: {}", err),
            CuratorError::ExportTimeout(secs) => format!("PDF export timed out after {}s", secs),
            CuratorError::Processing(_) | CuratorError::Persistence(_) => {
                "internal server error".to_string()
            }
        }
    }
}

impl IntoResponse for CuratorError {
    fn into_response(self) -> Response {
        match &self {
            CuratorError::Validation(msg) | CuratorError::NotFound(msg) => {
                tracing::debug!(reason = %msg, "rejected request");
            }
            other => {
                tracing::error!(error = %other, "request failed");
            }
        }
        let body = Json(json!({ "error": self.client_message() }));
        (self.status(), body).into_response()
    }
}
