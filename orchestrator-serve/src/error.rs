//! Top-level error type for the HTTP adapter, flattening library errors into
//! one response shape (§6, ambient "binary crates flatten with `#[from]`").

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use orchestrator_store::StoreError;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("store: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServeError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ServeError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
