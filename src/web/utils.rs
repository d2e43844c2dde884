use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::error::StoreError;
use crate::todo::TodoId;

/// Build a standard JSON error response.
pub fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    let body = serde_json::json!({ "error": message.into() });
    (status, axum::Json(body)).into_response()
}

/// Map a store failure onto a response. Validation problems are the
/// caller's fault; everything else means the sheet could not be used.
pub fn store_error(e: StoreError) -> Response {
    if e.is_validation() {
        return api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string());
    }
    warn!("Store operation failed: {e}");
    api_error(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
}

pub fn not_found(id: TodoId) -> Response {
    api_error(StatusCode::NOT_FOUND, format!("todo {id} not found"))
}

/// Parse a path id; anything but a positive integer is a 404.
pub fn parse_id(raw: &str) -> Result<TodoId, Response> {
    TodoId::parse_cell(raw.trim())
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("no todo with id {raw:?}")))
}
