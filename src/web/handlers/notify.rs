//! On-demand reminder run.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::notify;
use crate::web::state::SharedState;
use crate::web::utils::{api_error, store_error};

pub async fn notify_now_handler(State(state): State<SharedState>) -> Response {
    let store = match state.store() {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let Some(sender) = state.notifier.as_ref() else {
        return api_error(StatusCode::CONFLICT, "notifications are not configured");
    };

    match notify::run_job(store.as_ref(), sender.as_ref()).await {
        Ok(results) => (StatusCode::OK, Json(json!({ "results": results }))).into_response(),
        Err(e) => store_error(e),
    }
}
