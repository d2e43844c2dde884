//! Health check endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::web::state::{SharedState, StoreStatus};

pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let (status, store) = match &state.store {
        StoreStatus::Ready(store) => ("ok", store.backend().name().to_string()),
        StoreStatus::Unavailable(reason) => ("unavailable", reason.clone()),
    };

    let body = serde_json::json!({
        "status": status,
        "version": env!("SHEETDO_VERSION"),
        "store": store,
        "notifications": state.notifier.is_some(),
    });
    (StatusCode::OK, axum::Json(body))
}
