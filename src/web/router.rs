//! Axum router construction.

use axum::routing::{get, post};
use axum::Router;

use crate::web::handlers;
use crate::web::state::SharedState;

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health::health_handler))
        .route(
            "/api/todos",
            get(handlers::todos::list_todos_handler).post(handlers::todos::create_todo_handler),
        )
        .route(
            "/api/todos/{id}",
            get(handlers::todos::get_todo_handler)
                .put(handlers::todos::update_todo_handler)
                .delete(handlers::todos::delete_todo_handler),
        )
        .route(
            "/api/todos/{id}/toggle",
            post(handlers::todos::toggle_todo_handler),
        )
        .route("/api/notify", post(handlers::notify::notify_now_handler))
        .with_state(state)
}
