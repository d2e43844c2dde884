//! Todo CRUD handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::todo::{NewTodo, TodoUpdate};
use crate::web::listing::{self, ListQuery, SortKey, StatusFilter};
use crate::web::state::SharedState;
use crate::web::utils::{api_error, not_found, parse_id, store_error};

fn bad_body(rejection: JsonRejection) -> Response {
    api_error(rejection.status(), rejection.body_text())
}

pub async fn list_todos_handler(
    State(state): State<SharedState>,
    Query(query): Query<ListQuery>,
) -> Response {
    let store = match state.store() {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let Some(filter) = StatusFilter::parse(query.status.as_deref()) else {
        return api_error(
            StatusCode::BAD_REQUEST,
            "status must be all, Incomplete or Complete",
        );
    };
    let sort = SortKey::parse(query.sort.as_deref());

    match store.list().await {
        Ok(todos) => {
            let todos = listing::apply(todos, filter, sort);
            (StatusCode::OK, Json(json!(todos))).into_response()
        }
        Err(e) => store_error(e),
    }
}

pub async fn create_todo_handler(
    State(state): State<SharedState>,
    body: Result<Json<NewTodo>, JsonRejection>,
) -> Response {
    let store = match state.store() {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let Json(new) = match body {
        Ok(b) => b,
        Err(rejection) => return bad_body(rejection),
    };

    match store.create(new).await {
        Ok(id) => (StatusCode::CREATED, Json(json!({ "id": id }))).into_response(),
        Err(e) => store_error(e),
    }
}

pub async fn get_todo_handler(
    State(state): State<SharedState>,
    Path(raw_id): Path<String>,
) -> Response {
    let store = match state.store() {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let id = match parse_id(&raw_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match store.get(id).await {
        Ok(Some(todo)) => (StatusCode::OK, Json(json!(todo))).into_response(),
        Ok(None) => not_found(id),
        Err(e) => store_error(e),
    }
}

pub async fn update_todo_handler(
    State(state): State<SharedState>,
    Path(raw_id): Path<String>,
    body: Result<Json<TodoUpdate>, JsonRejection>,
) -> Response {
    let store = match state.store() {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let id = match parse_id(&raw_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let Json(update) = match body {
        Ok(b) => b,
        Err(rejection) => return bad_body(rejection),
    };

    match store.update(id, update).await {
        Ok(false) => not_found(id),
        Ok(true) => match store.get(id).await {
            Ok(Some(todo)) => (StatusCode::OK, Json(json!(todo))).into_response(),
            Ok(None) => not_found(id),
            Err(e) => store_error(e),
        },
        Err(e) => store_error(e),
    }
}

pub async fn delete_todo_handler(
    State(state): State<SharedState>,
    Path(raw_id): Path<String>,
) -> Response {
    let store = match state.store() {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let id = match parse_id(&raw_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match store.delete(id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => not_found(id),
        Err(e) => store_error(e),
    }
}

/// Flip a todo between complete and incomplete.
pub async fn toggle_todo_handler(
    State(state): State<SharedState>,
    Path(raw_id): Path<String>,
) -> Response {
    let store = match state.store() {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let id = match parse_id(&raw_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let current = match store.get(id).await {
        Ok(Some(todo)) => todo,
        Ok(None) => return not_found(id),
        Err(e) => return store_error(e),
    };
    let completed = !current.is_complete();

    match store.set_completion(id, completed).await {
        Ok(true) => {}
        Ok(false) => return not_found(id),
        Err(e) => return store_error(e),
    }
    match store.get(id).await {
        Ok(Some(todo)) => (StatusCode::OK, Json(json!(todo))).into_response(),
        Ok(None) => not_found(id),
        Err(e) => store_error(e),
    }
}
