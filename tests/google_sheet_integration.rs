/// Integration tests for the Google Sheets backend.
///
/// A small axum app stands in for both the OAuth token endpoint and the
/// Sheets v4 API, keeping one worksheet in memory. The store is then driven
/// through `GoogleSheet` exactly as in production.
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use sheetdo::error::StoreError;
use sheetdo::sheet::{GoogleSheet, ServiceAccountKey, SheetBackend};
use sheetdo::storage::{SchemaOutcome, Store};
use sheetdo::todo::{NewTodo, TodoId};

const SPREADSHEET_ID: &str = "sheet-under-test";
const SHEET_TITLE: &str = "Todos";
const ACCESS_TOKEN: &str = "fake-access-token";
const PRIVATE_KEY: &str = include_str!("fixtures/test_service_account.pem");

#[derive(Default)]
struct FakeSheets {
    rows: Vec<Vec<String>>,
    token_requests: usize,
    bold_columns: Option<u64>,
    /// Answer every API call with 403.
    forbid: bool,
}

type Shared = Arc<Mutex<FakeSheets>>;

fn trimmed(row: &[String]) -> Vec<String> {
    let len = row.iter().rposition(|c| !c.is_empty()).map_or(0, |i| i + 1);
    row[..len].to_vec()
}

fn api_error(status: StatusCode, message: &str) -> Response {
    let body = json!({ "error": { "code": status.as_u16(), "message": message } });
    (status, Json(body)).into_response()
}

/// Checks the bearer token and the 403 switch.
fn guard(state: &FakeSheets, headers: &HeaderMap) -> Option<Response> {
    let expected = format!("Bearer {ACCESS_TOKEN}");
    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some(expected.as_str()) {
        return Some(api_error(StatusCode::UNAUTHORIZED, "missing credentials"));
    }
    if state.forbid {
        return Some(api_error(
            StatusCode::FORBIDDEN,
            "The caller does not have permission",
        ));
    }
    None
}

/// Row number out of `'Todos'!7:7` or `'Todos'!A7:I7`.
fn row_of(range: &str) -> Option<usize> {
    let cells = range.split_once('!')?.1;
    let first = cells.split(':').next()?;
    first.trim_start_matches(|c: char| c.is_ascii_alphabetic()).parse().ok()
}

async fn token(State(state): State<Shared>, body: String) -> Response {
    assert!(body.contains("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer"));
    assert!(body.contains("assertion="));
    state.lock().unwrap().token_requests += 1;
    Json(json!({ "access_token": ACCESS_TOKEN, "expires_in": 3600 })).into_response()
}

async fn spreadsheet_get(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let state = state.lock().unwrap();
    if let Some(resp) = guard(&state, &headers) {
        return resp;
    }
    if id != SPREADSHEET_ID {
        return api_error(StatusCode::NOT_FOUND, "Requested entity was not found.");
    }
    Json(json!({
        "sheets": [{ "properties": { "sheetId": 42, "title": SHEET_TITLE } }]
    }))
    .into_response()
}

async fn spreadsheet_post(
    State(state): State<Shared>,
    Path(target): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(resp) = guard(&state, &headers) {
        return resp;
    }
    assert_eq!(target, format!("{SPREADSHEET_ID}:batchUpdate"));

    for request in body["requests"].as_array().unwrap() {
        if let Some(delete) = request.get("deleteDimension") {
            assert_eq!(delete["range"]["sheetId"], 42);
            let start = delete["range"]["startIndex"].as_u64().unwrap() as usize;
            state.rows.remove(start);
        } else if let Some(repeat) = request.get("repeatCell") {
            state.bold_columns = repeat["range"]["endColumnIndex"].as_u64();
        }
    }
    Json(json!({})).into_response()
}

async fn values_get(
    State(state): State<Shared>,
    Path((_, range)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let state = state.lock().unwrap();
    if let Some(resp) = guard(&state, &headers) {
        return resp;
    }

    let mut values: Vec<Vec<String>> = match row_of(&range) {
        Some(row) => state.rows.get(row - 1).map(|r| vec![trimmed(r)]).unwrap_or_default(),
        None => state.rows.iter().map(|r| trimmed(r)).collect(),
    };
    while values.last().is_some_and(|r| r.is_empty()) {
        values.pop();
    }
    Json(json!({ "range": range, "values": values })).into_response()
}

async fn values_put(
    State(state): State<Shared>,
    Path((_, range)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(resp) = guard(&state, &headers) {
        return resp;
    }

    let row = row_of(&range).unwrap();
    let values: Vec<String> = serde_json::from_value(body["values"][0].clone()).unwrap();
    if state.rows.len() < row {
        state.rows.resize(row, Vec::new());
    }
    state.rows[row - 1] = values;
    Json(json!({ "updatedRange": range })).into_response()
}

async fn values_post(
    State(state): State<Shared>,
    Path((_, range)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(resp) = guard(&state, &headers) {
        return resp;
    }

    if range.ends_with(":clear") {
        state.rows.clear();
    } else if range.ends_with(":append") {
        let values: Vec<String> = serde_json::from_value(body["values"][0].clone()).unwrap();
        let last = state
            .rows
            .iter()
            .rposition(|r| r.iter().any(|c| !c.is_empty()))
            .map_or(0, |i| i + 1);
        state.rows.truncate(last);
        state.rows.push(values);
    } else {
        panic!("unexpected values POST to {range}");
    }
    Json(json!({})).into_response()
}

struct Fake {
    state: Shared,
    base: String,
    shutdown: CancellationToken,
}

impl Drop for Fake {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl Fake {
    async fn start(rows: Vec<Vec<&str>>) -> Self {
        let state: Shared = Arc::new(Mutex::new(FakeSheets {
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(str::to_string).collect())
                .collect(),
            ..Default::default()
        }));

        let router = Router::new()
            .route("/token", post(token))
            .route(
                "/v4/spreadsheets/{target}",
                get(spreadsheet_get).post(spreadsheet_post),
            )
            .route(
                "/v4/spreadsheets/{id}/values/{range}",
                get(values_get).put(values_put).post(values_post),
            )
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                axum::serve(listener, router)
                    .with_graceful_shutdown(async move { shutdown.cancelled().await })
                    .await
                    .unwrap();
            }
        });

        Self {
            state,
            base: format!("http://{addr}"),
            shutdown,
        }
    }

    fn key(&self) -> ServiceAccountKey {
        ServiceAccountKey::from_json(
            &json!({
                "client_email": "sheetdo-test@example.iam.gserviceaccount.com",
                "private_key": PRIVATE_KEY,
                "token_uri": format!("{}/token", self.base),
            })
            .to_string(),
        )
        .unwrap()
    }

    async fn connect(&self, spreadsheet_id: &str) -> Result<GoogleSheet, StoreError> {
        GoogleSheet::connect_with_base(
            self.key(),
            spreadsheet_id,
            &format!("{}/v4/spreadsheets", self.base),
        )
        .await
    }

    fn rows(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().rows.clone()
    }
}

fn new_todo(title: &str) -> NewTodo {
    NewTodo {
        title: title.to_string(),
        content: "content".to_string(),
        due_date: "2025-06-12".to_string(),
        priority: Some("Low".to_string()),
    }
}

#[tokio::test]
async fn connect_resolves_first_worksheet() {
    let fake = Fake::start(Vec::new()).await;
    let sheet = fake.connect(SPREADSHEET_ID).await.unwrap();
    assert_eq!(sheet.sheet_title(), SHEET_TITLE);
    assert_eq!(sheet.name(), "google-sheets");
}

#[tokio::test]
async fn unknown_spreadsheet_is_resource_not_found() {
    let fake = Fake::start(Vec::new()).await;
    let err = fake.connect("no-such-sheet").await.err().unwrap();
    assert!(matches!(err, StoreError::ResourceNotFound(_)), "{err:?}");
}

#[tokio::test]
async fn unshared_spreadsheet_is_permission_error() {
    let fake = Fake::start(Vec::new()).await;
    fake.state.lock().unwrap().forbid = true;
    let err = fake.connect(SPREADSHEET_ID).await.err().unwrap();
    assert!(matches!(err, StoreError::Permission(_)), "{err:?}");
}

#[tokio::test]
async fn store_round_trip_over_the_api() {
    let fake = Fake::start(Vec::new()).await;
    let sheet = fake.connect(SPREADSHEET_ID).await.unwrap();
    let store = Store::open(sheet).await.unwrap();

    assert_eq!(store.schema_outcome(), SchemaOutcome::Initialized);
    assert_eq!(fake.rows()[0][0], "ID");
    assert_eq!(fake.state.lock().unwrap().bold_columns, Some(9));

    let a = store.create(new_todo("a")).await.unwrap();
    let b = store.create(new_todo("b")).await.unwrap();
    let c = store.create(new_todo("c")).await.unwrap();
    assert_eq!((a.get(), b.get(), c.get()), (1, 2, 3));

    assert!(store.set_completion(c, true).await.unwrap());
    assert!(store.delete(b).await.unwrap());

    let rows = fake.rows();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2][0], "3");
    assert_eq!(rows[2][5], "Complete");

    let todos = store.list().await.unwrap();
    let ids: Vec<u64> = todos.iter().map(|t| t.id.get()).collect();
    assert_eq!(ids, vec![1, 3]);
    assert!(store.get(TodoId::new(2).unwrap()).await.unwrap().is_none());

    // One token exchange covers the whole session.
    assert_eq!(fake.state.lock().unwrap().token_requests, 1);
}

#[tokio::test]
async fn legacy_sheet_is_migrated_over_the_api() {
    let fake = Fake::start(vec![
        vec!["ID", "Title", "Content", "Due Date", "Created At", "Updated At"],
        vec![
            "1",
            "old",
            "row",
            "2025-01-01",
            "2024-01-01 00:00:00",
            "2024-01-02 00:00:00",
        ],
    ])
    .await;
    let sheet = fake.connect(SPREADSHEET_ID).await.unwrap();
    let store = Store::open(sheet).await.unwrap();

    assert_eq!(store.schema_outcome(), SchemaOutcome::Migrated { rows: 1 });
    let rows = fake.rows();
    assert_eq!(rows[0].len(), 9);
    assert_eq!(rows[1][4], "Medium");
    assert_eq!(rows[1][5], "Incomplete");
    assert_eq!(rows[1][6], "2024-01-01 00:00:00");
}
