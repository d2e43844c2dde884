//! Google Sheets API v4 backend.
//!
//! Authenticates as a service account: a short-lived RS256 JWT signed with the
//! account's private key is exchanged for a bearer token, which is cached
//! until shortly before it expires. All operations target the first
//! worksheet of the spreadsheet.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Result, StoreError};

use super::{quote_sheet_title, row_range, SheetBackend};

pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// Lifetime requested for each signed assertion (the maximum Google accepts).
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh the bearer token this long before it actually expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The fields of a service-account key file that are needed to sign in.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Parse a key from its JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let key: Self = serde_json::from_str(json)
            .map_err(|e| StoreError::Authentication(format!("malformed service account key: {e}")))?;
        if key.client_email.is_empty() || key.private_key.is_empty() {
            return Err(StoreError::Authentication(
                "service account key lacks client_email or private_key".to_string(),
            ));
        }
        Ok(key)
    }

    /// Read and parse a key file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            StoreError::Authentication(format!(
                "cannot read credentials file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&contents)
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Issues bearer tokens for a service account, reusing them while valid.
struct TokenSource {
    key: ServiceAccountKey,
    signing_key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    fn new(key: ServiceAccountKey) -> Result<Self> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| StoreError::Authentication(format!("invalid private key: {e}")))?;
        Ok(Self {
            key,
            signing_key,
            cached: Mutex::new(None),
        })
    }

    async fn token(&self, client: &Client) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.fetch(client).await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn fetch(&self, client: &Client) -> Result<CachedToken> {
        let iat = chrono::Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: SPREADSHEETS_SCOPE,
            aud: &self.key.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|e| StoreError::Authentication(format!("cannot sign assertion: {e}")))?;

        let resp = client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(if status.is_server_error() {
                StoreError::Connection(format!("token endpoint returned {status}"))
            } else {
                StoreError::Authentication(format!("token request rejected ({status}): {body}"))
            });
        }

        let token: TokenResponse = resp.json().await?;
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        debug!("Obtained access token for {}", self.key.client_email);

        Ok(CachedToken {
            value: token.access_token,
            refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN),
        })
    }
}

/// Map a failed API response onto the error taxonomy.
pub(crate) fn error_for_status(status: StatusCode, context: &str, body: &str) -> StoreError {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| status.to_string());
    let msg = format!("{context}: {detail}");
    match status {
        StatusCode::UNAUTHORIZED => StoreError::Authentication(msg),
        StatusCode::FORBIDDEN => StoreError::Permission(msg),
        StatusCode::NOT_FOUND => StoreError::ResourceNotFound(msg),
        StatusCode::TOO_MANY_REQUESTS => StoreError::Connection(msg),
        s if s.is_server_error() => StoreError::Connection(msg),
        _ => StoreError::Backend(msg),
    }
}

async fn check(resp: Response, context: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(error_for_status(status, context, &body))
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl ValueRange {
    fn into_rows(self) -> Vec<Vec<String>> {
        self.values
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect()
    }
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

/// Connection to the first worksheet of a Google spreadsheet.
pub struct GoogleSheet {
    client: Client,
    api_base: String,
    spreadsheet_id: String,
    sheet_id: i64,
    sheet_title: String,
    auth: TokenSource,
}

impl GoogleSheet {
    /// Sign in and resolve the spreadsheet's first worksheet.
    pub async fn connect(key: ServiceAccountKey, spreadsheet_id: &str) -> Result<Self> {
        Self::connect_with_base(key, spreadsheet_id, SHEETS_API_BASE).await
    }

    /// Like [`GoogleSheet::connect`] against a different API root.
    pub async fn connect_with_base(
        key: ServiceAccountKey,
        spreadsheet_id: &str,
        api_base: &str,
    ) -> Result<Self> {
        if spreadsheet_id.trim().is_empty() {
            return Err(StoreError::Configuration("spreadsheet id is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StoreError::Connection(format!("cannot build HTTP client: {e}")))?;
        let auth = TokenSource::new(key)?;

        let mut sheet = Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.trim().to_string(),
            sheet_id: 0,
            sheet_title: String::new(),
            auth,
        };

        let url = sheet.url(&[sheet.spreadsheet_id.as_str()])?;
        let token = sheet.auth.token(&sheet.client).await?;
        let resp = sheet
            .client
            .get(url)
            .bearer_auth(token)
            .query(&[("fields", "sheets.properties(sheetId,title)")])
            .send()
            .await?;
        let meta: SpreadsheetMeta = check(resp, "open spreadsheet").await?.json().await?;

        let first = meta.sheets.into_iter().next().ok_or_else(|| {
            StoreError::ResourceNotFound("spreadsheet has no worksheets".to_string())
        })?;
        sheet.sheet_id = first.properties.sheet_id;
        sheet.sheet_title = first.properties.title;

        info!(
            "Connected to worksheet '{}' of spreadsheet {}",
            sheet.sheet_title,
            short_id(&sheet.spreadsheet_id)
        );
        Ok(sheet)
    }

    pub fn sheet_title(&self) -> &str {
        &self.sheet_title
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| StoreError::Configuration(format!("invalid API base: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Configuration("API base cannot take a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn values_url(&self, range: &str) -> Result<Url> {
        self.url(&[self.spreadsheet_id.as_str(), "values", range])
    }

    async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>> {
        let token = self.auth.token(&self.client).await?;
        let resp = self
            .client
            .get(self.values_url(range)?)
            .bearer_auth(token)
            .send()
            .await?;
        let values: ValueRange = check(resp, "read values").await?.json().await?;
        Ok(values.into_rows())
    }

    async fn batch_update(&self, requests: Value, context: &str) -> Result<()> {
        let token = self.auth.token(&self.client).await?;
        let target = format!("{}:batchUpdate", self.spreadsheet_id);
        let url = self.url(&[target.as_str()])?;
        let resp = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&json!({ "requests": requests }))
            .send()
            .await?;
        check(resp, context).await?;
        Ok(())
    }
}

/// First characters of a spreadsheet id, for logs.
pub(crate) fn short_id(id: &str) -> String {
    let prefix: String = id.chars().take(12).collect();
    if prefix.len() < id.len() {
        format!("{prefix}...")
    } else {
        prefix
    }
}

#[async_trait]
impl SheetBackend for GoogleSheet {
    fn name(&self) -> &str {
        "google-sheets"
    }

    async fn read_all(&self) -> Result<Vec<Vec<String>>> {
        self.get_values(&quote_sheet_title(&self.sheet_title)).await
    }

    async fn read_row(&self, row: usize) -> Result<Vec<String>> {
        let range = format!("{}!{row}:{row}", quote_sheet_title(&self.sheet_title));
        Ok(self.get_values(&range).await?.into_iter().next().unwrap_or_default())
    }

    async fn write_row(&self, row: usize, values: &[String]) -> Result<()> {
        let range = row_range(&self.sheet_title, row, values.len());
        let token = self.auth.token(&self.client).await?;
        let resp = self
            .client
            .put(self.values_url(&range)?)
            .bearer_auth(token)
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({ "range": range, "majorDimension": "ROWS", "values": [values] }))
            .send()
            .await?;
        check(resp, "write row").await?;
        debug!("Wrote row {row}");
        Ok(())
    }

    async fn append_row(&self, values: &[String]) -> Result<()> {
        let range = format!("{}!A1:append", quote_sheet_title(&self.sheet_title));
        let token = self.auth.token(&self.client).await?;
        let resp = self
            .client
            .post(self.values_url(&range)?)
            .bearer_auth(token)
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .json(&json!({ "majorDimension": "ROWS", "values": [values] }))
            .send()
            .await?;
        check(resp, "append row").await?;
        Ok(())
    }

    async fn delete_row(&self, row: usize) -> Result<()> {
        let start = row
            .checked_sub(1)
            .ok_or_else(|| StoreError::Backend("row numbers start at 1".to_string()))?;
        self.batch_update(
            json!([{
                "deleteDimension": {
                    "range": {
                        "sheetId": self.sheet_id,
                        "dimension": "ROWS",
                        "startIndex": start,
                        "endIndex": row,
                    }
                }
            }]),
            "delete row",
        )
        .await
    }

    async fn clear(&self) -> Result<()> {
        let range = format!("{}:clear", quote_sheet_title(&self.sheet_title));
        let token = self.auth.token(&self.client).await?;
        let resp = self
            .client
            .post(self.values_url(&range)?)
            .bearer_auth(token)
            .json(&json!({}))
            .send()
            .await?;
        check(resp, "clear sheet").await?;
        Ok(())
    }

    async fn format_header(&self, columns: usize) -> Result<()> {
        self.batch_update(
            json!([{
                "repeatCell": {
                    "range": {
                        "sheetId": self.sheet_id,
                        "startRowIndex": 0,
                        "endRowIndex": 1,
                        "startColumnIndex": 0,
                        "endColumnIndex": columns,
                    },
                    "cell": { "userEnteredFormat": { "textFormat": { "bold": true } } },
                    "fields": "userEnteredFormat.textFormat.bold",
                }
            }]),
            "format header",
        )
        .await
    }
}
