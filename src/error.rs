//! Error taxonomy shared by the sheet backends and the record store.
//!
//! Record absence is not an error: lookups return `Option` and mutations
//! return `bool`. These variants cover configuration, the remote service and
//! input validation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Missing or unreadable spreadsheet id / credentials. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Credentials are malformed or were rejected by the token endpoint.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The spreadsheet id does not resolve.
    #[error("spreadsheet not found: {0}")]
    ResourceNotFound(String),

    /// The authenticated identity cannot access the spreadsheet.
    #[error("permission denied: {0}")]
    Permission(String),

    /// Transport failure or a server-side error from a remote service.
    #[error("connection error: {0}")]
    Connection(String),

    /// The backend rejected a request (bad range, malformed response, ...).
    #[error("backend error: {0}")]
    Backend(String),

    /// Missing required field or malformed input.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The store failed to initialize and cannot serve requests.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether the failure came from the caller's input rather than the store.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Backend(format!("malformed response: {e}"))
        } else {
            Self::Connection(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
