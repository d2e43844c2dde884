//! Shared application state.

use std::sync::Arc;

use axum::response::Response;

use crate::error::StoreError;
use crate::notify::MessageSender;
use crate::storage::SharedStore;

use super::utils::store_error;

/// Whether the record store came up at startup.
#[derive(Clone)]
pub enum StoreStatus {
    Ready(SharedStore),
    /// Connecting failed; every data endpoint answers 503 with this reason.
    Unavailable(String),
}

pub struct AppState {
    pub store: StoreStatus,
    /// `None` when notifications are not configured.
    pub notifier: Option<Arc<dyn MessageSender>>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(store: StoreStatus, notifier: Option<Arc<dyn MessageSender>>) -> SharedState {
        Arc::new(Self { store, notifier })
    }

    /// The store, or the 503 response to return in its place.
    pub fn store(&self) -> Result<&SharedStore, Response> {
        match &self.store {
            StoreStatus::Ready(store) => Ok(store),
            StoreStatus::Unavailable(reason) => {
                Err(store_error(StoreError::Unavailable(reason.clone())))
            }
        }
    }
}
