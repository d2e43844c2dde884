//! Spreadsheet-backed record store.
//!
//! Maps the rows of a remote sheet onto todo records. Identity is the `id`
//! cell, never the row position: every lookup and mutation re-reads the whole
//! sheet and locates the row by id at call time, because deletions (ours or
//! someone editing the sheet by hand) shift every later row up by one.
//!
//! # Usage
//!
//! ```ignore
//! let store = Store::open(Box::new(sheet)).await?;
//! let id = store.create(NewTodo { .. }).await?;
//! store.set_completion(id, true).await?;
//! ```

pub mod schema;
mod todos;

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::Result;
use crate::sheet::{GoogleSheet, ServiceAccountKey, SheetBackend};
use crate::todo::Labels;

pub use schema::{ensure_schema, SchemaOutcome};

/// Bookkeeping guarded by the store's operation lock.
#[derive(Debug, Default)]
struct StoreState {
    /// Highest id ever observed in the sheet or issued by this store.
    highest_id: u64,
}

/// Record store over a sheet backend.
pub struct Store<B: SheetBackend + ?Sized = Box<dyn SheetBackend>> {
    clock: Arc<dyn Clock>,
    /// Serialises operations within this process so that read-then-write
    /// sequences (id assignment, locate-then-update) do not interleave.
    state: Mutex<StoreState>,
    /// Held for the whole of a reminder run, scheduled or on demand.
    reminders: Mutex<()>,
    schema_outcome: SchemaOutcome,
    /// Language of the priority/status cells this store writes.
    labels: Labels,
    backend: B,
}

/// The store type shared by the web server and the scheduler.
pub type SharedStore = Arc<Store>;

impl<B: SheetBackend> Store<B> {
    /// Bind to a sheet and make sure its schema is current.
    pub async fn open(backend: B) -> Result<Self> {
        Self::open_with_clock(backend, Arc::new(SystemClock)).await
    }

    /// Like [`Store::open`] with an explicit time source.
    pub async fn open_with_clock(backend: B, clock: Arc<dyn Clock>) -> Result<Self> {
        let (schema_outcome, labels) = schema::ensure_schema_labels(&backend).await?;
        info!(
            "Record store ready on {} backend ({:?}, {:?} labels)",
            backend.name(),
            schema_outcome,
            labels
        );
        Ok(Self {
            clock,
            state: Mutex::new(StoreState::default()),
            reminders: Mutex::new(()),
            schema_outcome,
            labels,
            backend,
        })
    }
}

/// Connect to the configured spreadsheet and open a store on it.
pub async fn connect(config: &Config) -> Result<SharedStore> {
    let key = ServiceAccountKey::from_file(&config.credentials_path)?;
    let sheet = GoogleSheet::connect(key, &config.spreadsheet_id).await?;
    let store: Store = Store::open(Box::new(sheet) as Box<dyn SheetBackend>).await?;
    Ok(Arc::new(store))
}

impl<B: SheetBackend + ?Sized> Store<B> {
    /// What schema maintenance happened when the store was opened.
    pub fn schema_outcome(&self) -> SchemaOutcome {
        self.schema_outcome
    }

    /// Wait for any reminder run on this store to finish, then claim it.
    pub async fn lock_reminders(&self) -> MutexGuard<'_, ()> {
        self.reminders.lock().await
    }

    pub fn labels(&self) -> Labels {
        self.labels
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}
