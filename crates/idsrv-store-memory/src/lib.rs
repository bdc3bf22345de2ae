//! In-memory storage backend for idsrv-store.
//!
//! Implements every store trait without a database. Configuration aggregates
//! are kept as relational rows so unique keys, foreign keys and column limits
//! behave as they do in PostgreSQL; persisted grants live in a papaya
//! lock-free map.
//!
//! # Example
//!
//! ```ignore
//! use idsrv_store::{ClientStore, StoreConfig};
//! use idsrv_store_memory::InMemoryStore;
//!
//! let store = InMemoryStore::new(&StoreConfig::default())?;
//! let client = store.find_client_by_id("web").await?;
//! ```

mod client;
mod database;
mod grant;
mod resource;
mod store;

use std::sync::Arc;

use idsrv_store::StoreConfig;
use idsrv_store::error::StoreResult;

pub use store::InMemoryStore;

/// Creates a shareable in-memory store.
///
/// # Errors
///
/// Returns `StoreError::Configuration` if the config is invalid.
pub fn create_store(config: &StoreConfig) -> StoreResult<Arc<InMemoryStore>> {
    Ok(Arc::new(InMemoryStore::new(config)?))
}
