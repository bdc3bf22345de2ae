//! # idsrv-store
//!
//! Persistence layer for an OAuth 2.0 / OpenID Connect identity provider.
//!
//! This crate provides:
//! - Storage entities for clients, API resources, identity resources and
//!   persisted grants
//! - Protocol-facing domain models and the translator between the two
//! - A mapping registry per storage context with configurable table naming
//! - Aggregate diff planning used by backends to apply cascades explicitly
//! - Store traits implemented by the memory and PostgreSQL backends
//! - A periodic expired-grant sweep
//!
//! ## Modules
//!
//! - [`naming`] - Physical table and schema resolution
//! - [`entities`] - Storage entities
//! - [`mapping`] - Mapping registry, rows and change planning
//! - [`model`] - Domain models
//! - [`translate`] - Entity ⇄ model translation
//! - [`store`] - Store operation traits and the shared store context
//! - [`cleanup`] - Expired-grant sweep
//! - [`config`] - Store options and loading

pub mod cleanup;
pub mod config;
pub mod entities;
pub mod error;
pub mod mapping;
pub mod model;
pub mod naming;
pub mod store;
pub mod translate;

pub use cleanup::{TokenCleanup, TokenCleanupHandle};
pub use config::{ConfigurationStoreOptions, OperationalStoreOptions, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use naming::{PhysicalTable, TableConfiguration};
pub use store::{
    ClientRepository, ClientStore, PersistedGrantStore, ResourceRepository, ResourceStore,
    StoreContext,
};
pub use translate::{Translate, Translator};
