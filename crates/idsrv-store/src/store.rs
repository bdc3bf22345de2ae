//! Store operation traits.
//!
//! Protocol-facing lookups return translated domain models, never raw
//! entities. Administrative repositories work on entities so callers can
//! address individual child rows by id.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::config::StoreConfig;
use crate::entities::{self, Audited};
use crate::error::{StoreError, StoreResult};
use crate::mapping::{MappingRegistry, configuration_registry, operational_registry};
use crate::model::{ApiResource, Client, IdentityResource, PersistedGrant, PersistedGrantFilter, Resources};
use crate::translate::Translator;

// =============================================================================
// Protocol-facing Traits
// =============================================================================

/// Client lookups used by the protocol engine.
#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Finds a client by its client identifier.
    ///
    /// Returns `None` if no client has that identifier. Disabled clients are
    /// returned; rejecting them is the caller's decision.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_client_by_id(&self, client_id: &str) -> StoreResult<Option<Client>>;
}

/// Resource lookups used by discovery and token issuance.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Identity resources whose name is one of `scope_names`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_identity_resources_by_scope(
        &self,
        scope_names: &BTreeSet<String>,
    ) -> StoreResult<Vec<IdentityResource>>;

    /// API resources exposing at least one scope in `scope_names`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_api_resources_by_scope(
        &self,
        scope_names: &BTreeSet<String>,
    ) -> StoreResult<Vec<ApiResource>>;

    /// API resource by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_api_resource_by_name(&self, name: &str) -> StoreResult<Option<ApiResource>>;

    /// Both resource kinds matching `scope_names`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_resources_by_scope_names(
        &self,
        scope_names: &BTreeSet<String>,
    ) -> StoreResult<Resources> {
        Ok(Resources {
            identity_resources: self.find_identity_resources_by_scope(scope_names).await?,
            api_resources: self.find_api_resources_by_scope(scope_names).await?,
        })
    }

    /// Every stored resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get_all_resources(&self) -> StoreResult<Resources>;
}

/// Grant persistence.
///
/// Grants are keyed by a caller-supplied string. Apart from deletion, the
/// only mutation after creation is setting `consumed_time`.
#[async_trait]
pub trait PersistedGrantStore: Send + Sync {
    /// Stores a grant.
    ///
    /// Storing over an existing key replaces its mutable fields. The
    /// expiration of an existing grant cannot change.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` if a field exceeds its column limit,
    /// or `StoreError::InvalidInput` if the expiration of an existing grant
    /// would change.
    async fn store(&self, grant: &PersistedGrant) -> StoreResult<()>;

    /// Grant by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get(&self, key: &str) -> StoreResult<Option<PersistedGrant>>;

    /// Grants matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidInput` if the filter has no subject.
    async fn get_all(&self, filter: &PersistedGrantFilter) -> StoreResult<Vec<PersistedGrant>>;

    /// Removes a grant. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn remove(&self, key: &str) -> StoreResult<bool>;

    /// Removes every grant matching `filter` and returns how many went.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidInput` if the filter has no subject.
    async fn remove_all(&self, filter: &PersistedGrantFilter) -> StoreResult<u64>;

    /// Marks a grant consumed. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn update_consumed_time(&self, key: &str, consumed: OffsetDateTime) -> StoreResult<bool>;

    /// Removes every grant whose expiration is at or before `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn remove_expired(&self, cutoff: OffsetDateTime) -> StoreResult<u64>;

    /// Removes at most `batch_size` expired grants, oldest expiration first.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn remove_expired_batch(&self, cutoff: OffsetDateTime, batch_size: usize) -> StoreResult<u64>;
}

// =============================================================================
// Administrative Traits
// =============================================================================

/// Aggregate maintenance for clients.
///
/// Every write runs in one transaction: the client and all of its owned
/// rows commit together or not at all.
#[async_trait]
pub trait ClientRepository: Send + Sync {
    /// Creates a client from its model.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ConstraintViolation` if the client id is taken.
    async fn create_client(&self, client: &Client) -> StoreResult<()>;

    /// Creates or replaces a client keyed by client id. Children that are
    /// unchanged keep their rows.
    ///
    /// # Errors
    ///
    /// Returns an error if validation or the storage operation fails.
    async fn save_client(&self, client: &Client) -> StoreResult<()>;

    /// Loads the stored entity graph with surrogate ids.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn load_client_entity(&self, client_id: &str) -> StoreResult<Option<entities::Client>>;

    /// Writes an entity graph. An entity with id 0 is inserted; otherwise the
    /// stored aggregate with that id is diffed and updated, deleting children
    /// removed from its collections. Returns the surrogate id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ConstraintViolation` if the id or a child id is
    /// unknown, or a unique key collides.
    async fn save_client_entity(&self, client: &entities::Client) -> StoreResult<i64>;

    /// Deletes a client and every owned row. Returns `false` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete_client(&self, client_id: &str) -> StoreResult<bool>;
}

/// Aggregate maintenance for API and identity resources, keyed by name.
///
/// `create_*` stamps `Created`; `save_*` of an existing resource stamps
/// `Updated`.
#[async_trait]
pub trait ResourceRepository: Send + Sync {
    /// # Errors
    /// Returns `StoreError::ConstraintViolation` if the name or a scope name is taken.
    async fn create_api_resource(&self, resource: &ApiResource) -> StoreResult<()>;

    /// # Errors
    /// Returns an error if validation or the storage operation fails.
    async fn save_api_resource(&self, resource: &ApiResource) -> StoreResult<()>;

    /// # Errors
    /// Returns an error if the storage operation fails.
    async fn load_api_resource_entity(&self, name: &str)
    -> StoreResult<Option<entities::ApiResource>>;

    /// # Errors
    /// Returns `StoreError::ConstraintViolation` if an id is unknown.
    async fn save_api_resource_entity(&self, resource: &entities::ApiResource) -> StoreResult<i64>;

    /// # Errors
    /// Returns an error if the storage operation fails.
    async fn delete_api_resource(&self, name: &str) -> StoreResult<bool>;

    /// # Errors
    /// Returns `StoreError::ConstraintViolation` if the name is taken.
    async fn create_identity_resource(&self, resource: &IdentityResource) -> StoreResult<()>;

    /// # Errors
    /// Returns an error if validation or the storage operation fails.
    async fn save_identity_resource(&self, resource: &IdentityResource) -> StoreResult<()>;

    /// # Errors
    /// Returns an error if the storage operation fails.
    async fn load_identity_resource_entity(
        &self,
        name: &str,
    ) -> StoreResult<Option<entities::IdentityResource>>;

    /// # Errors
    /// Returns `StoreError::ConstraintViolation` if an id is unknown.
    async fn save_identity_resource_entity(
        &self,
        resource: &entities::IdentityResource,
    ) -> StoreResult<i64>;

    /// # Errors
    /// Returns an error if the storage operation fails.
    async fn delete_identity_resource(&self, name: &str) -> StoreResult<bool>;
}

// =============================================================================
// Store Context
// =============================================================================

/// Registries and translator shared by every operation of a store.
///
/// Built once from [`StoreConfig`] and immutable afterwards.
#[derive(Debug, Clone)]
pub struct StoreContext {
    pub configuration: Arc<MappingRegistry>,
    pub operational: Arc<MappingRegistry>,
    pub translator: Arc<Translator>,
}

impl StoreContext {
    /// Validates the config and builds both registries.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Configuration` on invalid options or mappings.
    pub fn new(config: &StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        Ok(Self {
            configuration: Arc::new(configuration_registry(&config.configuration)?),
            operational: Arc::new(operational_registry(&config.operational)?),
            translator: Arc::new(Translator::new()),
        })
    }
}

/// Rejects a changed expiration on an existing grant.
///
/// # Errors
///
/// Returns `StoreError::InvalidInput` if `existing` has a different expiration.
pub fn check_expiration_unchanged(
    existing: Option<&PersistedGrant>,
    incoming: &PersistedGrant,
) -> StoreResult<()> {
    match existing {
        Some(current) if current.expiration != incoming.expiration => {
            Err(StoreError::invalid_input(format!(
                "expiration of grant '{}' cannot change once stored",
                incoming.key
            )))
        }
        _ => Ok(()),
    }
}

/// Prepares a resource entity built from a model for saving over `stored`.
///
/// Saving over an existing row stamps `Updated` with `now` and keeps the
/// stored `LastAccessed`. `Created` keeps its stored value unless the model
/// supplied one.
pub fn stamp_resource_save<E: Audited>(
    entity: &mut E,
    stored: Option<&E>,
    model_created: Option<OffsetDateTime>,
    now: OffsetDateTime,
) {
    let Some(stored) = stored else {
        return;
    };
    entity.set_created(model_created.unwrap_or_else(|| stored.created()));
    entity.set_last_accessed(stored.last_accessed());
    entity.set_updated(now);
}
