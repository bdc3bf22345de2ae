use std::sync::Arc;

use idsrv_store::config::StoreConfig;
use idsrv_store::entities::{Audited, Entity, PersistedGrant, now_utc};
use idsrv_store::error::{StoreError, StoreResult};
use idsrv_store::mapping::{
    Aggregate, ColumnValue, MappingRegistry, Node, NodeChange, plan_changes, plan_delete,
};
use idsrv_store::store::{StoreContext, stamp_resource_save};
use papaya::HashMap as PapayaHashMap;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::debug;

use crate::database::Database;

/// Resource name column.
pub(crate) const NAME: &str = "Name";

/// In-memory identity store.
///
/// Configuration aggregates live in relational tables that enforce the same
/// keys and limits as the PostgreSQL schema. Grants live in a papaya map
/// keyed by grant key.
#[derive(Debug)]
pub struct InMemoryStore {
    /// Registries and translator
    pub(crate) context: StoreContext,
    /// Configuration context tables; writers replace the whole set atomically
    pub(crate) configuration: RwLock<Database>,
    /// Operational context: grant key -> grant
    pub(crate) grants: Arc<PapayaHashMap<String, PersistedGrant>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Configuration` if the config is invalid.
    pub fn new(config: &StoreConfig) -> StoreResult<Self> {
        Ok(Self::with_context(StoreContext::new(config)?))
    }

    /// Creates an empty store sharing already built registries.
    #[must_use]
    pub fn with_context(context: StoreContext) -> Self {
        Self {
            context,
            configuration: RwLock::new(Database::new()),
            grants: Arc::new(PapayaHashMap::new()),
        }
    }

    #[must_use]
    pub fn context(&self) -> &StoreContext {
        &self.context
    }

    /// Total rows across the configuration tables, children included.
    pub async fn configuration_row_count(&self) -> usize {
        let db = self.configuration.read().await;
        self.context
            .configuration
            .iter()
            .map(|mapping| db.row_count(mapping.kind))
            .sum()
    }

    /// Number of stored grants.
    #[must_use]
    pub fn grant_count(&self) -> usize {
        self.grants.pin().len()
    }

    // -------------------------------------------------------------------------
    // Aggregate plumbing
    // -------------------------------------------------------------------------

    /// Loads the aggregate whose `column` holds `value`.
    pub(crate) async fn find_aggregate<A: Aggregate>(
        &self,
        column: &str,
        value: &str,
    ) -> StoreResult<Option<A>> {
        let registry = &self.context.configuration;
        let db = self.configuration.read().await;

        let Some(id) = db.find_id(A::KIND, column, &ColumnValue::Text(value.to_string())) else {
            return Ok(None);
        };
        db.load(registry, A::KIND, id)?
            .map(|node| A::from_node(&node))
            .transpose()
    }

    /// Loads every aggregate of a kind, in insertion order.
    pub(crate) async fn all_aggregates<A: Aggregate>(&self) -> StoreResult<Vec<A>> {
        let registry = &self.context.configuration;
        let db = self.configuration.read().await;

        let mut aggregates = Vec::new();
        for id in db.ids(A::KIND) {
            if let Some(node) = db.load(registry, A::KIND, id)? {
                aggregates.push(A::from_node(&node)?);
            }
        }
        Ok(aggregates)
    }

    /// Writes an aggregate. With `natural_key` set, the stored aggregate is
    /// located by that column; otherwise by the surrogate id of `desired`,
    /// where id 0 means insert.
    ///
    /// The plan is applied to a copy of the tables, so a failing statement
    /// leaves every row as it was.
    pub(crate) async fn write_aggregate<A: Aggregate + Entity>(
        &self,
        desired: &A,
        natural_key: Option<(&str, &str)>,
    ) -> StoreResult<i64> {
        let registry = &self.context.configuration;
        let mut guard = self.configuration.write().await;

        let stored = locate(&guard, registry, desired, natural_key)?;
        commit(&mut guard, registry, stored.as_ref(), desired)
    }

    /// Saves a resource by name. The audit stamps are taken from the stored
    /// row while the write lock is held, so concurrent saves never stamp
    /// from a stale read.
    pub(crate) async fn save_resource<A: Aggregate + Entity + Audited>(
        &self,
        mut entity: A,
        name: &str,
        model_created: Option<OffsetDateTime>,
    ) -> StoreResult<i64> {
        let registry = &self.context.configuration;
        let mut guard = self.configuration.write().await;

        let stored = locate(&guard, registry, &entity, Some((NAME, name)))?;
        let stored_entity = stored.as_ref().map(A::from_node).transpose()?;
        stamp_resource_save(&mut entity, stored_entity.as_ref(), model_created, now_utc());

        commit(&mut guard, registry, stored.as_ref(), &entity)
    }

    /// Deletes the aggregate whose `column` holds `value`, children first.
    pub(crate) async fn delete_aggregate<A: Aggregate>(
        &self,
        column: &str,
        value: &str,
    ) -> StoreResult<bool> {
        let registry = &self.context.configuration;
        let mut guard = self.configuration.write().await;

        let Some(id) = guard.find_id(A::KIND, column, &ColumnValue::Text(value.to_string())) else {
            return Ok(false);
        };
        let Some(stored) = guard.load(registry, A::KIND, id)? else {
            return Ok(false);
        };

        let change = NodeChange::Delete {
            rows: plan_delete(&stored)?,
        };
        let mut db = (*guard).clone();
        db.apply(registry, &change, None)?;
        *guard = db;

        debug!(kind = %A::KIND, id, rows = stored.count(), "Deleted aggregate");
        Ok(true)
    }
}

/// Loads the stored counterpart of `desired`.
fn locate<A: Aggregate + Entity>(
    db: &Database,
    registry: &MappingRegistry,
    desired: &A,
    natural_key: Option<(&str, &str)>,
) -> StoreResult<Option<Node>> {
    let stored_id = match natural_key {
        Some((column, value)) => db.find_id(A::KIND, column, &ColumnValue::Text(value.to_string())),
        None => (!desired.is_transient()).then(|| desired.id()),
    };
    match stored_id {
        Some(id) => db.load(registry, A::KIND, id),
        None => Ok(None),
    }
}

/// Plans `desired` against `stored` and swaps in the updated tables.
fn commit<A: Aggregate>(
    db: &mut Database,
    registry: &MappingRegistry,
    stored: Option<&Node>,
    desired: &A,
) -> StoreResult<i64> {
    let change = plan_changes(registry, stored, &desired.to_node())?;
    debug!(
        kind = %A::KIND,
        statements = change.statement_count(),
        "Applying aggregate change"
    );

    let mut next = db.clone();
    let id = next.apply(registry, &change, None)?;
    *db = next;

    id.ok_or_else(|| StoreError::database(format!("{} was not written", A::KIND)))
}
