use idsrv_store::config::StoreConfig;
use idsrv_store::entities::{Audited, Entity, now_utc};
use idsrv_store::error::{StoreError, StoreResult};
use idsrv_store::mapping::{
    Aggregate, MappingRegistry, Node, NodeChange, plan_changes, plan_delete,
};
use idsrv_store::store::{StoreContext, stamp_resource_save};
use sqlx_postgres::{PgConnection, PgPool};
use time::OffsetDateTime;
use tracing::{debug, info, instrument};

use crate::config::PostgresConfig;
use crate::error::from_sqlx_error;
use crate::graph;
use crate::pool::create_pools;
use crate::schema::SchemaManager;

/// Resource name column.
pub(crate) const NAME: &str = "Name";

/// PostgreSQL identity store.
///
/// Configuration aggregates and grants may live in different databases; each
/// context has its own pool. Every aggregate write runs in one transaction
/// with the root row locked.
#[derive(Debug, Clone)]
pub struct PostgresIdentityStore {
    pub(crate) context: StoreContext,
    pub(crate) pool: PgPool,
    pub(crate) operational_pool: PgPool,
}

impl PostgresIdentityStore {
    /// Connects both pools and, if configured, creates the schema.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Configuration` for invalid options, or a
    /// transient or database error if connecting or creating tables fails.
    #[instrument(skip_all)]
    pub async fn connect(config: &PostgresConfig, store_config: &StoreConfig) -> StoreResult<Self> {
        let context = StoreContext::new(store_config)?;

        let pools = create_pools(config).await?;

        let store = Self::from_pools(context, pools.configuration, pools.operational);
        if config.create_schema {
            store.ensure_schema().await?;
        }

        info!(
            separate_operational = config.operational_url.is_some(),
            "PostgreSQL identity store ready"
        );
        Ok(store)
    }

    /// Wraps existing pools. No schema is created.
    #[must_use]
    pub fn from_pools(context: StoreContext, pool: PgPool, operational_pool: PgPool) -> Self {
        Self {
            context,
            pool,
            operational_pool,
        }
    }

    #[must_use]
    pub fn context(&self) -> &StoreContext {
        &self.context
    }

    /// Pool of the configuration context.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Pool of the operational context.
    #[must_use]
    pub fn operational_pool(&self) -> &PgPool {
        &self.operational_pool
    }

    /// Creates the tables of both contexts if they are missing.
    ///
    /// # Errors
    ///
    /// Returns an error if any DDL statement fails.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        SchemaManager::new(self.pool.clone())
            .ensure_schema(&self.context.configuration)
            .await?;
        SchemaManager::new(self.operational_pool.clone())
            .ensure_schema(&self.context.operational)
            .await?;
        Ok(())
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
        let mut conn = self.pool.acquire().await.map_err(from_sqlx_error)?;

        let Some(id) = graph::find_key(&mut conn, registry, A::KIND, column, value, false).await?
        else {
            return Ok(None);
        };
        graph::load_node(&mut conn, registry, A::KIND, id)
            .await?
            .map(|node| A::from_node(&node))
            .transpose()
    }

    /// Loads every aggregate of a kind, in key order.
    pub(crate) async fn all_aggregates<A: Aggregate>(&self) -> StoreResult<Vec<A>> {
        let registry = &self.context.configuration;
        let mut conn = self.pool.acquire().await.map_err(from_sqlx_error)?;

        graph::load_all(&mut conn, registry, A::KIND)
            .await?
            .iter()
            .map(A::from_node)
            .collect()
    }

    /// Writes an aggregate in one transaction. With `natural_key` set, the
    /// stored aggregate is located by that column; otherwise by the surrogate
    /// id of `desired`, where id 0 means insert.
    #[instrument(skip(self, desired), fields(kind = %A::KIND))]
    pub(crate) async fn write_aggregate<A: Aggregate + Entity>(
        &self,
        desired: &A,
        natural_key: Option<(&str, &str)>,
    ) -> StoreResult<i64> {
        let registry = &self.context.configuration;
        let mut tx = self.pool.begin().await.map_err(from_sqlx_error)?;

        let stored = locate(&mut tx, registry, desired, natural_key).await?;
        let id = apply(&mut tx, registry, stored.as_ref(), desired).await?;
        tx.commit().await.map_err(from_sqlx_error)?;
        Ok(id)
    }

    /// Saves a resource by name. The audit stamps are taken from the root
    /// row locked by this transaction.
    #[instrument(skip(self, entity), fields(kind = %A::KIND))]
    pub(crate) async fn save_resource<A: Aggregate + Entity + Audited>(
        &self,
        mut entity: A,
        name: &str,
        model_created: Option<OffsetDateTime>,
    ) -> StoreResult<i64> {
        let registry = &self.context.configuration;
        let mut tx = self.pool.begin().await.map_err(from_sqlx_error)?;

        let stored = locate(&mut tx, registry, &entity, Some((NAME, name))).await?;
        let stored_entity = stored.as_ref().map(A::from_node).transpose()?;
        stamp_resource_save(&mut entity, stored_entity.as_ref(), model_created, now_utc());

        let id = apply(&mut tx, registry, stored.as_ref(), &entity).await?;
        tx.commit().await.map_err(from_sqlx_error)?;
        Ok(id)
    }

    /// Deletes the aggregate whose `column` holds `value`, children first.
    #[instrument(skip(self), fields(kind = %A::KIND))]
    pub(crate) async fn delete_aggregate<A: Aggregate>(
        &self,
        column: &str,
        value: &str,
    ) -> StoreResult<bool> {
        let registry = &self.context.configuration;
        let mut tx = self.pool.begin().await.map_err(from_sqlx_error)?;

        let Some(id) = graph::find_key(&mut tx, registry, A::KIND, column, value, true).await?
        else {
            return Ok(false);
        };
        let Some(stored) = graph::load_node(&mut tx, registry, A::KIND, id).await? else {
            return Ok(false);
        };

        let change = NodeChange::Delete {
            rows: plan_delete(&stored)?,
        };
        graph::apply_change(&mut tx, registry, &change, None).await?;
        tx.commit().await.map_err(from_sqlx_error)?;

        debug!(id, rows = stored.count(), "Deleted aggregate");
        Ok(true)
    }
}

/// Locks and loads the stored counterpart of `desired`.
async fn locate<A: Aggregate + Entity>(
    conn: &mut PgConnection,
    registry: &MappingRegistry,
    desired: &A,
    natural_key: Option<(&str, &str)>,
) -> StoreResult<Option<Node>> {
    let stored_id = match natural_key {
        Some((column, value)) => {
            graph::find_key(conn, registry, A::KIND, column, value, true).await?
        }
        None if desired.is_transient() => None,
        None => {
            let id = desired.id();
            graph::lock_key(conn, registry, A::KIND, id)
                .await?
                .then_some(id)
        }
    };
    match stored_id {
        Some(id) => graph::load_node(conn, registry, A::KIND, id).await,
        None => Ok(None),
    }
}

/// Plans `desired` against `stored` and runs the statements.
async fn apply<A: Aggregate>(
    conn: &mut PgConnection,
    registry: &MappingRegistry,
    stored: Option<&Node>,
    desired: &A,
) -> StoreResult<i64> {
    let change = plan_changes(registry, stored, &desired.to_node())?;
    debug!(
        statements = change.statement_count(),
        "Applying aggregate change"
    );

    graph::apply_change(conn, registry, &change, None)
        .await?
        .ok_or_else(|| StoreError::database(format!("{} was not written", A::KIND)))
}
