use async_trait::async_trait;
use idsrv_store::entities::PersistedGrant;
use idsrv_store::error::{StoreError, StoreResult};
use idsrv_store::mapping::{EntityKind, EntityMapping, Record, Row};
use idsrv_store::model::PersistedGrantFilter;
use idsrv_store::store::{PersistedGrantStore, check_expiration_unchanged};
use sqlx_core::query::query;
use sqlx_postgres::PgConnection;
use time::OffsetDateTime;
use tracing::{debug, instrument};

use crate::error::from_sqlx_error;
use crate::sql;
use crate::store::PostgresIdentityStore;

const KEY: &str = "Key";

/// Subject is required; the other criteria apply when bound non-null.
const FILTER: &str = r#""SubjectId" = $1 AND ($2::text IS NULL OR "ClientId" = $2) AND ($3::text IS NULL OR "SessionId" = $3) AND ($4::text IS NULL OR "Type" = $4)"#;

const EXPIRED: &str = r#""Expiration" <= $1"#;

fn expired_batch(mapping: &EntityMapping) -> String {
    format!(
        r#""Key" IN (SELECT "Key" FROM {} WHERE "Expiration" <= $1 ORDER BY "Expiration", "Key" LIMIT $2 FOR UPDATE SKIP LOCKED)"#,
        mapping.table.qualified()
    )
}

fn bind_filter<'q>(q: sql::PgQuery<'q>, filter: &PersistedGrantFilter) -> sql::PgQuery<'q> {
    q.bind(filter.subject_id.clone())
        .bind(filter.client_id.clone())
        .bind(filter.session_id.clone())
        .bind(filter.grant_type.clone())
}

/// Reads the grant row with `key`, locked until the transaction ends.
async fn lock_grant(
    conn: &mut PgConnection,
    mapping: &EntityMapping,
    key: &str,
) -> StoreResult<Option<Row>> {
    let statement = format!("{} FOR UPDATE", sql::select_by(mapping, KEY));
    query(&statement)
        .bind(key)
        .fetch_optional(&mut *conn)
        .await
        .map_err(from_sqlx_error)?
        .map(|pg_row| sql::decode_row(&pg_row, mapping))
        .transpose()
}

impl PostgresIdentityStore {
    fn grant_mapping(&self) -> StoreResult<&EntityMapping> {
        self.context.operational.get(EntityKind::PersistedGrant)
    }
}

#[async_trait]
impl PersistedGrantStore for PostgresIdentityStore {
    #[instrument(skip(self, grant), fields(key = %grant.key))]
    async fn store(&self, grant: &PersistedGrant) -> StoreResult<()> {
        let mapping = self.grant_mapping()?;
        let row = grant.to_row();
        mapping.validate_row(&row)?;

        let mut tx = self
            .operational_pool
            .begin()
            .await
            .map_err(from_sqlx_error)?;

        let stored_row = match lock_grant(&mut tx, mapping, &grant.key).await? {
            Some(stored_row) => stored_row,
            None => {
                let columns = mapping.column_names();
                let statement = sql::insert_or_ignore(mapping, &columns);
                let inserted = sql::bind_row(query(&statement), mapping, &row, &columns)?
                    .execute(&mut *tx)
                    .await
                    .map_err(from_sqlx_error)?
                    .rows_affected();

                if inserted > 0 {
                    tx.commit().await.map_err(from_sqlx_error)?;
                    debug!(grant_type = %grant.grant_type, "Stored new grant");
                    return Ok(());
                }

                // a concurrent writer committed the key first
                lock_grant(&mut tx, mapping, &grant.key)
                    .await?
                    .ok_or_else(|| {
                        StoreError::transient(format!(
                            "grant '{}' was removed while being stored",
                            grant.key
                        ))
                    })?
            }
        };

        let stored = PersistedGrant::from_row(&stored_row)?;
        check_expiration_unchanged(Some(&stored), grant)?;

        let changes = if self.context.operational.dynamic_update(EntityKind::PersistedGrant) {
            row.changed_from(&stored_row)
        } else {
            row.clone()
        };
        let columns: Vec<&str> = changes
            .iter()
            .map(|(c, _)| c)
            .filter(|c| *c != KEY)
            .collect();

        if !columns.is_empty() {
            let statement = sql::update(mapping, &columns);
            sql::bind_row(query(&statement), mapping, &changes, &columns)?
                .bind(grant.key.as_str())
                .execute(&mut *tx)
                .await
                .map_err(from_sqlx_error)?;
        }

        tx.commit().await.map_err(from_sqlx_error)?;
        debug!(grant_type = %grant.grant_type, "Stored grant");
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<PersistedGrant>> {
        let mapping = self.grant_mapping()?;
        let Some(pg_row) = query(&sql::select_by(mapping, KEY))
            .bind(key)
            .fetch_optional(&self.operational_pool)
            .await
            .map_err(from_sqlx_error)?
        else {
            return Ok(None);
        };
        PersistedGrant::from_row(&sql::decode_row(&pg_row, mapping)?).map(Some)
    }

    async fn get_all(&self, filter: &PersistedGrantFilter) -> StoreResult<Vec<PersistedGrant>> {
        filter.validate()?;
        let mapping = self.grant_mapping()?;

        let statement = sql::select_where(mapping, FILTER);
        let rows = bind_filter(query(&statement), filter)
            .fetch_all(&self.operational_pool)
            .await
            .map_err(from_sqlx_error)?;

        rows.iter()
            .map(|pg_row| PersistedGrant::from_row(&sql::decode_row(pg_row, mapping)?))
            .collect()
    }

    async fn remove(&self, key: &str) -> StoreResult<bool> {
        let mapping = self.grant_mapping()?;
        let result = query(&sql::delete(mapping))
            .bind(key)
            .execute(&self.operational_pool)
            .await
            .map_err(from_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn remove_all(&self, filter: &PersistedGrantFilter) -> StoreResult<u64> {
        filter.validate()?;
        let mapping = self.grant_mapping()?;

        let statement = sql::delete_where(mapping, FILTER);
        let result = bind_filter(query(&statement), filter)
            .execute(&self.operational_pool)
            .await
            .map_err(from_sqlx_error)?;
        debug!(removed = result.rows_affected(), "Removed grants");
        Ok(result.rows_affected())
    }

    async fn update_consumed_time(&self, key: &str, consumed: OffsetDateTime) -> StoreResult<bool> {
        let mapping = self.grant_mapping()?;
        let result = query(&sql::update(mapping, &["ConsumedTime"]))
            .bind(consumed)
            .bind(key)
            .execute(&self.operational_pool)
            .await
            .map_err(from_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn remove_expired(&self, cutoff: OffsetDateTime) -> StoreResult<u64> {
        let mapping = self.grant_mapping()?;
        let result = query(&sql::delete_where(mapping, EXPIRED))
            .bind(cutoff)
            .execute(&self.operational_pool)
            .await
            .map_err(from_sqlx_error)?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn remove_expired_batch(&self, cutoff: OffsetDateTime, batch_size: usize) -> StoreResult<u64> {
        let mapping = self.grant_mapping()?;
        let limit = i64::try_from(batch_size).unwrap_or(i64::MAX);

        let result = query(&sql::delete_where(mapping, &expired_batch(mapping)))
            .bind(cutoff)
            .bind(limit)
            .execute(&self.operational_pool)
            .await
            .map_err(from_sqlx_error)?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use idsrv_store::config::OperationalStoreOptions;
    use idsrv_store::mapping::operational_registry;
    use idsrv_store::naming::TableConfiguration;

    use super::*;

    #[test]
    fn test_expired_batch_locks_and_orders() {
        let options = OperationalStoreOptions::default()
            .with_persisted_grants(TableConfiguration::new("Grants").with_schema("ops"));
        let registry = operational_registry(&options).unwrap();
        let mapping = registry.get(EntityKind::PersistedGrant).unwrap();

        assert_eq!(
            sql::delete_where(mapping, &expired_batch(mapping)),
            r#"DELETE FROM "ops"."Grants" WHERE "Key" IN (SELECT "Key" FROM "ops"."Grants" WHERE "Expiration" <= $1 ORDER BY "Expiration", "Key" LIMIT $2 FOR UPDATE SKIP LOCKED)"#
        );
    }

    #[test]
    fn test_filter_query_orders_by_key() {
        let registry = operational_registry(&OperationalStoreOptions::default()).unwrap();
        let mapping = registry.get(EntityKind::PersistedGrant).unwrap();
        let statement = sql::select_where(mapping, FILTER);

        assert!(statement.starts_with(r#"SELECT "Key", "Type", "SubjectId""#));
        assert!(statement.contains(r#"FROM "PersistedGrants" WHERE "SubjectId" = $1"#));
        assert!(statement.ends_with(r#"ORDER BY "Key""#));
    }
}
