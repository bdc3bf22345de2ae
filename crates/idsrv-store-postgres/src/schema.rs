//! Schema management.
//!
//! Tables, keys and indexes are generated from a mapping registry, so the
//! physical layout always matches the resolved table names. Statements are
//! idempotent (`IF NOT EXISTS`) and run in one transaction.

use idsrv_store::mapping::{ColumnDef, ColumnType, EntityKind, EntityMapping, MappingRegistry};
use idsrv_store::naming::quote_identifier;
use sqlx_core::error::Error as SqlxError;
use sqlx_postgres::PgPool;
use tracing::{debug, info, instrument};

use crate::error::{PostgresError, Result};

/// Secondary indexes on the grant table, as column lists.
const GRANT_INDEXES: &[&[&str]] = &[
    &["SubjectId", "ClientId", "Type"],
    &["SubjectId", "SessionId", "Type"],
    &["Expiration"],
];

fn sql_type(column: &ColumnDef) -> String {
    match (column.column_type, column.max_length) {
        (ColumnType::Integer, _) => "INTEGER".into(),
        (ColumnType::BigInt, _) => "BIGINT".into(),
        (ColumnType::Boolean, _) => "BOOLEAN".into(),
        (ColumnType::Text, Some(max)) => format!("VARCHAR({max})"),
        (ColumnType::Text, None) => "TEXT".into(),
        (ColumnType::Timestamp, _) => "TIMESTAMPTZ".into(),
    }
}

fn column_ddl(column: &ColumnDef) -> String {
    let mut ddl = format!("{} {}", quote_identifier(column.name), sql_type(column));
    if !column.nullable {
        ddl.push_str(" NOT NULL");
    }
    ddl
}

fn create_table(registry: &MappingRegistry, mapping: &EntityMapping) -> String {
    let key = mapping.primary_key.column();
    let mut lines = Vec::new();

    if mapping.primary_key.is_generated() {
        lines.push(format!(
            "{} BIGINT GENERATED BY DEFAULT AS IDENTITY",
            quote_identifier(key)
        ));
    }
    lines.extend(mapping.columns.iter().map(column_ddl));

    let owner = registry.owner_of(mapping.kind);
    if let Some((_, collection)) = owner {
        let null = if collection.foreign_key_nullable { "" } else { " NOT NULL" };
        lines.push(format!(
            "{} BIGINT{null}",
            quote_identifier(collection.foreign_key_column)
        ));
    }

    lines.push(format!(
        "CONSTRAINT {} PRIMARY KEY ({})",
        quote_identifier(&mapping.primary_key_name()),
        quote_identifier(key)
    ));

    for unique in &mapping.unique_keys {
        let columns = unique
            .columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!(
            "CONSTRAINT {} UNIQUE ({columns})",
            quote_identifier(&unique.name)
        ));
    }

    if let Some((parent, collection)) = owner {
        lines.push(format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            quote_identifier(&collection.foreign_key_name),
            quote_identifier(collection.foreign_key_column),
            parent.table.qualified(),
            quote_identifier(parent.primary_key.column()),
        ));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        mapping.table.qualified(),
        lines.join(",\n    ")
    )
}

fn create_index(mapping: &EntityMapping, columns: &[&str]) -> String {
    let name = format!("IX_{}_{}", mapping.table.name, columns.join("_"));
    let columns = columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE INDEX IF NOT EXISTS {} ON {} ({columns})",
        quote_identifier(&name),
        mapping.table.qualified()
    )
}

/// Wraps a server rejection of `statement` as a schema error. Connectivity
/// failures keep their own variant so they stay transient.
fn statement_failed(statement: &str, err: SqlxError) -> PostgresError {
    match err {
        SqlxError::Database(db_err) => {
            let head = statement.lines().next().unwrap_or(statement);
            PostgresError::Schema(format!("{head}: {}", db_err.message()))
        }
        other => PostgresError::Connection(other),
    }
}

/// DDL for every table of a registry, parents before children.
#[must_use]
pub fn ddl_statements(registry: &MappingRegistry) -> Vec<String> {
    let mut statements = Vec::new();

    let mut schemas: Vec<&str> = registry
        .iter()
        .filter_map(|m| m.table.schema.as_deref())
        .collect();
    schemas.sort_unstable();
    schemas.dedup();
    statements.extend(
        schemas
            .into_iter()
            .map(|s| format!("CREATE SCHEMA IF NOT EXISTS {}", quote_identifier(s))),
    );

    for mapping in registry.iter() {
        statements.push(create_table(registry, mapping));

        if let Some((_, collection)) = registry.owner_of(mapping.kind) {
            statements.push(create_index(mapping, &[collection.foreign_key_column]));
        }
        if mapping.kind == EntityKind::PersistedGrant {
            statements.extend(GRANT_INDEXES.iter().map(|cols| create_index(mapping, cols)));
        }
    }

    statements
}

/// Creates the tables of a storage context.
#[derive(Debug, Clone)]
pub struct SchemaManager {
    pool: PgPool,
}

impl SchemaManager {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates every missing schema, table, key and index of `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails; nothing is created then.
    #[instrument(skip(self, registry), fields(context = ?registry.context()))]
    pub async fn ensure_schema(&self, registry: &MappingRegistry) -> Result<()> {
        let statements = ddl_statements(registry);
        let mut tx = self.pool.begin().await?;

        for statement in &statements {
            debug!(sql = %statement, "Executing DDL");
            sqlx_core::query::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| statement_failed(statement, e))?;
        }

        tx.commit().await?;
        info!(statements = statements.len(), "Schema ensured");
        Ok(())
    }

    /// Returns `true` if every table of `registry` exists. Unqualified tables
    /// are looked up in `public`.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog query fails.
    pub async fn tables_exist(&self, registry: &MappingRegistry) -> Result<bool> {
        for mapping in registry.iter() {
            let schema = mapping.table.schema.as_deref().unwrap_or("public");
            if !self.table_exists(schema, &mapping.table.name).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Checks if a table exists in the database.
    #[instrument(skip(self))]
    async fn table_exists(&self, schema: &str, table: &str) -> Result<bool> {
        let row: Option<(bool,)> = sqlx_core::query_as::query_as(
            "SELECT EXISTS (
                SELECT FROM information_schema.tables
                WHERE table_schema = $1 AND table_name = $2
            )",
        )
        .bind(schema)
        .bind(table)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some_and(|(exists,)| exists))
    }
}

#[cfg(test)]
mod tests {
    use idsrv_store::config::{ConfigurationStoreOptions, OperationalStoreOptions};
    use idsrv_store::mapping::{configuration_registry, operational_registry};
    use idsrv_store::naming::TableConfiguration;

    use super::*;

    #[test]
    fn test_grant_table_ddl() {
        let registry = operational_registry(&OperationalStoreOptions::default()).unwrap();
        let statements = ddl_statements(&registry);

        assert_eq!(statements.len(), 4);
        assert_eq!(
            statements[0],
            "CREATE TABLE IF NOT EXISTS \"PersistedGrants\" (\n    \
             \"Key\" VARCHAR(200) NOT NULL,\n    \
             \"Type\" VARCHAR(50) NOT NULL,\n    \
             \"SubjectId\" VARCHAR(200),\n    \
             \"SessionId\" VARCHAR(100),\n    \
             \"ClientId\" VARCHAR(200) NOT NULL,\n    \
             \"Description\" VARCHAR(200),\n    \
             \"CreationTime\" TIMESTAMPTZ NOT NULL,\n    \
             \"Expiration\" TIMESTAMPTZ,\n    \
             \"ConsumedTime\" TIMESTAMPTZ,\n    \
             \"Data\" TEXT NOT NULL,\n    \
             CONSTRAINT \"PK_PersistedGrants\" PRIMARY KEY (\"Key\")\n)"
        );
        assert_eq!(
            statements[1],
            "CREATE INDEX IF NOT EXISTS \"IX_PersistedGrants_SubjectId_ClientId_Type\" \
             ON \"PersistedGrants\" (\"SubjectId\", \"ClientId\", \"Type\")"
        );
    }

    #[test]
    fn test_child_table_references_parent() {
        let registry =
            configuration_registry(&ConfigurationStoreOptions::default().with_default_schema("cfg"))
                .unwrap();
        let statements = ddl_statements(&registry);

        assert_eq!(statements[0], "CREATE SCHEMA IF NOT EXISTS \"cfg\"");

        let secrets = statements
            .iter()
            .find(|s| s.starts_with("CREATE TABLE IF NOT EXISTS \"cfg\".\"ClientSecrets\""))
            .unwrap();
        assert!(secrets.contains("\"Id\" BIGINT GENERATED BY DEFAULT AS IDENTITY"));
        assert!(secrets.contains("\"ClientId\" BIGINT NOT NULL"));
        assert!(secrets.contains(
            "CONSTRAINT \"FK_ClientSecrets_Clients\" FOREIGN KEY (\"ClientId\") \
             REFERENCES \"cfg\".\"Clients\" (\"Id\")"
        ));

        let clients_at = statements
            .iter()
            .position(|s| s.contains("\"cfg\".\"Clients\" ("))
            .unwrap();
        let secrets_at = statements.iter().position(|s| s == secrets).unwrap();
        assert!(clients_at < secrets_at);
    }

    #[test]
    fn test_unique_keys_are_named() {
        let registry = configuration_registry(&ConfigurationStoreOptions::default()).unwrap();
        let statements = ddl_statements(&registry);
        assert!(statements
            .iter()
            .any(|s| s.contains("CONSTRAINT \"UK_ClientId\" UNIQUE (\"ClientId\")")));
        assert!(statements
            .iter()
            .any(|s| s.contains("CONSTRAINT \"UK_ApiScopeName\" UNIQUE (\"Name\")")));
    }

    #[test]
    fn test_statement_failure_keeps_connectivity_errors() {
        let err = statement_failed("CREATE TABLE x (\n  y INT\n)", SqlxError::PoolTimedOut);
        assert!(matches!(err, PostgresError::Connection(SqlxError::PoolTimedOut)));
        let err: idsrv_store::StoreError = err.into();
        assert!(err.is_transient());
    }

    #[test]
    fn test_override_changes_only_named_table() {
        let options = ConfigurationStoreOptions::default()
            .with_table("ClientSecret", TableConfiguration::new("Secrets").with_schema("vault"));
        let registry = configuration_registry(&options).unwrap();
        let statements = ddl_statements(&registry);

        assert_eq!(statements[0], "CREATE SCHEMA IF NOT EXISTS \"vault\"");
        assert!(statements
            .iter()
            .any(|s| s.contains("\"FK_Secrets_Clients\"")));
        assert!(statements
            .iter()
            .any(|s| s.starts_with("CREATE TABLE IF NOT EXISTS \"Clients\" (")));
    }
}
