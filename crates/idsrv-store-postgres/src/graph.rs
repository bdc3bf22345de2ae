//! Loading aggregate trees and applying planned changes on one connection.
//!
//! Callers pass a transaction's connection when the work must be atomic.

use std::future::Future;
use std::pin::Pin;

use idsrv_store::error::{StoreError, StoreResult};
use idsrv_store::mapping::{EntityKind, MappingRegistry, Node, NodeChange};
use sqlx_core::query::query;
use sqlx_postgres::PgConnection;
use tracing::trace;

use crate::error::from_sqlx_error;
use crate::sql;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Key of the root whose `column` equals `value`. With `lock`, the row stays
/// locked until the transaction ends.
pub(crate) async fn find_key(
    conn: &mut PgConnection,
    registry: &MappingRegistry,
    kind: EntityKind,
    column: &str,
    value: &str,
    lock: bool,
) -> StoreResult<Option<i64>> {
    let mapping = registry.get(kind)?;
    sqlx_core::query_scalar::query_scalar::<_, i64>(&sql::select_key(mapping, column, lock))
        .bind(value)
        .fetch_optional(&mut *conn)
        .await
        .map_err(from_sqlx_error)
}

/// Locks the root with surrogate key `id`. Returns `false` if it is absent.
pub(crate) async fn lock_key(
    conn: &mut PgConnection,
    registry: &MappingRegistry,
    kind: EntityKind,
    id: i64,
) -> StoreResult<bool> {
    let mapping = registry.get(kind)?;
    let found = sqlx_core::query_scalar::query_scalar::<_, i64>(&sql::select_key(
        mapping,
        mapping.primary_key.column(),
        true,
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(from_sqlx_error)?;
    Ok(found.is_some())
}

/// Loads one root row and all of its descendants.
pub(crate) async fn load_node(
    conn: &mut PgConnection,
    registry: &MappingRegistry,
    kind: EntityKind,
    id: i64,
) -> StoreResult<Option<Node>> {
    let mapping = registry.get(kind)?;
    let Some(pg_row) = query(&sql::select_by(mapping, mapping.primary_key.column()))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(from_sqlx_error)?
    else {
        return Ok(None);
    };

    let mut node = Node {
        kind,
        id: Some(id),
        row: sql::decode_row(&pg_row, mapping)?,
        children: Vec::new(),
    };
    load_children(conn, registry, &mut node).await?;
    Ok(Some(node))
}

/// Loads every root of `kind` with descendants, in key order.
pub(crate) async fn load_all(
    conn: &mut PgConnection,
    registry: &MappingRegistry,
    kind: EntityKind,
) -> StoreResult<Vec<Node>> {
    let mapping = registry.get(kind)?;
    let rows = query(&sql::select_all(mapping))
        .fetch_all(&mut *conn)
        .await
        .map_err(from_sqlx_error)?;

    let mut nodes = Vec::with_capacity(rows.len());
    for pg_row in &rows {
        let mut node = Node {
            kind,
            id: Some(sql::decode_key(pg_row, mapping)?),
            row: sql::decode_row(pg_row, mapping)?,
            children: Vec::new(),
        };
        load_children(conn, registry, &mut node).await?;
        nodes.push(node);
    }
    Ok(nodes)
}

fn load_children<'a>(
    conn: &'a mut PgConnection,
    registry: &'a MappingRegistry,
    node: &'a mut Node,
) -> BoxFuture<'a, StoreResult<()>> {
    Box::pin(async move {
        let id = node
            .id
            .ok_or_else(|| StoreError::database(format!("stored {} has no id", node.kind)))?;

        for collection in &registry.get(node.kind)?.collections {
            let child_mapping = registry.get(collection.child)?;
            let rows = query(&sql::select_by(child_mapping, collection.foreign_key_column))
                .bind(id)
                .fetch_all(&mut *conn)
                .await
                .map_err(from_sqlx_error)?;

            for pg_row in &rows {
                let mut child = Node {
                    kind: collection.child,
                    id: Some(sql::decode_key(pg_row, child_mapping)?),
                    row: sql::decode_row(pg_row, child_mapping)?,
                    children: Vec::new(),
                };
                load_children(conn, registry, &mut child).await?;
                node.children.push(child);
            }
        }
        Ok(())
    })
}

/// Applies a planned change. Returns the key of the node written, if any.
pub(crate) fn apply_change<'a>(
    conn: &'a mut PgConnection,
    registry: &'a MappingRegistry,
    change: &'a NodeChange,
    parent: Option<i64>,
) -> BoxFuture<'a, StoreResult<Option<i64>>> {
    Box::pin(async move {
        match change {
            NodeChange::Insert {
                kind,
                row,
                children,
            } => {
                let mapping = registry.get(*kind)?;
                let columns = mapping.column_names();
                let foreign_key = registry
                    .owner_of(*kind)
                    .map(|(_, collection)| collection.foreign_key_column);

                let statement = sql::insert(mapping, &columns, foreign_key);
                trace!(sql = %statement, "insert");
                let mut q = sql::bind_row(query(&statement), mapping, row, &columns)?;
                if foreign_key.is_some() {
                    q = q.bind(parent);
                }
                let pg_row = q.fetch_one(&mut *conn).await.map_err(from_sqlx_error)?;
                let id = sql::decode_key(&pg_row, mapping)?;

                for child in children {
                    apply_change(conn, registry, child, Some(id)).await?;
                }
                Ok(Some(id))
            }
            NodeChange::Update {
                kind,
                id,
                changes,
                children,
            } => {
                if !changes.is_empty() {
                    let mapping = registry.get(*kind)?;
                    let columns: Vec<&str> = changes.iter().map(|(c, _)| c).collect();

                    let statement = sql::update(mapping, &columns);
                    trace!(sql = %statement, "update");
                    let result = sql::bind_row(query(&statement), mapping, changes, &columns)?
                        .bind(*id)
                        .execute(&mut *conn)
                        .await
                        .map_err(from_sqlx_error)?;
                    if result.rows_affected() == 0 {
                        return Err(StoreError::constraint_violation(
                            mapping.primary_key_name(),
                            format!("{kind} {id} does not exist"),
                        ));
                    }
                }
                for child in children {
                    apply_change(conn, registry, child, Some(*id)).await?;
                }
                Ok(Some(*id))
            }
            NodeChange::Delete { rows } => {
                for (kind, id) in rows {
                    let mapping = registry.get(*kind)?;
                    query(&sql::delete(mapping))
                        .bind(*id)
                        .execute(&mut *conn)
                        .await
                        .map_err(from_sqlx_error)?;
                }
                Ok(None)
            }
        }
    })
}
