//! SQL text and parameter binding derived from entity mappings.
//!
//! Statements are built from the registry once per call; every identifier is
//! quoted, every value is a bind parameter.

use idsrv_store::error::{StoreError, StoreResult};
use idsrv_store::mapping::{ColumnDef, ColumnType, ColumnValue, EntityMapping, Row};
use idsrv_store::naming::quote_identifier;
use sqlx_core::query::Query;
use sqlx_core::row::Row as _;
use sqlx_postgres::{PgArguments, PgRow, Postgres};
use time::OffsetDateTime;

use crate::error::from_sqlx_error;

pub(crate) type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

// =============================================================================
// Statement text
// =============================================================================

fn column_list(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn select_columns(mapping: &EntityMapping) -> String {
    let mut columns = Vec::with_capacity(mapping.columns.len() + 1);
    if mapping.primary_key.is_generated() {
        columns.push(mapping.primary_key.column());
    }
    columns.extend(mapping.columns.iter().map(|c| c.name));
    column_list(&columns)
}

/// `SELECT <key>, <columns> FROM <table> WHERE <predicate> ORDER BY <key>`
pub(crate) fn select_where(mapping: &EntityMapping, predicate: &str) -> String {
    format!(
        "SELECT {} FROM {} WHERE {} ORDER BY {}",
        select_columns(mapping),
        mapping.table.qualified(),
        predicate,
        quote_identifier(mapping.primary_key.column()),
    )
}

/// Rows whose `filter_column` equals `$1`.
pub(crate) fn select_by(mapping: &EntityMapping, filter_column: &str) -> String {
    select_where(mapping, &format!("{} = $1", quote_identifier(filter_column)))
}

/// Every row of a table in key order.
pub(crate) fn select_all(mapping: &EntityMapping) -> String {
    format!(
        "SELECT {} FROM {} ORDER BY {}",
        select_columns(mapping),
        mapping.table.qualified(),
        quote_identifier(mapping.primary_key.column()),
    )
}

/// Key of the row whose `column` equals `$1`. With `for_update` the row stays
/// locked for the rest of the transaction.
pub(crate) fn select_key(mapping: &EntityMapping, column: &str, for_update: bool) -> String {
    let mut sql = format!(
        "SELECT {} FROM {} WHERE {} = $1",
        quote_identifier(mapping.primary_key.column()),
        mapping.table.qualified(),
        quote_identifier(column),
    );
    if for_update {
        sql.push_str(" FOR UPDATE");
    }
    sql
}

/// Insert of `columns` (plus the owner's foreign key, if any). Generated keys
/// are returned.
pub(crate) fn insert(mapping: &EntityMapping, columns: &[&str], foreign_key: Option<&str>) -> String {
    let mut all: Vec<&str> = columns.to_vec();
    all.extend(foreign_key);

    let placeholders = (1..=all.len())
        .map(|n| format!("${n}"))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        mapping.table.qualified(),
        column_list(&all),
        placeholders,
    );
    if mapping.primary_key.is_generated() {
        sql.push_str(" RETURNING ");
        sql.push_str(&quote_identifier(mapping.primary_key.column()));
    }
    sql
}

/// Insert of `columns` that does nothing if the primary key is already taken.
pub(crate) fn insert_or_ignore(mapping: &EntityMapping, columns: &[&str]) -> String {
    format!(
        "{} ON CONFLICT ({}) DO NOTHING",
        insert(mapping, columns, None),
        quote_identifier(mapping.primary_key.column()),
    )
}

/// Update of `columns` on the row whose key is the last parameter.
pub(crate) fn update(mapping: &EntityMapping, columns: &[&str]) -> String {
    let assignments = columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = ${}", quote_identifier(c), i + 1))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "UPDATE {} SET {} WHERE {} = ${}",
        mapping.table.qualified(),
        assignments,
        quote_identifier(mapping.primary_key.column()),
        columns.len() + 1,
    )
}

/// Delete of every row matching `predicate`.
pub(crate) fn delete_where(mapping: &EntityMapping, predicate: &str) -> String {
    format!("DELETE FROM {} WHERE {}", mapping.table.qualified(), predicate)
}

/// Delete of the row whose key is `$1`.
pub(crate) fn delete(mapping: &EntityMapping) -> String {
    format!(
        "DELETE FROM {} WHERE {} = $1",
        mapping.table.qualified(),
        quote_identifier(mapping.primary_key.column()),
    )
}

// =============================================================================
// Values
// =============================================================================

/// Binds `value` as the SQL type of `column`. Nulls are bound typed.
pub(crate) fn bind_value<'q>(
    query: PgQuery<'q>,
    column: &ColumnDef,
    value: &ColumnValue,
) -> StoreResult<PgQuery<'q>> {
    let query = match (column.column_type, value) {
        (ColumnType::Integer, ColumnValue::Null) => query.bind(None::<i32>),
        (ColumnType::BigInt, ColumnValue::Null) => query.bind(None::<i64>),
        (ColumnType::Boolean, ColumnValue::Null) => query.bind(None::<bool>),
        (ColumnType::Text, ColumnValue::Null) => query.bind(None::<String>),
        (ColumnType::Timestamp, ColumnValue::Null) => query.bind(None::<OffsetDateTime>),
        (ColumnType::Integer, ColumnValue::Int(v)) => {
            let v = i32::try_from(*v).map_err(|_| {
                StoreError::database(format!("{} does not fit column {}", v, column.name))
            })?;
            query.bind(v)
        }
        (ColumnType::BigInt, ColumnValue::Int(v)) => query.bind(*v),
        (ColumnType::Boolean, ColumnValue::Bool(v)) => query.bind(*v),
        (ColumnType::Text, ColumnValue::Text(v)) => query.bind(v.clone()),
        (ColumnType::Timestamp, ColumnValue::Timestamp(v)) => query.bind(*v),
        (column_type, value) => {
            return Err(StoreError::database(format!(
                "cannot bind {value:?} to {column_type:?} column {}",
                column.name
            )));
        }
    };
    Ok(query)
}

/// Binds the named columns of `row` in order.
pub(crate) fn bind_row<'q>(
    mut query: PgQuery<'q>,
    mapping: &EntityMapping,
    row: &Row,
    columns: &[&str],
) -> StoreResult<PgQuery<'q>> {
    for name in columns {
        let column = mapping.column(name).ok_or_else(|| {
            StoreError::database(format!("{} has no column {name}", mapping.table))
        })?;
        let value = row.get(name).unwrap_or(&ColumnValue::Null);
        query = bind_value(query, column, value)?;
    }
    Ok(query)
}

/// Reads the mapped columns of a result row.
pub(crate) fn decode_row(pg_row: &PgRow, mapping: &EntityMapping) -> StoreResult<Row> {
    let mut row = Row::new();
    for column in &mapping.columns {
        let name = column.name;
        let value = match column.column_type {
            ColumnType::Integer => ColumnValue::from(
                pg_row.try_get::<Option<i32>, _>(name).map_err(from_sqlx_error)?,
            ),
            ColumnType::BigInt => ColumnValue::from(
                pg_row.try_get::<Option<i64>, _>(name).map_err(from_sqlx_error)?,
            ),
            ColumnType::Boolean => ColumnValue::from(
                pg_row.try_get::<Option<bool>, _>(name).map_err(from_sqlx_error)?,
            ),
            ColumnType::Text => ColumnValue::from(
                pg_row.try_get::<Option<String>, _>(name).map_err(from_sqlx_error)?,
            ),
            ColumnType::Timestamp => ColumnValue::from(
                pg_row
                    .try_get::<Option<OffsetDateTime>, _>(name)
                    .map_err(from_sqlx_error)?,
            ),
        };
        row.set(name, value);
    }
    Ok(row)
}

/// Reads the generated key of a result row.
pub(crate) fn decode_key(pg_row: &PgRow, mapping: &EntityMapping) -> StoreResult<i64> {
    pg_row
        .try_get::<i64, _>(mapping.primary_key.column())
        .map_err(from_sqlx_error)
}
