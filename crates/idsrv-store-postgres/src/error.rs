//! Error types for the PostgreSQL backend.

use idsrv_store::StoreError;
use sqlx_core::error::Error as SqlxError;

/// SQLSTATE for unique violation.
pub const PG_UNIQUE_VIOLATION: &str = "23505";

/// SQLSTATE for foreign key violation.
pub const PG_FOREIGN_KEY_VIOLATION: &str = "23503";

/// SQLSTATE for not-null violation.
pub const PG_NOT_NULL_VIOLATION: &str = "23502";

/// SQLSTATE for a string that does not fit its column.
pub const PG_STRING_DATA_RIGHT_TRUNCATION: &str = "22001";

/// Errors raised while connecting or creating the schema.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database connection error.
    #[error("Database connection error: {0}")]
    Connection(#[from] sqlx_core::error::Error),

    /// A DDL statement was rejected by the server.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl PostgresError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<PostgresError> for StoreError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::Connection(e) => from_sqlx_error(e),
            PostgresError::Schema(message) => StoreError::database(format!("Schema error: {message}")),
            PostgresError::Config { message } => StoreError::configuration(message),
        }
    }
}

/// Result type alias for connection and schema operations.
pub type Result<T> = std::result::Result<T, PostgresError>;

/// Maps a sqlx error onto the store taxonomy.
///
/// Integrity violations keep the constraint name reported by the server so
/// callers can tell `UK_ClientId` from an `FK_` failure.
pub fn from_sqlx_error(err: SqlxError) -> StoreError {
    match &err {
        SqlxError::Database(db_err) => classify(
            db_err.code().as_deref(),
            db_err.constraint(),
            db_err.table(),
            db_err.message(),
        ),
        SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::Io(_) | SqlxError::Tls(_) => {
            StoreError::transient(err.to_string())
        }
        SqlxError::WorkerCrashed => StoreError::transient(err.to_string()),
        _ => StoreError::database(err.to_string()),
    }
}

/// Maps a server-reported error by SQLSTATE.
pub(crate) fn classify(
    code: Option<&str>,
    constraint: Option<&str>,
    table: Option<&str>,
    message: &str,
) -> StoreError {
    match code {
        Some(PG_UNIQUE_VIOLATION | PG_FOREIGN_KEY_VIOLATION | PG_NOT_NULL_VIOLATION) => {
            StoreError::constraint_violation(constraint.unwrap_or("unknown"), message)
        }
        Some(PG_STRING_DATA_RIGHT_TRUNCATION) => {
            StoreError::validation(table.unwrap_or_default(), "", message)
        }
        // connection exceptions, admin shutdown, serialization failure, deadlock
        Some(code) if code.starts_with("08") || code.starts_with("57P") => {
            StoreError::transient(message)
        }
        Some("40001" | "40P01") => StoreError::transient(message),
        _ => StoreError::database(message),
    }
}
