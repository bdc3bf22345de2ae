//! Store error types.
//!
//! Every backend reports failures through [`StoreError`]. Absent rows are not
//! errors: lookups return `Ok(None)`, removals report how much they removed.

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Mapping or options are inconsistent. Raised while the store is built.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the problem.
        message: String,
    },

    /// A unique key or foreign key rejected the write.
    #[error("Constraint violation ({constraint}): {message}")]
    ConstraintViolation {
        /// Name of the violated constraint.
        constraint: String,
        /// Description of the violation.
        message: String,
    },

    /// A column value does not fit its declared shape (length, nullability, type).
    #[error("Validation error on {table}.{column}: {message}")]
    Validation {
        /// Physical table name.
        table: String,
        /// Column name.
        column: String,
        /// Description of the violation.
        message: String,
    },

    /// The caller supplied data the store cannot act on.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Connectivity was lost or the pool is exhausted. Not retried here.
    #[error("Transient storage error: {0}")]
    Transient(String),

    /// Any other failure reported by the storage engine.
    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    // -------------------------------------------------------------------------
    // Constructor Methods
    // -------------------------------------------------------------------------

    /// Create a `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a `ConstraintViolation` error.
    #[must_use]
    pub fn constraint_violation(constraint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            constraint: constraint.into(),
            message: message.into(),
        }
    }

    /// Create a `Validation` error.
    #[must_use]
    pub fn validation(
        table: impl Into<String>,
        column: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Validation {
            table: table.into(),
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create an `InvalidInput` error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a `Transient` error.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    /// Create a `Database` error.
    #[must_use]
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    // -------------------------------------------------------------------------
    // Predicate Methods
    // -------------------------------------------------------------------------

    /// Returns `true` if this is a configuration error.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    /// Returns `true` if this is a constraint violation.
    #[must_use]
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::ConstraintViolation { .. })
    }

    /// Returns `true` if this is a validation error.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Returns `true` if this is a transient error.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Returns `true` if the caller caused the failure (rejected write or bad input).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::ConstraintViolation { .. } | Self::Validation { .. } | Self::InvalidInput(_)
        )
    }

    /// Returns the violated constraint name, if any.
    #[must_use]
    pub fn constraint(&self) -> Option<&str> {
        match self {
            Self::ConstraintViolation { constraint, .. } => Some(constraint),
            _ => None,
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
