//! Physical table naming.
//!
//! Entity types are registered under a logical name. A deployment can move
//! any of them to a different table or schema through the store options; the
//! resolution below runs once, when the mapping registry is built.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-entity table override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfiguration {
    /// Table name.
    pub name: String,
    /// Schema name. Falls back to the store's default schema when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

impl TableConfiguration {
    /// Creates an override that only renames the table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
        }
    }

    /// Sets the schema.
    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}

/// Source of naming configuration for one storage context.
pub trait TableNaming {
    /// Schema applied to every table without an explicit schema.
    fn default_schema(&self) -> Option<&str>;

    /// Override registered for a logical entity name.
    fn table_override(&self, logical_name: &str) -> Option<&TableConfiguration>;
}

/// Resolved `(schema, table)` pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhysicalTable {
    /// Schema qualifier, if any.
    pub schema: Option<String>,
    /// Table name.
    pub name: String,
}

impl PhysicalTable {
    /// Creates an unqualified table name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    /// Quoted, schema-qualified identifier for use in SQL.
    #[must_use]
    pub fn qualified(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quote_identifier(schema), quote_identifier(&self.name)),
            None => quote_identifier(&self.name),
        }
    }
}

impl fmt::Display for PhysicalTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Quotes an SQL identifier, doubling embedded quotes.
#[must_use]
pub fn quote_identifier(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Resolves the physical table for an entity.
///
/// * override name wins over `conventional_name`
/// * override schema wins over the default schema
/// * blank strings count as absent
#[must_use]
pub fn resolve_table(
    logical_name: &str,
    conventional_name: &str,
    naming: &impl TableNaming,
) -> PhysicalTable {
    let default_schema = non_blank(naming.default_schema());

    match naming.table_override(logical_name) {
        Some(table) => PhysicalTable {
            schema: non_blank(table.schema.as_deref()).or(default_schema),
            name: non_blank(Some(table.name.as_str()))
                .unwrap_or_else(|| conventional_name.to_string()),
        },
        None => PhysicalTable {
            schema: default_schema,
            name: conventional_name.to_string(),
        },
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}
