//! Store configuration.
//!
//! Two independent option sets, one per storage context. Both are read once
//! when the store is constructed.
//!
//! # Example (TOML)
//!
//! ```toml
//! [configuration]
//! default_schema = "idsrv"
//!
//! [configuration.tables.Client]
//! name = "OAuthClients"
//!
//! [operational]
//! enable_token_cleanup = true
//! token_cleanup_interval = "30m"
//!
//! [operational.persisted_grants]
//! name = "Grants"
//! schema = "ops"
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::mapping::{ContextKind, EntityKind};
use crate::naming::{TableConfiguration, TableNaming};

/// Logical name of the grant table.
pub const PERSISTED_GRANTS: &str = "PersistedGrants";

/// Options for the configuration context (clients and resources).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfigurationStoreOptions {
    /// Schema applied to every configuration table.
    pub default_schema: Option<String>,

    /// Table overrides keyed by entity type name (`Client`, `ClientSecret`, ...).
    pub tables: BTreeMap<String, TableConfiguration>,

    /// Send only changed columns on update.
    pub dynamic_update: bool,
}

impl ConfigurationStoreOptions {
    /// Sets the default schema.
    #[must_use]
    pub fn with_default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = Some(schema.into());
        self
    }

    /// Adds a table override for an entity type.
    #[must_use]
    pub fn with_table(mut self, logical_name: impl Into<String>, table: TableConfiguration) -> Self {
        self.tables.insert(logical_name.into(), table);
        self
    }

    /// Sets the dynamic update policy.
    #[must_use]
    pub fn with_dynamic_update(mut self, enabled: bool) -> Self {
        self.dynamic_update = enabled;
        self
    }
}

impl TableNaming for ConfigurationStoreOptions {
    fn default_schema(&self) -> Option<&str> {
        self.default_schema.as_deref()
    }

    fn table_override(&self, logical_name: &str) -> Option<&TableConfiguration> {
        self.tables.get(logical_name)
    }
}

/// Options for the operational context (persisted grants).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct OperationalStoreOptions {
    /// Schema applied to the grant table.
    pub default_schema: Option<String>,

    /// Override for the `PersistedGrants` table.
    pub persisted_grants: Option<TableConfiguration>,

    /// Send only changed columns on update.
    pub dynamic_update: bool,

    /// Run the periodic expired-grant sweep.
    pub enable_token_cleanup: bool,

    /// Delay between two sweeps.
    #[serde(with = "humantime_serde")]
    pub token_cleanup_interval: Duration,

    /// Rows removed per sweep batch.
    pub token_cleanup_batch_size: usize,
}

impl Default for OperationalStoreOptions {
    fn default() -> Self {
        Self {
            default_schema: None,
            persisted_grants: None,
            dynamic_update: true,
            enable_token_cleanup: false,
            token_cleanup_interval: Duration::from_secs(3600),
            token_cleanup_batch_size: 100,
        }
    }
}

impl OperationalStoreOptions {
    /// Sets the default schema.
    #[must_use]
    pub fn with_default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = Some(schema.into());
        self
    }

    /// Overrides the grant table.
    #[must_use]
    pub fn with_persisted_grants(mut self, table: TableConfiguration) -> Self {
        self.persisted_grants = Some(table);
        self
    }

    /// Enables the expired-grant sweep.
    #[must_use]
    pub fn with_token_cleanup(mut self, interval: Duration, batch_size: usize) -> Self {
        self.enable_token_cleanup = true;
        self.token_cleanup_interval = interval;
        self.token_cleanup_batch_size = batch_size;
        self
    }
}

impl TableNaming for OperationalStoreOptions {
    fn default_schema(&self) -> Option<&str> {
        self.default_schema.as_deref()
    }

    fn table_override(&self, logical_name: &str) -> Option<&TableConfiguration> {
        if logical_name == PERSISTED_GRANTS {
            self.persisted_grants.as_ref()
        } else {
            None
        }
    }
}

/// Complete store configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Client and resource tables.
    pub configuration: ConfigurationStoreOptions,
    /// Grant table and sweep.
    pub operational: OperationalStoreOptions,
}

impl StoreConfig {
    /// Checks the options for mistakes that would otherwise surface as
    /// confusing SQL errors.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Configuration` on the first problem found.
    pub fn validate(&self) -> StoreResult<()> {
        for (logical, table) in &self.configuration.tables {
            let known = EntityKind::from_logical_name(logical)
                .is_some_and(|kind| kind.context() == ContextKind::Configuration);
            if !known {
                return Err(StoreError::configuration(format!(
                    "unknown configuration entity '{logical}' in table overrides"
                )));
            }
            if table.name.trim().is_empty() {
                return Err(StoreError::configuration(format!(
                    "table override for '{logical}' has an empty name"
                )));
            }
        }

        if let Some(table) = &self.operational.persisted_grants
            && table.name.trim().is_empty()
        {
            return Err(StoreError::configuration(format!(
                "table override for '{PERSISTED_GRANTS}' has an empty name"
            )));
        }

        if self.operational.token_cleanup_batch_size == 0 {
            return Err(StoreError::configuration(
                "token_cleanup_batch_size must be greater than zero",
            ));
        }

        if self.operational.enable_token_cleanup && self.operational.token_cleanup_interval.is_zero()
        {
            return Err(StoreError::configuration(
                "token_cleanup_interval must be greater than zero",
            ));
        }

        Ok(())
    }
}

pub mod loader {
    //! File and environment loading.

    use std::path::PathBuf;

    use config::{Config, Environment, File};

    use super::StoreConfig;
    use crate::error::{StoreError, StoreResult};

    /// Default file looked up when no path is given.
    pub const DEFAULT_CONFIG_FILE: &str = "idsrv-store.toml";

    /// Environment prefix, e.g. `IDSRV_STORE__OPERATIONAL__DEFAULT_SCHEMA=ops`.
    pub const ENV_PREFIX: &str = "IDSRV_STORE";

    /// Loads the store configuration from an optional TOML file plus
    /// environment overrides, then validates it.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Configuration` if the sources cannot be read or
    /// the merged configuration is invalid.
    pub fn load_config(path: Option<&str>) -> StoreResult<StoreConfig> {
        let mut builder = Config::builder();

        let file = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if file.exists() {
            builder = builder.add_source(File::from(file));
        } else if let Some(p) = path {
            return Err(StoreError::configuration(format!(
                "configuration file '{p}' does not exist"
            )));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .separator("__"),
        );

        let merged: StoreConfig = builder
            .build()
            .map_err(|e| StoreError::configuration(format!("config build error: {e}")))?
            .try_deserialize()
            .map_err(|e| StoreError::configuration(format!("config deserialize error: {e}")))?;

        merged.validate()?;
        tracing::debug!(
            default_schema = ?merged.configuration.default_schema,
            overrides = merged.configuration.tables.len(),
            "Loaded store configuration"
        );
        Ok(merged)
    }
}
