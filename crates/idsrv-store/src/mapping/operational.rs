//! Mapping for the operational context.

use crate::config::OperationalStoreOptions;
use crate::error::StoreResult;

use super::{ColumnDef, ContextKind, EntityKind, EntityMapping, MappingRegistry, MappingRegistryBuilder};

/// Builds the registry holding the persisted grant table.
///
/// The table is resolved through the `PersistedGrants` logical name.
///
/// # Errors
///
/// Returns `StoreError::Configuration` if the registry is inconsistent.
pub fn operational_registry(options: &OperationalStoreOptions) -> StoreResult<MappingRegistry> {
    let mut builder = MappingRegistryBuilder::new(ContextKind::Operational);

    builder.register(
        EntityMapping::builder(EntityKind::PersistedGrant, options)
            .natural_key(ColumnDef::text("Key", 200))
            .column(ColumnDef::text("Type", 50))
            .column(ColumnDef::text("SubjectId", 200).nullable())
            .column(ColumnDef::text("SessionId", 100).nullable())
            .column(ColumnDef::text("ClientId", 200))
            .column(ColumnDef::text("Description", 200).nullable())
            .column(ColumnDef::timestamp("CreationTime"))
            .column(ColumnDef::timestamp("Expiration").nullable())
            .column(ColumnDef::timestamp("ConsumedTime").nullable())
            .column(ColumnDef::unbounded_text("Data"))
            .dynamic_update(options.dynamic_update)
            .build(),
    )?;

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigurationStoreOptions;
    use crate::mapping::{PrimaryKey, configuration_registry};
    use crate::naming::{PhysicalTable, TableConfiguration};

    #[test]
    fn test_default_grant_table() {
        let registry = operational_registry(&OperationalStoreOptions::default()).unwrap();
        let grant = registry.get(EntityKind::PersistedGrant).unwrap();

        assert_eq!(grant.table, PhysicalTable::new("PersistedGrants"));
        assert_eq!(grant.primary_key, PrimaryKey::Natural { column: "Key" });
        assert_eq!(grant.column("Key").unwrap().max_length, Some(200));
        assert_eq!(grant.column("Data").unwrap().max_length, None);
        assert!(grant.dynamic_update);
        assert!(!registry.contains(EntityKind::Client));
    }

    #[test]
    fn test_grant_override_leaves_configuration_tables_alone() {
        let operational = OperationalStoreOptions::default()
            .with_persisted_grants(TableConfiguration::new("Grants"));
        let registry = operational_registry(&operational).unwrap();
        assert_eq!(
            registry.get(EntityKind::PersistedGrant).unwrap().table,
            PhysicalTable::new("Grants")
        );

        let configuration = configuration_registry(&ConfigurationStoreOptions::default()).unwrap();
        assert_eq!(
            configuration.get(EntityKind::Client).unwrap().table,
            PhysicalTable::new("Clients")
        );
    }

    #[test]
    fn test_grant_schema_composition() {
        let name_only = OperationalStoreOptions::default()
            .with_persisted_grants(TableConfiguration::new("Grants"));
        let schema_only = OperationalStoreOptions::default().with_default_schema("ops");
        let both = OperationalStoreOptions::default()
            .with_default_schema("ops")
            .with_persisted_grants(TableConfiguration::new("Grants"));
        let explicit = OperationalStoreOptions::default()
            .with_default_schema("ops")
            .with_persisted_grants(TableConfiguration::new("Grants").with_schema("audit"));

        let table = |options: &OperationalStoreOptions| {
            operational_registry(options)
                .unwrap()
                .get(EntityKind::PersistedGrant)
                .unwrap()
                .table
                .qualified()
        };

        assert_eq!(table(&name_only), "\"Grants\"");
        assert_eq!(table(&schema_only), "\"ops\".\"PersistedGrants\"");
        assert_eq!(table(&both), "\"ops\".\"Grants\"");
        assert_eq!(table(&explicit), "\"audit\".\"Grants\"");
    }
}
