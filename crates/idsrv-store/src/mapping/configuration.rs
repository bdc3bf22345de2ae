//! Mappings for the configuration context.

use crate::config::ConfigurationStoreOptions;
use crate::error::StoreResult;

use super::{ColumnDef, ContextKind, EntityKind, EntityMapping, MappingRegistry, MappingRegistryBuilder};

/// Builds the registry for clients, API resources and identity resources.
///
/// # Errors
///
/// Returns `StoreError::Configuration` if the options produce an inconsistent
/// registry (for example two entities renamed onto the same table).
pub fn configuration_registry(options: &ConfigurationStoreOptions) -> StoreResult<MappingRegistry> {
    let dynamic = options.dynamic_update;
    let map = |kind: EntityKind| EntityMapping::builder(kind, options).dynamic_update(dynamic);

    let mut builder = MappingRegistryBuilder::new(ContextKind::Configuration);

    // Clients
    builder.register(
        map(EntityKind::Client)
            .column(ColumnDef::boolean("Enabled"))
            .column(ColumnDef::text("ClientId", 200))
            .column(ColumnDef::text("ProtocolType", 200))
            .column(ColumnDef::boolean("RequireClientSecret"))
            .column(ColumnDef::text("ClientName", 200).nullable())
            .column(ColumnDef::text("Description", 1000).nullable())
            .column(ColumnDef::text("ClientUri", 2000).nullable())
            .column(ColumnDef::text("LogoUri", 2000).nullable())
            .column(ColumnDef::boolean("RequireConsent"))
            .column(ColumnDef::boolean("AllowRememberConsent"))
            .column(ColumnDef::boolean("AlwaysIncludeUserClaimsInIdToken"))
            .column(ColumnDef::boolean("RequirePkce"))
            .column(ColumnDef::boolean("AllowPlainTextPkce"))
            .column(ColumnDef::boolean("AllowAccessTokensViaBrowser"))
            .column(ColumnDef::text("FrontChannelLogoutUri", 2000).nullable())
            .column(ColumnDef::boolean("FrontChannelLogoutSessionRequired"))
            .column(ColumnDef::text("BackChannelLogoutUri", 2000).nullable())
            .column(ColumnDef::boolean("BackChannelLogoutSessionRequired"))
            .column(ColumnDef::boolean("AllowOfflineAccess"))
            .column(ColumnDef::integer("IdentityTokenLifetime"))
            .column(ColumnDef::integer("AccessTokenLifetime"))
            .column(ColumnDef::integer("AuthorizationCodeLifetime"))
            .column(ColumnDef::integer("ConsentLifetime").nullable())
            .column(ColumnDef::integer("AbsoluteRefreshTokenLifetime"))
            .column(ColumnDef::integer("SlidingRefreshTokenLifetime"))
            .column(ColumnDef::integer("RefreshTokenUsage"))
            .column(ColumnDef::boolean("UpdateAccessTokenClaimsOnRefresh"))
            .column(ColumnDef::integer("RefreshTokenExpiration"))
            .column(ColumnDef::integer("AccessTokenType"))
            .column(ColumnDef::boolean("EnableLocalLogin"))
            .column(ColumnDef::boolean("IncludeJwtId"))
            .column(ColumnDef::boolean("AlwaysSendClientClaims"))
            .column(ColumnDef::text("ClientClaimsPrefix", 200).nullable())
            .column(ColumnDef::text("PairWiseSubjectSalt", 200).nullable())
            .unique("UK_ClientId", &["ClientId"])
            .owns(EntityKind::ClientGrantType, "ClientId")
            .owns(EntityKind::ClientSecret, "ClientId")
            .owns(EntityKind::ClientRedirectUri, "ClientId")
            .owns(EntityKind::ClientPostLogoutRedirectUri, "ClientId")
            .owns(EntityKind::ClientScope, "ClientId")
            .owns(EntityKind::ClientIdPRestriction, "ClientId")
            .owns(EntityKind::ClientClaim, "ClientId")
            .owns(EntityKind::ClientCorsOrigin, "ClientId")
            .owns(EntityKind::ClientProperty, "ClientId")
            .build(),
    )?;
    builder.register(
        map(EntityKind::ClientGrantType)
            .column(ColumnDef::text("GrantType", 250))
            .build(),
    )?;
    builder.register(
        map(EntityKind::ClientSecret)
            .column(ColumnDef::text("Description", 2000).nullable())
            .column(ColumnDef::text("Value", 2000))
            .column(ColumnDef::timestamp("Expiration").nullable())
            .column(ColumnDef::text("Type", 250))
            .build(),
    )?;
    builder.register(
        map(EntityKind::ClientRedirectUri)
            .column(ColumnDef::text("RedirectUri", 2000))
            .build(),
    )?;
    builder.register(
        map(EntityKind::ClientPostLogoutRedirectUri)
            .column(ColumnDef::text("PostLogoutRedirectUri", 2000))
            .build(),
    )?;
    builder.register(
        map(EntityKind::ClientScope)
            .column(ColumnDef::text("Scope", 200))
            .build(),
    )?;
    builder.register(
        map(EntityKind::ClientIdPRestriction)
            .column(ColumnDef::text("Provider", 200))
            .build(),
    )?;
    builder.register(
        map(EntityKind::ClientClaim)
            .column(ColumnDef::text("Type", 250))
            .column(ColumnDef::text("Value", 250))
            .build(),
    )?;
    builder.register(
        map(EntityKind::ClientCorsOrigin)
            .column(ColumnDef::text("Origin", 150))
            .build(),
    )?;
    builder.register(
        map(EntityKind::ClientProperty)
            .column(ColumnDef::text("Key", 250))
            .column(ColumnDef::text("Value", 2000))
            .build(),
    )?;

    // API resources
    builder.register(
        map(EntityKind::ApiResource)
            .column(ColumnDef::boolean("Enabled"))
            .column(ColumnDef::text("Name", 200))
            .column(ColumnDef::text("DisplayName", 200).nullable())
            .column(ColumnDef::text("Description", 1000).nullable())
            .column(ColumnDef::timestamp("Created"))
            .column(ColumnDef::timestamp("Updated").nullable())
            .column(ColumnDef::timestamp("LastAccessed").nullable())
            .column(ColumnDef::boolean("NonEditable"))
            .unique("UK_ApiResourceName", &["Name"])
            .owns(EntityKind::ApiSecret, "ApiResourceId")
            .owns(EntityKind::ApiScope, "ApiResourceId")
            .owns(EntityKind::ApiResourceClaim, "ApiResourceId")
            .owns(EntityKind::ApiResourceProperty, "ApiResourceId")
            .build(),
    )?;
    builder.register(
        map(EntityKind::ApiSecret)
            .column(ColumnDef::text("Description", 1000).nullable())
            .column(ColumnDef::text("Value", 2000))
            .column(ColumnDef::timestamp("Expiration").nullable())
            .column(ColumnDef::text("Type", 250))
            .build(),
    )?;
    builder.register(
        map(EntityKind::ApiScope)
            .column(ColumnDef::text("Name", 200))
            .column(ColumnDef::text("DisplayName", 200).nullable())
            .column(ColumnDef::text("Description", 1000).nullable())
            .column(ColumnDef::boolean("Required"))
            .column(ColumnDef::boolean("Emphasize"))
            .column(ColumnDef::boolean("ShowInDiscoveryDocument"))
            .unique("UK_ApiScopeName", &["Name"])
            .owns(EntityKind::ApiScopeClaim, "ApiScopeId")
            .build(),
    )?;
    builder.register(
        map(EntityKind::ApiScopeClaim)
            .column(ColumnDef::text("Type", 200))
            .build(),
    )?;
    builder.register(
        map(EntityKind::ApiResourceClaim)
            .column(ColumnDef::text("Type", 200))
            .build(),
    )?;
    builder.register(
        map(EntityKind::ApiResourceProperty)
            .column(ColumnDef::text("Key", 250))
            .column(ColumnDef::text("Value", 2000))
            .build(),
    )?;

    // Identity resources
    builder.register(
        map(EntityKind::IdentityResource)
            .column(ColumnDef::boolean("Enabled"))
            .column(ColumnDef::text("Name", 200))
            .column(ColumnDef::text("DisplayName", 200).nullable())
            .column(ColumnDef::text("Description", 1000).nullable())
            .column(ColumnDef::boolean("Required"))
            .column(ColumnDef::boolean("Emphasize"))
            .column(ColumnDef::boolean("ShowInDiscoveryDocument"))
            .column(ColumnDef::timestamp("Created"))
            .column(ColumnDef::timestamp("Updated").nullable())
            .column(ColumnDef::timestamp("LastAccessed").nullable())
            .column(ColumnDef::boolean("NonEditable"))
            .unique("UK_IdentityResourceName", &["Name"])
            .owns(EntityKind::IdentityClaim, "IdentityResourceId")
            .owns(EntityKind::IdentityResourceProperty, "IdentityResourceId")
            .build(),
    )?;
    builder.register(
        map(EntityKind::IdentityClaim)
            .column(ColumnDef::text("Type", 200))
            .build(),
    )?;
    builder.register(
        map(EntityKind::IdentityResourceProperty)
            .column(ColumnDef::text("Key", 250))
            .column(ColumnDef::text("Value", 2000))
            .build(),
    )?;

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::{PhysicalTable, TableConfiguration};

    #[test]
    fn test_every_configuration_kind_is_mapped() {
        let registry = configuration_registry(&ConfigurationStoreOptions::default()).unwrap();
        for kind in EntityKind::ALL {
            assert_eq!(
                registry.contains(kind),
                kind != EntityKind::PersistedGrant,
                "{kind}"
            );
        }
    }

    #[test]
    fn test_default_tables_and_constraints() {
        let registry = configuration_registry(&ConfigurationStoreOptions::default()).unwrap();

        let client = registry.get(EntityKind::Client).unwrap();
        assert_eq!(client.table, PhysicalTable::new("Clients"));
        assert_eq!(client.unique_keys[0].name, "UK_ClientId");
        assert_eq!(client.collections.len(), 9);
        assert!(!client.dynamic_update);

        let redirect = registry.get(EntityKind::ClientRedirectUri).unwrap();
        let column = redirect.column("RedirectUri").unwrap();
        assert_eq!(column.max_length, Some(2000));
        assert!(!column.nullable);

        let (_, owned) = registry.owner_of(EntityKind::ApiScopeClaim).unwrap();
        assert_eq!(owned.foreign_key_column, "ApiScopeId");
        assert_eq!(owned.foreign_key_name, "FK_ApiScopeClaims_ApiScopes");
    }

    #[test]
    fn test_overrides_compose_with_default_schema() {
        let options = ConfigurationStoreOptions::default()
            .with_default_schema("idsrv")
            .with_table("Client", TableConfiguration::new("OAuthClients"))
            .with_table(
                "ClientSecret",
                TableConfiguration::new("Secrets").with_schema("vault"),
            );
        let registry = configuration_registry(&options).unwrap();

        let client = registry.get(EntityKind::Client).unwrap();
        assert_eq!(client.table.qualified(), "\"idsrv\".\"OAuthClients\"");

        let secret = registry.get(EntityKind::ClientSecret).unwrap();
        assert_eq!(secret.table.qualified(), "\"vault\".\"Secrets\"");

        let scope = registry.get(EntityKind::ClientScope).unwrap();
        assert_eq!(scope.table.qualified(), "\"idsrv\".\"ClientScopes\"");

        let (_, owned) = registry.owner_of(EntityKind::ClientSecret).unwrap();
        assert_eq!(owned.foreign_key_name, "FK_Secrets_OAuthClients");
    }

    #[test]
    fn test_registration_is_deterministic() {
        let options = ConfigurationStoreOptions::default().with_default_schema("idsrv");
        let a = configuration_registry(&options).unwrap();
        let b = configuration_registry(&options).unwrap();
        let tables_a: Vec<_> = a.iter().map(|m| m.table.clone()).collect();
        let tables_b: Vec<_> = b.iter().map(|m| m.table.clone()).collect();
        assert_eq!(tables_a, tables_b);
    }

    #[test]
    fn test_dynamic_update_is_configurable() {
        let options = ConfigurationStoreOptions::default().with_dynamic_update(true);
        let registry = configuration_registry(&options).unwrap();
        assert!(registry.dynamic_update(EntityKind::Client));
        assert!(registry.dynamic_update(EntityKind::ClientSecret));
    }
}
