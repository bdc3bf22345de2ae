use std::fmt;

use super::ContextKind;

/// Every mapped entity type.
///
/// Variants are declared parent before child, which is also the order tables
/// are created in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    Client,
    ClientGrantType,
    ClientSecret,
    ClientRedirectUri,
    ClientPostLogoutRedirectUri,
    ClientScope,
    ClientIdPRestriction,
    ClientClaim,
    ClientCorsOrigin,
    ClientProperty,
    ApiResource,
    ApiSecret,
    ApiScope,
    ApiScopeClaim,
    ApiResourceClaim,
    ApiResourceProperty,
    IdentityResource,
    IdentityClaim,
    IdentityResourceProperty,
    PersistedGrant,
}

impl EntityKind {
    /// All kinds, parent before child.
    pub const ALL: [EntityKind; 20] = [
        Self::Client,
        Self::ClientGrantType,
        Self::ClientSecret,
        Self::ClientRedirectUri,
        Self::ClientPostLogoutRedirectUri,
        Self::ClientScope,
        Self::ClientIdPRestriction,
        Self::ClientClaim,
        Self::ClientCorsOrigin,
        Self::ClientProperty,
        Self::ApiResource,
        Self::ApiSecret,
        Self::ApiScope,
        Self::ApiScopeClaim,
        Self::ApiResourceClaim,
        Self::ApiResourceProperty,
        Self::IdentityResource,
        Self::IdentityClaim,
        Self::IdentityResourceProperty,
        Self::PersistedGrant,
    ];

    /// Rust type name of the entity.
    #[must_use]
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Client => "Client",
            Self::ClientGrantType => "ClientGrantType",
            Self::ClientSecret => "ClientSecret",
            Self::ClientRedirectUri => "ClientRedirectUri",
            Self::ClientPostLogoutRedirectUri => "ClientPostLogoutRedirectUri",
            Self::ClientScope => "ClientScope",
            Self::ClientIdPRestriction => "ClientIdPRestriction",
            Self::ClientClaim => "ClientClaim",
            Self::ClientCorsOrigin => "ClientCorsOrigin",
            Self::ClientProperty => "ClientProperty",
            Self::ApiResource => "ApiResource",
            Self::ApiSecret => "ApiSecret",
            Self::ApiScope => "ApiScope",
            Self::ApiScopeClaim => "ApiScopeClaim",
            Self::ApiResourceClaim => "ApiResourceClaim",
            Self::ApiResourceProperty => "ApiResourceProperty",
            Self::IdentityResource => "IdentityResource",
            Self::IdentityClaim => "IdentityClaim",
            Self::IdentityResourceProperty => "IdentityResourceProperty",
            Self::PersistedGrant => "PersistedGrant",
        }
    }

    /// Name used to look up table overrides.
    ///
    /// Configuration entities use their type name. The grant table is keyed
    /// by `PersistedGrants` so it can be renamed independently of the type.
    #[must_use]
    pub fn logical_name(self) -> &'static str {
        match self {
            Self::PersistedGrant => crate::config::PERSISTED_GRANTS,
            other => other.type_name(),
        }
    }

    /// Table name used when no override is configured.
    #[must_use]
    pub fn conventional_table(self) -> &'static str {
        match self {
            Self::Client => "Clients",
            Self::ClientGrantType => "ClientGrantTypes",
            Self::ClientSecret => "ClientSecrets",
            Self::ClientRedirectUri => "ClientRedirectUris",
            Self::ClientPostLogoutRedirectUri => "ClientPostLogoutRedirectUris",
            Self::ClientScope => "ClientScopes",
            Self::ClientIdPRestriction => "ClientIdPRestrictions",
            Self::ClientClaim => "ClientClaims",
            Self::ClientCorsOrigin => "ClientCorsOrigins",
            Self::ClientProperty => "ClientProperties",
            Self::ApiResource => "ApiResources",
            Self::ApiSecret => "ApiSecrets",
            Self::ApiScope => "ApiScopes",
            Self::ApiScopeClaim => "ApiScopeClaims",
            Self::ApiResourceClaim => "ApiClaims",
            Self::ApiResourceProperty => "ApiProperties",
            Self::IdentityResource => "IdentityResources",
            Self::IdentityClaim => "IdentityClaims",
            Self::IdentityResourceProperty => "IdentityProperties",
            Self::PersistedGrant => "PersistedGrants",
        }
    }

    /// Looks a kind up by its logical name.
    #[must_use]
    pub fn from_logical_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.logical_name() == name)
    }

    /// Storage context the kind belongs to.
    #[must_use]
    pub fn context(self) -> ContextKind {
        match self {
            Self::PersistedGrant => ContextKind::Operational,
            _ => ContextKind::Configuration,
        }
    }

    /// Returns `true` for kinds that are not owned by another kind.
    #[must_use]
    pub fn is_aggregate_root(self) -> bool {
        matches!(
            self,
            Self::Client | Self::ApiResource | Self::IdentityResource | Self::PersistedGrant
        )
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}
