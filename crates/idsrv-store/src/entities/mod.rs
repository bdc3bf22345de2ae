//! Storage entities.
//!
//! Plain structs shaped like the relational tables. Aggregate roots own their
//! children through `Vec` fields; the foreign key back to the parent is a
//! storage concern and never appears on the child struct.

mod api_resource;
mod client;
mod identity_resource;
mod persisted_grant;

use time::OffsetDateTime;

pub use api_resource::{
    ApiResource, ApiResourceClaim, ApiResourceProperty, ApiScope, ApiScopeClaim, ApiSecret,
};
pub use client::{
    Client, ClientClaim, ClientCorsOrigin, ClientGrantType, ClientIdPRestriction,
    ClientPostLogoutRedirectUri, ClientProperty, ClientRedirectUri, ClientScope, ClientSecret,
};
pub use identity_resource::{IdentityClaim, IdentityResource, IdentityResourceProperty};
pub use persisted_grant::PersistedGrant;

/// Default secret type.
pub const SHARED_SECRET: &str = "SharedSecret";

// =============================================================================
// Capability Traits
// =============================================================================

/// Entity identified by a database-generated surrogate key.
///
/// An id of `0` means "not yet stored".
pub trait Entity {
    /// Surrogate id.
    fn id(&self) -> i64;

    /// Sets the surrogate id. Only stores call this.
    fn set_id(&mut self, id: i64);

    /// Returns `true` if the entity has not been stored yet.
    fn is_transient(&self) -> bool {
        self.id() == 0
    }
}

/// Entity with audit timestamps.
pub trait Audited {
    /// Creation time.
    fn created(&self) -> OffsetDateTime;

    /// Last modification time.
    fn updated(&self) -> Option<OffsetDateTime>;

    /// Last read through the protocol surface.
    fn last_accessed(&self) -> Option<OffsetDateTime>;

    /// Sets the creation time.
    fn set_created(&mut self, at: OffsetDateTime);

    /// Sets the modification time.
    fn set_updated(&mut self, at: OffsetDateTime);

    fn set_last_accessed(&mut self, at: Option<OffsetDateTime>);
}

/// Entity identified by a caller-supplied string key.
pub trait NaturalKey {
    /// The key.
    fn key(&self) -> &str;
}

macro_rules! impl_entity {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Entity for $ty {
                fn id(&self) -> i64 {
                    self.id
                }

                fn set_id(&mut self, id: i64) {
                    self.id = id;
                }
            }
        )+
    };
}

macro_rules! impl_audited {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Audited for $ty {
                fn created(&self) -> OffsetDateTime {
                    self.created
                }

                fn updated(&self) -> Option<OffsetDateTime> {
                    self.updated
                }

                fn last_accessed(&self) -> Option<OffsetDateTime> {
                    self.last_accessed
                }

                fn set_created(&mut self, at: OffsetDateTime) {
                    self.created = at;
                }

                fn set_updated(&mut self, at: OffsetDateTime) {
                    self.updated = Some(at);
                }

                fn set_last_accessed(&mut self, at: Option<OffsetDateTime>) {
                    self.last_accessed = at;
                }
            }
        )+
    };
}

impl_entity!(
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
);

impl_audited!(ApiResource, IdentityResource);

impl NaturalKey for PersistedGrant {
    fn key(&self) -> &str {
        &self.key
    }
}

/// Current time truncated to microseconds, the precision PostgreSQL keeps.
#[must_use]
pub fn now_utc() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    let micros = now.microsecond();
    now.replace_microsecond(micros).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entities_are_transient() {
        let mut client = Client::default();
        assert!(client.is_transient());
        client.set_id(7);
        assert_eq!(client.id(), 7);
        assert!(!client.is_transient());
    }

    #[test]
    fn test_audited_setters() {
        let mut resource = ApiResource::default();
        assert!(resource.updated().is_none());
        let at = now_utc();
        resource.set_updated(at);
        assert_eq!(resource.updated(), Some(at));
    }

    #[test]
    fn test_now_has_microsecond_precision() {
        let now = now_utc();
        assert_eq!(now.nanosecond() % 1_000, 0);
    }

    #[test]
    fn test_grant_natural_key() {
        let grant = PersistedGrant {
            key: "abc".into(),
            ..PersistedGrant::default()
        };
        assert_eq!(grant.key(), "abc");
    }
}
