//! Conversion between entities and generic rows.
//!
//! A [`Row`] holds every mapped column of one entity except its generated key
//! and the foreign key to its owner; both travel on the [`Node`] instead.

use crate::entities::{
    ApiResource, ApiResourceClaim, ApiResourceProperty, ApiScope, ApiScopeClaim, ApiSecret,
    Client, ClientClaim, ClientCorsOrigin, ClientGrantType, ClientIdPRestriction,
    ClientPostLogoutRedirectUri, ClientProperty, ClientRedirectUri, ClientScope, ClientSecret,
    Entity, IdentityClaim, IdentityResource, IdentityResourceProperty, PersistedGrant,
};
use crate::error::StoreResult;

use super::{EntityKind, Row};

/// Entity that maps to exactly one table row.
pub trait Record: Sized {
    const KIND: EntityKind;

    fn to_row(&self) -> Row;

    /// Builds the entity from a row. The surrogate id, if any, is left at 0.
    ///
    /// # Errors
    ///
    /// Fails if a column is missing or holds a value of the wrong type.
    fn from_row(row: &Row) -> StoreResult<Self>;
}

/// One entity in an aggregate tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: EntityKind,
    /// Surrogate id; `None` for entities that have not been stored.
    pub id: Option<i64>,
    pub row: Row,
    /// Owned children in collection declaration order.
    pub children: Vec<Node>,
}

impl Node {
    /// Leaf node for a surrogate-keyed record.
    pub fn of<R: Record + Entity>(record: &R) -> Self {
        let id = record.id();
        Self {
            kind: R::KIND,
            id: (id != 0).then_some(id),
            row: record.to_row(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_children<R: Record + Entity>(mut self, records: &[R]) -> Self {
        self.children.extend(records.iter().map(Node::of));
        self
    }

    /// Children of one kind.
    pub fn children_of(&self, kind: EntityKind) -> impl Iterator<Item = &Node> {
        self.children.iter().filter(move |c| c.kind == kind)
    }

    /// Restores the entity this node was built from.
    ///
    /// # Errors
    ///
    /// Fails if the row does not decode into `R`.
    pub fn to_record<R: Record + Entity>(&self) -> StoreResult<R> {
        let mut record = R::from_row(&self.row)?;
        record.set_id(self.id.unwrap_or(0));
        Ok(record)
    }

    fn collect<R: Record + Entity>(&self) -> StoreResult<Vec<R>> {
        self.children_of(R::KIND).map(Node::to_record).collect()
    }

    /// Number of nodes in the tree, including this one.
    #[must_use]
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Node::count).sum::<usize>()
    }
}

/// Aggregate root with owned collections.
pub trait Aggregate: Sized {
    const KIND: EntityKind;

    fn to_node(&self) -> Node;

    /// # Errors
    ///
    /// Fails if any row in the tree does not decode.
    fn from_node(node: &Node) -> StoreResult<Self>;
}

// =============================================================================
// Aggregates
// =============================================================================

impl Aggregate for Client {
    const KIND: EntityKind = EntityKind::Client;

    fn to_node(&self) -> Node {
        Node::of(self)
            .with_children(&self.allowed_grant_types)
            .with_children(&self.client_secrets)
            .with_children(&self.redirect_uris)
            .with_children(&self.post_logout_redirect_uris)
            .with_children(&self.allowed_scopes)
            .with_children(&self.identity_provider_restrictions)
            .with_children(&self.claims)
            .with_children(&self.allowed_cors_origins)
            .with_children(&self.properties)
    }

    fn from_node(node: &Node) -> StoreResult<Self> {
        let mut client: Client = node.to_record()?;
        client.allowed_grant_types = node.collect()?;
        client.client_secrets = node.collect()?;
        client.redirect_uris = node.collect()?;
        client.post_logout_redirect_uris = node.collect()?;
        client.allowed_scopes = node.collect()?;
        client.identity_provider_restrictions = node.collect()?;
        client.claims = node.collect()?;
        client.allowed_cors_origins = node.collect()?;
        client.properties = node.collect()?;
        Ok(client)
    }
}

impl Aggregate for ApiResource {
    const KIND: EntityKind = EntityKind::ApiResource;

    fn to_node(&self) -> Node {
        let mut node = Node::of(self).with_children(&self.secrets);
        node.children.extend(
            self.scopes
                .iter()
                .map(|scope| Node::of(scope).with_children(&scope.user_claims)),
        );
        node.with_children(&self.user_claims)
            .with_children(&self.properties)
    }

    fn from_node(node: &Node) -> StoreResult<Self> {
        let mut api: ApiResource = node.to_record()?;
        api.secrets = node.collect()?;
        api.scopes = node
            .children_of(EntityKind::ApiScope)
            .map(|scope_node| {
                let mut scope: ApiScope = scope_node.to_record()?;
                scope.user_claims = scope_node.collect()?;
                Ok(scope)
            })
            .collect::<StoreResult<_>>()?;
        api.user_claims = node.collect()?;
        api.properties = node.collect()?;
        Ok(api)
    }
}

impl Aggregate for IdentityResource {
    const KIND: EntityKind = EntityKind::IdentityResource;

    fn to_node(&self) -> Node {
        Node::of(self)
            .with_children(&self.user_claims)
            .with_children(&self.properties)
    }

    fn from_node(node: &Node) -> StoreResult<Self> {
        let mut identity: IdentityResource = node.to_record()?;
        identity.user_claims = node.collect()?;
        identity.properties = node.collect()?;
        Ok(identity)
    }
}

// =============================================================================
// Client rows
// =============================================================================

impl Record for Client {
    const KIND: EntityKind = EntityKind::Client;

    fn to_row(&self) -> Row {
        Row::new()
            .with("Enabled", self.enabled)
            .with("ClientId", self.client_id.as_str())
            .with("ProtocolType", self.protocol_type.as_str())
            .with("RequireClientSecret", self.require_client_secret)
            .with("ClientName", self.client_name.as_deref())
            .with("Description", self.description.as_deref())
            .with("ClientUri", self.client_uri.as_deref())
            .with("LogoUri", self.logo_uri.as_deref())
            .with("RequireConsent", self.require_consent)
            .with("AllowRememberConsent", self.allow_remember_consent)
            .with(
                "AlwaysIncludeUserClaimsInIdToken",
                self.always_include_user_claims_in_id_token,
            )
            .with("RequirePkce", self.require_pkce)
            .with("AllowPlainTextPkce", self.allow_plain_text_pkce)
            .with(
                "AllowAccessTokensViaBrowser",
                self.allow_access_tokens_via_browser,
            )
            .with("FrontChannelLogoutUri", self.front_channel_logout_uri.as_deref())
            .with(
                "FrontChannelLogoutSessionRequired",
                self.front_channel_logout_session_required,
            )
            .with("BackChannelLogoutUri", self.back_channel_logout_uri.as_deref())
            .with(
                "BackChannelLogoutSessionRequired",
                self.back_channel_logout_session_required,
            )
            .with("AllowOfflineAccess", self.allow_offline_access)
            .with("IdentityTokenLifetime", self.identity_token_lifetime)
            .with("AccessTokenLifetime", self.access_token_lifetime)
            .with("AuthorizationCodeLifetime", self.authorization_code_lifetime)
            .with("ConsentLifetime", self.consent_lifetime)
            .with(
                "AbsoluteRefreshTokenLifetime",
                self.absolute_refresh_token_lifetime,
            )
            .with(
                "SlidingRefreshTokenLifetime",
                self.sliding_refresh_token_lifetime,
            )
            .with("RefreshTokenUsage", self.refresh_token_usage)
            .with(
                "UpdateAccessTokenClaimsOnRefresh",
                self.update_access_token_claims_on_refresh,
            )
            .with("RefreshTokenExpiration", self.refresh_token_expiration)
            .with("AccessTokenType", self.access_token_type)
            .with("EnableLocalLogin", self.enable_local_login)
            .with("IncludeJwtId", self.include_jwt_id)
            .with("AlwaysSendClientClaims", self.always_send_client_claims)
            .with("ClientClaimsPrefix", self.client_claims_prefix.as_deref())
            .with("PairWiseSubjectSalt", self.pair_wise_subject_salt.as_deref())
    }

    fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            id: 0,
            enabled: row.boolean("Enabled")?,
            client_id: row.text("ClientId")?,
            protocol_type: row.text("ProtocolType")?,
            require_client_secret: row.boolean("RequireClientSecret")?,
            client_name: row.opt_text("ClientName")?,
            description: row.opt_text("Description")?,
            client_uri: row.opt_text("ClientUri")?,
            logo_uri: row.opt_text("LogoUri")?,
            require_consent: row.boolean("RequireConsent")?,
            allow_remember_consent: row.boolean("AllowRememberConsent")?,
            always_include_user_claims_in_id_token: row
                .boolean("AlwaysIncludeUserClaimsInIdToken")?,
            require_pkce: row.boolean("RequirePkce")?,
            allow_plain_text_pkce: row.boolean("AllowPlainTextPkce")?,
            allow_access_tokens_via_browser: row.boolean("AllowAccessTokensViaBrowser")?,
            front_channel_logout_uri: row.opt_text("FrontChannelLogoutUri")?,
            front_channel_logout_session_required: row
                .boolean("FrontChannelLogoutSessionRequired")?,
            back_channel_logout_uri: row.opt_text("BackChannelLogoutUri")?,
            back_channel_logout_session_required: row
                .boolean("BackChannelLogoutSessionRequired")?,
            allow_offline_access: row.boolean("AllowOfflineAccess")?,
            identity_token_lifetime: row.int("IdentityTokenLifetime")?,
            access_token_lifetime: row.int("AccessTokenLifetime")?,
            authorization_code_lifetime: row.int("AuthorizationCodeLifetime")?,
            consent_lifetime: row.opt_int("ConsentLifetime")?,
            absolute_refresh_token_lifetime: row.int("AbsoluteRefreshTokenLifetime")?,
            sliding_refresh_token_lifetime: row.int("SlidingRefreshTokenLifetime")?,
            refresh_token_usage: row.int("RefreshTokenUsage")?,
            update_access_token_claims_on_refresh: row
                .boolean("UpdateAccessTokenClaimsOnRefresh")?,
            refresh_token_expiration: row.int("RefreshTokenExpiration")?,
            access_token_type: row.int("AccessTokenType")?,
            enable_local_login: row.boolean("EnableLocalLogin")?,
            include_jwt_id: row.boolean("IncludeJwtId")?,
            always_send_client_claims: row.boolean("AlwaysSendClientClaims")?,
            client_claims_prefix: row.opt_text("ClientClaimsPrefix")?,
            pair_wise_subject_salt: row.opt_text("PairWiseSubjectSalt")?,
            ..Self::default()
        })
    }
}

impl Record for ClientGrantType {
    const KIND: EntityKind = EntityKind::ClientGrantType;

    fn to_row(&self) -> Row {
        Row::new().with("GrantType", self.grant_type.as_str())
    }

    fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            id: 0,
            grant_type: row.text("GrantType")?,
        })
    }
}

impl Record for ClientSecret {
    const KIND: EntityKind = EntityKind::ClientSecret;

    fn to_row(&self) -> Row {
        Row::new()
            .with("Description", self.description.as_deref())
            .with("Value", self.value.as_str())
            .with("Expiration", self.expiration)
            .with("Type", self.secret_type.as_str())
    }

    fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            id: 0,
            description: row.opt_text("Description")?,
            value: row.text("Value")?,
            expiration: row.opt_timestamp("Expiration")?,
            secret_type: row.text("Type")?,
        })
    }
}

impl Record for ClientRedirectUri {
    const KIND: EntityKind = EntityKind::ClientRedirectUri;

    fn to_row(&self) -> Row {
        Row::new().with("RedirectUri", self.redirect_uri.as_str())
    }

    fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            id: 0,
            redirect_uri: row.text("RedirectUri")?,
        })
    }
}

impl Record for ClientPostLogoutRedirectUri {
    const KIND: EntityKind = EntityKind::ClientPostLogoutRedirectUri;

    fn to_row(&self) -> Row {
        Row::new().with(
            "PostLogoutRedirectUri",
            self.post_logout_redirect_uri.as_str(),
        )
    }

    fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            id: 0,
            post_logout_redirect_uri: row.text("PostLogoutRedirectUri")?,
        })
    }
}

impl Record for ClientScope {
    const KIND: EntityKind = EntityKind::ClientScope;

    fn to_row(&self) -> Row {
        Row::new().with("Scope", self.scope.as_str())
    }

    fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            id: 0,
            scope: row.text("Scope")?,
        })
    }
}

impl Record for ClientIdPRestriction {
    const KIND: EntityKind = EntityKind::ClientIdPRestriction;

    fn to_row(&self) -> Row {
        Row::new().with("Provider", self.provider.as_str())
    }

    fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            id: 0,
            provider: row.text("Provider")?,
        })
    }
}

impl Record for ClientClaim {
    const KIND: EntityKind = EntityKind::ClientClaim;

    fn to_row(&self) -> Row {
        Row::new()
            .with("Type", self.claim_type.as_str())
            .with("Value", self.value.as_str())
    }

    fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            id: 0,
            claim_type: row.text("Type")?,
            value: row.text("Value")?,
        })
    }
}

impl Record for ClientCorsOrigin {
    const KIND: EntityKind = EntityKind::ClientCorsOrigin;

    fn to_row(&self) -> Row {
        Row::new().with("Origin", self.origin.as_str())
    }

    fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            id: 0,
            origin: row.text("Origin")?,
        })
    }
}

impl Record for ClientProperty {
    const KIND: EntityKind = EntityKind::ClientProperty;

    fn to_row(&self) -> Row {
        Row::new()
            .with("Key", self.key.as_str())
            .with("Value", self.value.as_str())
    }

    fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            id: 0,
            key: row.text("Key")?,
            value: row.text("Value")?,
        })
    }
}

// =============================================================================
// API resource rows
// =============================================================================

impl Record for ApiResource {
    const KIND: EntityKind = EntityKind::ApiResource;

    fn to_row(&self) -> Row {
        Row::new()
            .with("Enabled", self.enabled)
            .with("Name", self.name.as_str())
            .with("DisplayName", self.display_name.as_deref())
            .with("Description", self.description.as_deref())
            .with("Created", self.created)
            .with("Updated", self.updated)
            .with("LastAccessed", self.last_accessed)
            .with("NonEditable", self.non_editable)
    }

    fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            id: 0,
            enabled: row.boolean("Enabled")?,
            name: row.text("Name")?,
            display_name: row.opt_text("DisplayName")?,
            description: row.opt_text("Description")?,
            created: row.timestamp("Created")?,
            updated: row.opt_timestamp("Updated")?,
            last_accessed: row.opt_timestamp("LastAccessed")?,
            non_editable: row.boolean("NonEditable")?,
            secrets: Vec::new(),
            scopes: Vec::new(),
            user_claims: Vec::new(),
            properties: Vec::new(),
        })
    }
}

impl Record for ApiSecret {
    const KIND: EntityKind = EntityKind::ApiSecret;

    fn to_row(&self) -> Row {
        Row::new()
            .with("Description", self.description.as_deref())
            .with("Value", self.value.as_str())
            .with("Expiration", self.expiration)
            .with("Type", self.secret_type.as_str())
    }

    fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            id: 0,
            description: row.opt_text("Description")?,
            value: row.text("Value")?,
            expiration: row.opt_timestamp("Expiration")?,
            secret_type: row.text("Type")?,
        })
    }
}

impl Record for ApiScope {
    const KIND: EntityKind = EntityKind::ApiScope;

    fn to_row(&self) -> Row {
        Row::new()
            .with("Name", self.name.as_str())
            .with("DisplayName", self.display_name.as_deref())
            .with("Description", self.description.as_deref())
            .with("Required", self.required)
            .with("Emphasize", self.emphasize)
            .with("ShowInDiscoveryDocument", self.show_in_discovery_document)
    }

    fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            id: 0,
            name: row.text("Name")?,
            display_name: row.opt_text("DisplayName")?,
            description: row.opt_text("Description")?,
            required: row.boolean("Required")?,
            emphasize: row.boolean("Emphasize")?,
            show_in_discovery_document: row.boolean("ShowInDiscoveryDocument")?,
            user_claims: Vec::new(),
        })
    }
}

impl Record for ApiScopeClaim {
    const KIND: EntityKind = EntityKind::ApiScopeClaim;

    fn to_row(&self) -> Row {
        Row::new().with("Type", self.claim_type.as_str())
    }

    fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            id: 0,
            claim_type: row.text("Type")?,
        })
    }
}

impl Record for ApiResourceClaim {
    const KIND: EntityKind = EntityKind::ApiResourceClaim;

    fn to_row(&self) -> Row {
        Row::new().with("Type", self.claim_type.as_str())
    }

    fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            id: 0,
            claim_type: row.text("Type")?,
        })
    }
}

impl Record for ApiResourceProperty {
    const KIND: EntityKind = EntityKind::ApiResourceProperty;

    fn to_row(&self) -> Row {
        Row::new()
            .with("Key", self.key.as_str())
            .with("Value", self.value.as_str())
    }

    fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            id: 0,
            key: row.text("Key")?,
            value: row.text("Value")?,
        })
    }
}

// =============================================================================
// Identity resource rows
// =============================================================================

impl Record for IdentityResource {
    const KIND: EntityKind = EntityKind::IdentityResource;

    fn to_row(&self) -> Row {
        Row::new()
            .with("Enabled", self.enabled)
            .with("Name", self.name.as_str())
            .with("DisplayName", self.display_name.as_deref())
            .with("Description", self.description.as_deref())
            .with("Required", self.required)
            .with("Emphasize", self.emphasize)
            .with("ShowInDiscoveryDocument", self.show_in_discovery_document)
            .with("Created", self.created)
            .with("Updated", self.updated)
            .with("LastAccessed", self.last_accessed)
            .with("NonEditable", self.non_editable)
    }

    fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            id: 0,
            enabled: row.boolean("Enabled")?,
            name: row.text("Name")?,
            display_name: row.opt_text("DisplayName")?,
            description: row.opt_text("Description")?,
            required: row.boolean("Required")?,
            emphasize: row.boolean("Emphasize")?,
            show_in_discovery_document: row.boolean("ShowInDiscoveryDocument")?,
            created: row.timestamp("Created")?,
            updated: row.opt_timestamp("Updated")?,
            last_accessed: row.opt_timestamp("LastAccessed")?,
            non_editable: row.boolean("NonEditable")?,
            user_claims: Vec::new(),
            properties: Vec::new(),
        })
    }
}

impl Record for IdentityClaim {
    const KIND: EntityKind = EntityKind::IdentityClaim;

    fn to_row(&self) -> Row {
        Row::new().with("Type", self.claim_type.as_str())
    }

    fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            id: 0,
            claim_type: row.text("Type")?,
        })
    }
}

impl Record for IdentityResourceProperty {
    const KIND: EntityKind = EntityKind::IdentityResourceProperty;

    fn to_row(&self) -> Row {
        Row::new()
            .with("Key", self.key.as_str())
            .with("Value", self.value.as_str())
    }

    fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            id: 0,
            key: row.text("Key")?,
            value: row.text("Value")?,
        })
    }
}

// =============================================================================
// Grant rows
// =============================================================================

impl Record for PersistedGrant {
    const KIND: EntityKind = EntityKind::PersistedGrant;

    fn to_row(&self) -> Row {
        Row::new()
            .with("Key", self.key.as_str())
            .with("Type", self.grant_type.as_str())
            .with("SubjectId", self.subject_id.as_deref())
            .with("SessionId", self.session_id.as_deref())
            .with("ClientId", self.client_id.as_str())
            .with("Description", self.description.as_deref())
            .with("CreationTime", self.creation_time)
            .with("Expiration", self.expiration)
            .with("ConsumedTime", self.consumed_time)
            .with("Data", self.data.as_str())
    }

    fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            key: row.text("Key")?,
            grant_type: row.text("Type")?,
            subject_id: row.opt_text("SubjectId")?,
            session_id: row.opt_text("SessionId")?,
            client_id: row.text("ClientId")?,
            description: row.opt_text("Description")?,
            creation_time: row.timestamp("CreationTime")?,
            expiration: row.opt_timestamp("Expiration")?,
            consumed_time: row.opt_timestamp("ConsumedTime")?,
            data: row.text("Data")?,
        })
    }
}
