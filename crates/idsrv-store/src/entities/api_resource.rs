use time::OffsetDateTime;

use super::{SHARED_SECRET, now_utc};

/// Protected API and the scopes it exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResource {
    pub id: i64,
    pub enabled: bool,
    pub name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub created: OffsetDateTime,
    pub updated: Option<OffsetDateTime>,
    pub last_accessed: Option<OffsetDateTime>,
    pub non_editable: bool,

    pub secrets: Vec<ApiSecret>,
    pub scopes: Vec<ApiScope>,
    pub user_claims: Vec<ApiResourceClaim>,
    pub properties: Vec<ApiResourceProperty>,
}

impl Default for ApiResource {
    fn default() -> Self {
        Self {
            id: 0,
            enabled: true,
            name: String::new(),
            display_name: None,
            description: None,
            created: now_utc(),
            updated: None,
            last_accessed: None,
            non_editable: false,
            secrets: Vec::new(),
            scopes: Vec::new(),
            user_claims: Vec::new(),
            properties: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSecret {
    pub id: i64,
    pub description: Option<String>,
    pub value: String,
    pub expiration: Option<OffsetDateTime>,
    pub secret_type: String,
}

impl Default for ApiSecret {
    fn default() -> Self {
        Self {
            id: 0,
            description: None,
            value: String::new(),
            expiration: None,
            secret_type: SHARED_SECRET.to_string(),
        }
    }
}

/// Scope exposed by an API. Owns its own claim rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiScope {
    pub id: i64,
    pub name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub required: bool,
    pub emphasize: bool,
    pub show_in_discovery_document: bool,
    pub user_claims: Vec<ApiScopeClaim>,
}

impl Default for ApiScope {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            display_name: None,
            description: None,
            required: false,
            emphasize: false,
            show_in_discovery_document: true,
            user_claims: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiScopeClaim {
    pub id: i64,
    pub claim_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiResourceClaim {
    pub id: i64,
    pub claim_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiResourceProperty {
    pub id: i64,
    pub key: String,
    pub value: String,
}
