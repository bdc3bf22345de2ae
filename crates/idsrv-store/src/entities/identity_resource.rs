use time::OffsetDateTime;

use super::now_utc;

/// Named group of user claims requested through an identity scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityResource {
    pub id: i64,
    pub enabled: bool,
    pub name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub required: bool,
    pub emphasize: bool,
    pub show_in_discovery_document: bool,
    pub created: OffsetDateTime,
    pub updated: Option<OffsetDateTime>,
    pub last_accessed: Option<OffsetDateTime>,
    pub non_editable: bool,

    pub user_claims: Vec<IdentityClaim>,
    pub properties: Vec<IdentityResourceProperty>,
}

impl Default for IdentityResource {
    fn default() -> Self {
        Self {
            id: 0,
            enabled: true,
            name: String::new(),
            display_name: None,
            description: None,
            required: false,
            emphasize: false,
            show_in_discovery_document: true,
            created: now_utc(),
            updated: None,
            last_accessed: None,
            non_editable: false,
            user_claims: Vec::new(),
            properties: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityClaim {
    pub id: i64,
    pub claim_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityResourceProperty {
    pub id: i64,
    pub key: String,
    pub value: String,
}
