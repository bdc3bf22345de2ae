use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::Secret;

/// Scope exposed by an API resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Scope {
    pub name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub required: bool,
    pub emphasize: bool,
    pub show_in_discovery_document: bool,
    pub user_claims: Vec<String>,
}

impl Default for Scope {
    fn default() -> Self {
        Self {
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

impl Scope {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiResource {
    pub enabled: bool,
    pub name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub api_secrets: Vec<Secret>,
    pub scopes: Vec<Scope>,
    pub user_claims: Vec<String>,
    pub properties: BTreeMap<String, String>,
    pub non_editable: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub created: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated: Option<OffsetDateTime>,
}

impl Default for ApiResource {
    fn default() -> Self {
        Self {
            enabled: true,
            name: String::new(),
            display_name: None,
            description: None,
            api_secrets: Vec::new(),
            scopes: Vec::new(),
            user_claims: Vec::new(),
            properties: BTreeMap::new(),
            non_editable: false,
            created: None,
            updated: None,
        }
    }
}

impl ApiResource {
    /// Creates a resource with one scope of the same name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            scopes: vec![Scope::new(name.clone())],
            name,
            ..Self::default()
        }
    }

    /// Scope names exposed by this resource.
    pub fn scope_names(&self) -> impl Iterator<Item = &str> {
        self.scopes.iter().map(|s| s.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentityResource {
    pub enabled: bool,
    pub name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub required: bool,
    pub emphasize: bool,
    pub show_in_discovery_document: bool,
    pub user_claims: Vec<String>,
    pub properties: BTreeMap<String, String>,
    pub non_editable: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub created: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated: Option<OffsetDateTime>,
}

impl Default for IdentityResource {
    fn default() -> Self {
        Self {
            enabled: true,
            name: String::new(),
            display_name: None,
            description: None,
            required: false,
            emphasize: false,
            show_in_discovery_document: true,
            user_claims: Vec::new(),
            properties: BTreeMap::new(),
            non_editable: false,
            created: None,
            updated: None,
        }
    }
}

impl IdentityResource {
    #[must_use]
    pub fn new(name: impl Into<String>, user_claims: &[&str]) -> Self {
        Self {
            name: name.into(),
            user_claims: user_claims.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }
}

/// Result of a scope lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resources {
    pub identity_resources: Vec<IdentityResource>,
    pub api_resources: Vec<ApiResource>,
}

impl Resources {
    /// Returns `true` if neither list has entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.identity_resources.is_empty() && self.api_resources.is_empty()
    }

    /// Every scope name covered by these resources.
    #[must_use]
    pub fn scope_names(&self) -> BTreeSet<String> {
        self.identity_resources
            .iter()
            .map(|r| r.name.clone())
            .chain(
                self.api_resources
                    .iter()
                    .flat_map(|r| r.scope_names().map(ToString::to_string)),
            )
            .collect()
    }
}
