use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Secret;

/// How a refresh token may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TokenUsage {
    /// The handle stays the same on refresh.
    ReUse,
    /// The handle is replaced on every refresh.
    #[default]
    OneTimeOnly,
}

impl TokenUsage {
    /// Stored integer.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            Self::ReUse => 0,
            Self::OneTimeOnly => 1,
        }
    }

    /// Parses the stored integer. Unknown values map to the default.
    #[must_use]
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::ReUse,
            _ => Self::OneTimeOnly,
        }
    }
}

/// Refresh token lifetime policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TokenExpiration {
    /// Lifetime is extended on each use, up to the absolute lifetime.
    Sliding,
    /// Fixed lifetime from issuance.
    #[default]
    Absolute,
}

impl TokenExpiration {
    /// Stored integer.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Sliding => 0,
            Self::Absolute => 1,
        }
    }

    /// Parses the stored integer. Unknown values map to the default.
    #[must_use]
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::Sliding,
            _ => Self::Absolute,
        }
    }
}

/// Access token format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccessTokenType {
    /// Self-contained JWT.
    #[default]
    Jwt,
    /// Opaque handle resolved through introspection.
    Reference,
}

impl AccessTokenType {
    /// Stored integer.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Jwt => 0,
            Self::Reference => 1,
        }
    }

    /// Parses the stored integer. Unknown values map to the default.
    #[must_use]
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => Self::Reference,
            _ => Self::Jwt,
        }
    }
}

/// Claim issued to a client in its tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    #[serde(rename = "type")]
    pub claim_type: String,
    pub value: String,
}

impl Claim {
    #[must_use]
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }
}

/// Client as seen by the protocol engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Client {
    pub enabled: bool,
    pub client_id: String,
    pub protocol_type: String,
    pub require_client_secret: bool,
    pub client_name: Option<String>,
    pub description: Option<String>,
    pub client_uri: Option<String>,
    pub logo_uri: Option<String>,
    pub require_consent: bool,
    pub allow_remember_consent: bool,
    pub always_include_user_claims_in_id_token: bool,
    pub require_pkce: bool,
    pub allow_plain_text_pkce: bool,
    pub allow_access_tokens_via_browser: bool,
    pub front_channel_logout_uri: Option<String>,
    pub front_channel_logout_session_required: bool,
    pub back_channel_logout_uri: Option<String>,
    pub back_channel_logout_session_required: bool,
    pub allow_offline_access: bool,
    pub identity_token_lifetime: i32,
    pub access_token_lifetime: i32,
    pub authorization_code_lifetime: i32,
    pub consent_lifetime: Option<i32>,
    pub absolute_refresh_token_lifetime: i32,
    pub sliding_refresh_token_lifetime: i32,
    pub refresh_token_usage: TokenUsage,
    pub update_access_token_claims_on_refresh: bool,
    pub refresh_token_expiration: TokenExpiration,
    pub access_token_type: AccessTokenType,
    pub enable_local_login: bool,
    pub include_jwt_id: bool,
    pub always_send_client_claims: bool,
    pub client_claims_prefix: Option<String>,
    pub pair_wise_subject_salt: Option<String>,

    pub allowed_grant_types: Vec<String>,
    pub client_secrets: Vec<Secret>,
    pub redirect_uris: Vec<String>,
    pub post_logout_redirect_uris: Vec<String>,
    pub allowed_scopes: Vec<String>,
    pub identity_provider_restrictions: Vec<String>,
    pub claims: Vec<Claim>,
    pub allowed_cors_origins: Vec<String>,
    pub properties: BTreeMap<String, String>,
}

impl Default for Client {
    fn default() -> Self {
        Self {
            enabled: true,
            client_id: String::new(),
            protocol_type: "oidc".to_string(),
            require_client_secret: true,
            client_name: None,
            description: None,
            client_uri: None,
            logo_uri: None,
            require_consent: false,
            allow_remember_consent: true,
            always_include_user_claims_in_id_token: false,
            require_pkce: true,
            allow_plain_text_pkce: false,
            allow_access_tokens_via_browser: false,
            front_channel_logout_uri: None,
            front_channel_logout_session_required: true,
            back_channel_logout_uri: None,
            back_channel_logout_session_required: true,
            allow_offline_access: false,
            identity_token_lifetime: 300,
            access_token_lifetime: 3600,
            authorization_code_lifetime: 300,
            consent_lifetime: None,
            absolute_refresh_token_lifetime: 2_592_000,
            sliding_refresh_token_lifetime: 1_296_000,
            refresh_token_usage: TokenUsage::OneTimeOnly,
            update_access_token_claims_on_refresh: false,
            refresh_token_expiration: TokenExpiration::Absolute,
            access_token_type: AccessTokenType::Jwt,
            enable_local_login: true,
            include_jwt_id: true,
            always_send_client_claims: false,
            client_claims_prefix: Some("client_".to_string()),
            pair_wise_subject_salt: None,
            allowed_grant_types: Vec::new(),
            client_secrets: Vec::new(),
            redirect_uris: Vec::new(),
            post_logout_redirect_uris: Vec::new(),
            allowed_scopes: Vec::new(),
            identity_provider_restrictions: Vec::new(),
            claims: Vec::new(),
            allowed_cors_origins: Vec::new(),
            properties: BTreeMap::new(),
        }
    }
}

impl Client {
    /// Creates a client with defaults and the given identifier.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_integer_codes() {
        assert_eq!(TokenUsage::ReUse.as_i32(), 0);
        assert_eq!(TokenUsage::from_i32(1), TokenUsage::OneTimeOnly);
        assert_eq!(TokenExpiration::Sliding.as_i32(), 0);
        assert_eq!(TokenExpiration::from_i32(1), TokenExpiration::Absolute);
        assert_eq!(AccessTokenType::Reference.as_i32(), 1);
        assert_eq!(AccessTokenType::from_i32(0), AccessTokenType::Jwt);
    }

    #[test]
    fn test_deserialize_partial_client_uses_defaults() {
        let client: Client = serde_json::from_str(
            r#"{"clientId":"spa","allowedGrantTypes":["authorization_code"],"accessTokenType":"reference"}"#,
        )
        .unwrap();
        assert_eq!(client.client_id, "spa");
        assert!(client.require_pkce);
        assert_eq!(client.access_token_type, AccessTokenType::Reference);
        assert_eq!(client.allowed_grant_types, vec!["authorization_code"]);
    }
}
