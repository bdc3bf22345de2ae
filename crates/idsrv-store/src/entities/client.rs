use time::OffsetDateTime;

use super::SHARED_SECRET;

/// Registered OAuth/OIDC client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    pub id: i64,
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
    pub refresh_token_usage: i32,
    pub update_access_token_claims_on_refresh: bool,
    pub refresh_token_expiration: i32,
    pub access_token_type: i32,
    pub enable_local_login: bool,
    pub include_jwt_id: bool,
    pub always_send_client_claims: bool,
    pub client_claims_prefix: Option<String>,
    pub pair_wise_subject_salt: Option<String>,

    pub allowed_grant_types: Vec<ClientGrantType>,
    pub client_secrets: Vec<ClientSecret>,
    pub redirect_uris: Vec<ClientRedirectUri>,
    pub post_logout_redirect_uris: Vec<ClientPostLogoutRedirectUri>,
    pub allowed_scopes: Vec<ClientScope>,
    pub identity_provider_restrictions: Vec<ClientIdPRestriction>,
    pub claims: Vec<ClientClaim>,
    pub allowed_cors_origins: Vec<ClientCorsOrigin>,
    pub properties: Vec<ClientProperty>,
}

impl Default for Client {
    fn default() -> Self {
        Self {
            id: 0,
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
            refresh_token_usage: 1,
            update_access_token_claims_on_refresh: false,
            refresh_token_expiration: 1,
            access_token_type: 0,
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
            properties: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientGrantType {
    pub id: i64,
    pub grant_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSecret {
    pub id: i64,
    pub description: Option<String>,
    pub value: String,
    pub expiration: Option<OffsetDateTime>,
    pub secret_type: String,
}

impl Default for ClientSecret {
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

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientRedirectUri {
    pub id: i64,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientPostLogoutRedirectUri {
    pub id: i64,
    pub post_logout_redirect_uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientScope {
    pub id: i64,
    pub scope: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientIdPRestriction {
    pub id: i64,
    pub provider: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientClaim {
    pub id: i64,
    pub claim_type: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientCorsOrigin {
    pub id: i64,
    pub origin: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientProperty {
    pub id: i64,
    pub key: String,
    pub value: String,
}
