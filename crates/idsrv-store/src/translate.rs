//! Entity ⇄ model translation.
//!
//! Field-by-field converters, recursive over owned collections. The
//! translator never assigns surrogate ids or audit timestamps: entities it
//! produces carry id 0 and whatever timestamps the model supplied (or the
//! entity defaults), so stores decide identity and audit data.

use std::collections::BTreeMap;

use crate::entities::{self, now_utc};
use crate::model::{self, AccessTokenType, Claim, Secret, TokenExpiration, TokenUsage};

/// Two-way conversion between a storage entity and its protocol model.
pub trait Translate<E> {
    type Model;

    fn to_model(&self, entity: &E) -> Self::Model;

    fn to_entity(&self, model: &Self::Model) -> E;
}

/// Stateless translator. Build one per store context and share it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Translator {
    _private: (),
}

impl Translator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

// =============================================================================
// Client
// =============================================================================

impl Translate<entities::Client> for Translator {
    type Model = model::Client;

    fn to_model(&self, e: &entities::Client) -> model::Client {
        model::Client {
            enabled: e.enabled,
            client_id: e.client_id.clone(),
            protocol_type: e.protocol_type.clone(),
            require_client_secret: e.require_client_secret,
            client_name: e.client_name.clone(),
            description: e.description.clone(),
            client_uri: e.client_uri.clone(),
            logo_uri: e.logo_uri.clone(),
            require_consent: e.require_consent,
            allow_remember_consent: e.allow_remember_consent,
            always_include_user_claims_in_id_token: e.always_include_user_claims_in_id_token,
            require_pkce: e.require_pkce,
            allow_plain_text_pkce: e.allow_plain_text_pkce,
            allow_access_tokens_via_browser: e.allow_access_tokens_via_browser,
            front_channel_logout_uri: e.front_channel_logout_uri.clone(),
            front_channel_logout_session_required: e.front_channel_logout_session_required,
            back_channel_logout_uri: e.back_channel_logout_uri.clone(),
            back_channel_logout_session_required: e.back_channel_logout_session_required,
            allow_offline_access: e.allow_offline_access,
            identity_token_lifetime: e.identity_token_lifetime,
            access_token_lifetime: e.access_token_lifetime,
            authorization_code_lifetime: e.authorization_code_lifetime,
            consent_lifetime: e.consent_lifetime,
            absolute_refresh_token_lifetime: e.absolute_refresh_token_lifetime,
            sliding_refresh_token_lifetime: e.sliding_refresh_token_lifetime,
            refresh_token_usage: TokenUsage::from_i32(e.refresh_token_usage),
            update_access_token_claims_on_refresh: e.update_access_token_claims_on_refresh,
            refresh_token_expiration: TokenExpiration::from_i32(e.refresh_token_expiration),
            access_token_type: AccessTokenType::from_i32(e.access_token_type),
            enable_local_login: e.enable_local_login,
            include_jwt_id: e.include_jwt_id,
            always_send_client_claims: e.always_send_client_claims,
            client_claims_prefix: e.client_claims_prefix.clone(),
            pair_wise_subject_salt: e.pair_wise_subject_salt.clone(),
            allowed_grant_types: e
                .allowed_grant_types
                .iter()
                .map(|g| g.grant_type.clone())
                .collect(),
            client_secrets: e
                .client_secrets
                .iter()
                .map(|s| Secret {
                    description: s.description.clone(),
                    value: s.value.clone(),
                    expiration: s.expiration,
                    secret_type: s.secret_type.clone(),
                })
                .collect(),
            redirect_uris: e
                .redirect_uris
                .iter()
                .map(|u| u.redirect_uri.clone())
                .collect(),
            post_logout_redirect_uris: e
                .post_logout_redirect_uris
                .iter()
                .map(|u| u.post_logout_redirect_uri.clone())
                .collect(),
            allowed_scopes: e.allowed_scopes.iter().map(|s| s.scope.clone()).collect(),
            identity_provider_restrictions: e
                .identity_provider_restrictions
                .iter()
                .map(|r| r.provider.clone())
                .collect(),
            claims: e
                .claims
                .iter()
                .map(|c| Claim::new(c.claim_type.clone(), c.value.clone()))
                .collect(),
            allowed_cors_origins: e
                .allowed_cors_origins
                .iter()
                .map(|o| o.origin.clone())
                .collect(),
            properties: properties(e.properties.iter().map(|p| (&p.key, &p.value))),
        }
    }

    fn to_entity(&self, m: &model::Client) -> entities::Client {
        entities::Client {
            id: 0,
            enabled: m.enabled,
            client_id: m.client_id.clone(),
            protocol_type: m.protocol_type.clone(),
            require_client_secret: m.require_client_secret,
            client_name: m.client_name.clone(),
            description: m.description.clone(),
            client_uri: m.client_uri.clone(),
            logo_uri: m.logo_uri.clone(),
            require_consent: m.require_consent,
            allow_remember_consent: m.allow_remember_consent,
            always_include_user_claims_in_id_token: m.always_include_user_claims_in_id_token,
            require_pkce: m.require_pkce,
            allow_plain_text_pkce: m.allow_plain_text_pkce,
            allow_access_tokens_via_browser: m.allow_access_tokens_via_browser,
            front_channel_logout_uri: m.front_channel_logout_uri.clone(),
            front_channel_logout_session_required: m.front_channel_logout_session_required,
            back_channel_logout_uri: m.back_channel_logout_uri.clone(),
            back_channel_logout_session_required: m.back_channel_logout_session_required,
            allow_offline_access: m.allow_offline_access,
            identity_token_lifetime: m.identity_token_lifetime,
            access_token_lifetime: m.access_token_lifetime,
            authorization_code_lifetime: m.authorization_code_lifetime,
            consent_lifetime: m.consent_lifetime,
            absolute_refresh_token_lifetime: m.absolute_refresh_token_lifetime,
            sliding_refresh_token_lifetime: m.sliding_refresh_token_lifetime,
            refresh_token_usage: m.refresh_token_usage.as_i32(),
            update_access_token_claims_on_refresh: m.update_access_token_claims_on_refresh,
            refresh_token_expiration: m.refresh_token_expiration.as_i32(),
            access_token_type: m.access_token_type.as_i32(),
            enable_local_login: m.enable_local_login,
            include_jwt_id: m.include_jwt_id,
            always_send_client_claims: m.always_send_client_claims,
            client_claims_prefix: m.client_claims_prefix.clone(),
            pair_wise_subject_salt: m.pair_wise_subject_salt.clone(),
            allowed_grant_types: m
                .allowed_grant_types
                .iter()
                .map(|g| entities::ClientGrantType {
                    id: 0,
                    grant_type: g.clone(),
                })
                .collect(),
            client_secrets: m
                .client_secrets
                .iter()
                .map(|s| entities::ClientSecret {
                    id: 0,
                    description: s.description.clone(),
                    value: s.value.clone(),
                    expiration: s.expiration,
                    secret_type: s.secret_type.clone(),
                })
                .collect(),
            redirect_uris: m
                .redirect_uris
                .iter()
                .map(|u| entities::ClientRedirectUri {
                    id: 0,
                    redirect_uri: u.clone(),
                })
                .collect(),
            post_logout_redirect_uris: m
                .post_logout_redirect_uris
                .iter()
                .map(|u| entities::ClientPostLogoutRedirectUri {
                    id: 0,
                    post_logout_redirect_uri: u.clone(),
                })
                .collect(),
            allowed_scopes: m
                .allowed_scopes
                .iter()
                .map(|s| entities::ClientScope {
                    id: 0,
                    scope: s.clone(),
                })
                .collect(),
            identity_provider_restrictions: m
                .identity_provider_restrictions
                .iter()
                .map(|p| entities::ClientIdPRestriction {
                    id: 0,
                    provider: p.clone(),
                })
                .collect(),
            claims: m
                .claims
                .iter()
                .map(|c| entities::ClientClaim {
                    id: 0,
                    claim_type: c.claim_type.clone(),
                    value: c.value.clone(),
                })
                .collect(),
            allowed_cors_origins: m
                .allowed_cors_origins
                .iter()
                .map(|o| entities::ClientCorsOrigin {
                    id: 0,
                    origin: o.clone(),
                })
                .collect(),
            properties: m
                .properties
                .iter()
                .map(|(key, value)| entities::ClientProperty {
                    id: 0,
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
        }
    }
}

// =============================================================================
// API resource
// =============================================================================

impl Translate<entities::ApiResource> for Translator {
    type Model = model::ApiResource;

    fn to_model(&self, e: &entities::ApiResource) -> model::ApiResource {
        model::ApiResource {
            enabled: e.enabled,
            name: e.name.clone(),
            display_name: e.display_name.clone(),
            description: e.description.clone(),
            api_secrets: e
                .secrets
                .iter()
                .map(|s| Secret {
                    description: s.description.clone(),
                    value: s.value.clone(),
                    expiration: s.expiration,
                    secret_type: s.secret_type.clone(),
                })
                .collect(),
            scopes: e
                .scopes
                .iter()
                .map(|s| model::Scope {
                    name: s.name.clone(),
                    display_name: s.display_name.clone(),
                    description: s.description.clone(),
                    required: s.required,
                    emphasize: s.emphasize,
                    show_in_discovery_document: s.show_in_discovery_document,
                    user_claims: s.user_claims.iter().map(|c| c.claim_type.clone()).collect(),
                })
                .collect(),
            user_claims: e.user_claims.iter().map(|c| c.claim_type.clone()).collect(),
            properties: properties(e.properties.iter().map(|p| (&p.key, &p.value))),
            non_editable: e.non_editable,
            created: Some(e.created),
            updated: e.updated,
        }
    }

    fn to_entity(&self, m: &model::ApiResource) -> entities::ApiResource {
        entities::ApiResource {
            id: 0,
            enabled: m.enabled,
            name: m.name.clone(),
            display_name: m.display_name.clone(),
            description: m.description.clone(),
            created: m.created.unwrap_or_else(now_utc),
            updated: m.updated,
            last_accessed: None,
            non_editable: m.non_editable,
            secrets: m
                .api_secrets
                .iter()
                .map(|s| entities::ApiSecret {
                    id: 0,
                    description: s.description.clone(),
                    value: s.value.clone(),
                    expiration: s.expiration,
                    secret_type: s.secret_type.clone(),
                })
                .collect(),
            scopes: m
                .scopes
                .iter()
                .map(|s| entities::ApiScope {
                    id: 0,
                    name: s.name.clone(),
                    display_name: s.display_name.clone(),
                    description: s.description.clone(),
                    required: s.required,
                    emphasize: s.emphasize,
                    show_in_discovery_document: s.show_in_discovery_document,
                    user_claims: s
                        .user_claims
                        .iter()
                        .map(|c| entities::ApiScopeClaim {
                            id: 0,
                            claim_type: c.clone(),
                        })
                        .collect(),
                })
                .collect(),
            user_claims: m
                .user_claims
                .iter()
                .map(|c| entities::ApiResourceClaim {
                    id: 0,
                    claim_type: c.clone(),
                })
                .collect(),
            properties: m
                .properties
                .iter()
                .map(|(key, value)| entities::ApiResourceProperty {
                    id: 0,
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
        }
    }
}

// =============================================================================
// Identity resource
// =============================================================================

impl Translate<entities::IdentityResource> for Translator {
    type Model = model::IdentityResource;

    fn to_model(&self, e: &entities::IdentityResource) -> model::IdentityResource {
        model::IdentityResource {
            enabled: e.enabled,
            name: e.name.clone(),
            display_name: e.display_name.clone(),
            description: e.description.clone(),
            required: e.required,
            emphasize: e.emphasize,
            show_in_discovery_document: e.show_in_discovery_document,
            user_claims: e.user_claims.iter().map(|c| c.claim_type.clone()).collect(),
            properties: properties(e.properties.iter().map(|p| (&p.key, &p.value))),
            non_editable: e.non_editable,
            created: Some(e.created),
            updated: e.updated,
        }
    }

    fn to_entity(&self, m: &model::IdentityResource) -> entities::IdentityResource {
        entities::IdentityResource {
            id: 0,
            enabled: m.enabled,
            name: m.name.clone(),
            display_name: m.display_name.clone(),
            description: m.description.clone(),
            required: m.required,
            emphasize: m.emphasize,
            show_in_discovery_document: m.show_in_discovery_document,
            created: m.created.unwrap_or_else(now_utc),
            updated: m.updated,
            last_accessed: None,
            non_editable: m.non_editable,
            user_claims: m
                .user_claims
                .iter()
                .map(|c| entities::IdentityClaim {
                    id: 0,
                    claim_type: c.clone(),
                })
                .collect(),
            properties: m
                .properties
                .iter()
                .map(|(key, value)| entities::IdentityResourceProperty {
                    id: 0,
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
        }
    }
}

/// Property rows to a map. A later duplicate key replaces an earlier one.
fn properties<'a>(rows: impl Iterator<Item = (&'a String, &'a String)>) -> BTreeMap<String, String> {
    rows.map(|(k, v)| (k.clone(), v.clone())).collect()
}
