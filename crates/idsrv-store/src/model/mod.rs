//! Protocol-facing domain models.
//!
//! These carry no storage identifiers. Collections of single values are plain
//! `Vec<String>`; properties are a sorted map.

mod client;
mod resource;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub use client::{AccessTokenType, Claim, Client, TokenExpiration, TokenUsage};
pub use resource::{ApiResource, IdentityResource, Resources, Scope};

pub use crate::entities::PersistedGrant;
use crate::entities::SHARED_SECRET;
use crate::error::{StoreError, StoreResult};

/// Client or API secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub value: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expiration: Option<OffsetDateTime>,
    #[serde(rename = "type", default = "default_secret_type")]
    pub secret_type: String,
}

fn default_secret_type() -> String {
    SHARED_SECRET.to_string()
}

impl Secret {
    /// Shared secret with the given value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            description: None,
            value: value.into(),
            expiration: None,
            secret_type: default_secret_type(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_expiration(mut self, expiration: OffsetDateTime) -> Self {
        self.expiration = Some(expiration);
        self
    }
}

// =============================================================================
// Grant Filter
// =============================================================================

/// Selects grants by subject, optionally narrowed by client, session and type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedGrantFilter {
    pub subject_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    pub grant_type: Option<String>,
}

impl PersistedGrantFilter {
    /// Filter on subject only.
    #[must_use]
    pub fn for_subject(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    #[must_use]
    pub fn with_type(mut self, grant_type: impl Into<String>) -> Self {
        self.grant_type = Some(grant_type.into());
        self
    }

    /// Rejects a filter without a subject. An empty subject would otherwise
    /// match every anonymous grant.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidInput` if `subject_id` is blank.
    pub fn validate(&self) -> StoreResult<()> {
        if self.subject_id.trim().is_empty() {
            return Err(StoreError::invalid_input("grant filter requires a subject id"));
        }
        Ok(())
    }

    /// Returns `true` if `grant` satisfies every populated criterion.
    #[must_use]
    pub fn matches(&self, grant: &PersistedGrant) -> bool {
        grant.subject_id.as_deref() == Some(self.subject_id.as_str())
            && self
                .client_id
                .as_ref()
                .is_none_or(|c| &grant.client_id == c)
            && self
                .session_id
                .as_ref()
                .is_none_or(|s| grant.session_id.as_ref() == Some(s))
            && self
                .grant_type
                .as_ref()
                .is_none_or(|t| &grant.grant_type == t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(subject: &str, client: &str, session: Option<&str>, kind: &str) -> PersistedGrant {
        PersistedGrant {
            key: format!("{subject}-{client}-{kind}"),
            grant_type: kind.into(),
            subject_id: Some(subject.into()),
            session_id: session.map(Into::into),
            client_id: client.into(),
            data: "{}".into(),
            ..PersistedGrant::default()
        }
    }

    #[test]
    fn test_filter_subject_only() {
        let filter = PersistedGrantFilter::for_subject("alice");
        assert!(filter.matches(&grant("alice", "web", None, "refresh_token")));
        assert!(!filter.matches(&grant("bob", "web", None, "refresh_token")));
    }

    #[test]
    fn test_filter_all_criteria() {
        let filter = PersistedGrantFilter::for_subject("alice")
            .with_client("web")
            .with_session("s1")
            .with_type("refresh_token");

        assert!(filter.matches(&grant("alice", "web", Some("s1"), "refresh_token")));
        assert!(!filter.matches(&grant("alice", "web", Some("s2"), "refresh_token")));
        assert!(!filter.matches(&grant("alice", "web", None, "refresh_token")));
        assert!(!filter.matches(&grant("alice", "spa", Some("s1"), "refresh_token")));
        assert!(!filter.matches(&grant("alice", "web", Some("s1"), "user_consent")));
    }

    #[test]
    fn test_filter_requires_subject() {
        assert!(PersistedGrantFilter::default().validate().is_err());
        assert!(PersistedGrantFilter::for_subject("alice").validate().is_ok());
    }

    #[test]
    fn test_secret_type_defaults_when_missing() {
        let secret: Secret = serde_json::from_str(r#"{"value":"hash"}"#).unwrap();
        assert_eq!(secret.secret_type, "SharedSecret");
        assert!(secret.expiration.is_none());
    }
}
