use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::now_utc;

/// Server-side record backing an issued token, code or consent.
///
/// Stored and returned as-is; there is no separate domain model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedGrant {
    pub key: String,
    #[serde(rename = "type")]
    pub grant_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub creation_time: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expiration: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub consumed_time: Option<OffsetDateTime>,
    pub data: String,
}

impl PersistedGrant {
    /// Returns `true` if the grant has an expiration at or before `at`.
    #[must_use]
    pub fn is_expired_at(&self, at: OffsetDateTime) -> bool {
        self.expiration.is_some_and(|exp| exp <= at)
    }
}

impl Default for PersistedGrant {
    fn default() -> Self {
        Self {
            key: String::new(),
            grant_type: String::new(),
            subject_id: None,
            session_id: None,
            client_id: String::new(),
            description: None,
            creation_time: now_utc(),
            expiration: None,
            consumed_time: None,
            data: String::new(),
        }
    }
}
