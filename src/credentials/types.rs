//! Credential and profile value types persisted by the credential store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Access/refresh token pair issued by the primary authentication service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPair {
    /// Bearer token attached to outbound API calls.
    pub access_token: String,
    /// Token exchanged at the refresh endpoint for a new access token.
    pub refresh_token: String,
}

/// Session issued by the secondary identity provider.
///
/// The gateway treats it as opaque apart from `access_token`, which it sends
/// under the secondary header, and `refresh_token`, which the provider
/// consumes when renewing.
///
/// # Examples
///
/// ```
/// use hirelink::credentials::SecondarySession;
///
/// let session = SecondarySession {
///     access_token: "sb-access".to_string(),
///     refresh_token: Some("sb-refresh".to_string()),
///     expires_at: None,
///     token_type: "bearer".to_string(),
/// };
///
/// assert!(!session.is_expired());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondarySession {
    /// Access token sent under the secondary header.
    pub access_token: String,

    /// Refresh material understood only by the secondary provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// UTC expiry of `access_token`, when the provider reports one.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_seconds_option"
    )]
    pub expires_at: Option<DateTime<Utc>>,

    /// Token type reported by the provider, usually `"bearer"`.
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl SecondarySession {
    /// Returns `true` when the access token is past its expiry.
    ///
    /// Sessions without an expiry never expire locally; the API remains the
    /// final judge through `401` responses.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            None => false,
            Some(expires_at) => Utc::now() >= expires_at,
        }
    }
}

/// Signed-in user as returned by the login endpoint.
///
/// Only the fields the CLI displays are typed; the full document is kept in
/// `extra` so nothing the API sends is lost on a store round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// User identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    /// Login email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Organization the signed-in user belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationProfile {
    /// Organization identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    /// Organization name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The credential an outbound call is sent with.
///
/// The two kinds are never merged into one header; the API distinguishes
/// their semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveCredential {
    /// Primary access token, sent as `Authorization: Bearer <token>`.
    Primary(String),
    /// Secondary provider access token, sent under the configured header.
    Secondary(String),
}

impl ActiveCredential {
    /// Returns the raw token value.
    pub fn token(&self) -> &str {
        match self {
            ActiveCredential::Primary(token) | ActiveCredential::Secondary(token) => token,
        }
    }

    /// Returns a short label for log output.
    pub fn kind(&self) -> &'static str {
        match self {
            ActiveCredential::Primary(_) => "primary",
            ActiveCredential::Secondary(_) => "secondary",
        }
    }
}
