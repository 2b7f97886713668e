//! Fallback refresh through the secondary identity provider
//!
//! The gateway never builds requests to the secondary provider itself.
//! [`SecondaryIdentityProvider`] is the seam for the provider's native
//! session-refresh call; [`SecondaryRefresh`] only reads the stored session,
//! hands it to the provider, and persists what comes back.
//!
//! [`OAuthSessionProvider`] is a ready-made provider for identity services
//! that expose a standard OAuth 2 token endpoint.

use std::collections::HashMap;
use std::sync::Arc;

use url::Url;

use crate::credentials::{ActiveCredential, CredentialStore, SecondarySession, StoreKey};
use crate::error::{GatewayError, Result};
use crate::refresh::{RefreshStrategy, StrategyOutcome};

/// A secondary identity provider capable of renewing its own session.
#[async_trait::async_trait]
pub trait SecondaryIdentityProvider: Send + Sync + std::fmt::Debug {
    /// Short provider name used in logs.
    fn name(&self) -> &str;

    /// Renews `session`, returning the replacement session.
    ///
    /// # Errors
    ///
    /// Any error means the session could not be renewed.
    async fn refresh_session(&self, session: &SecondarySession) -> Result<SecondarySession>;
}

// ---------------------------------------------------------------------------
// SecondaryRefresh
// ---------------------------------------------------------------------------

/// Refresh strategy delegating to a [`SecondaryIdentityProvider`].
#[derive(Debug, Clone)]
pub struct SecondaryRefresh {
    provider: Arc<dyn SecondaryIdentityProvider>,
}

impl SecondaryRefresh {
    /// Wraps `provider` as a refresh strategy.
    pub fn new(provider: Arc<dyn SecondaryIdentityProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait::async_trait]
impl RefreshStrategy for SecondaryRefresh {
    fn name(&self) -> &str {
        "secondary"
    }

    async fn refresh(&self, store: &CredentialStore) -> StrategyOutcome {
        let session = match store.secondary_session() {
            Ok(Some(session)) => session,
            Ok(None) => return StrategyOutcome::Unavailable("no secondary session stored".into()),
            Err(e) => {
                return StrategyOutcome::Failed(format!("failed to read secondary session: {e}"))
            }
        };

        tracing::debug!(
            provider = self.provider.name(),
            "Refreshing secondary identity session"
        );

        let renewed = match self.provider.refresh_session(&session).await {
            Ok(renewed) => renewed,
            Err(e) => return StrategyOutcome::Failed(e.to_string()),
        };

        if let Err(e) = store.set_secondary_session(&renewed) {
            return StrategyOutcome::Failed(format!("failed to persist secondary session: {e}"));
        }

        // Reaching this strategy means the primary token could not be
        // renewed. It must not keep outranking the renewed session.
        if let Err(e) = store.clear(StoreKey::AccessToken) {
            return StrategyOutcome::Failed(format!("failed to drop stale access token: {e}"));
        }

        StrategyOutcome::Refreshed(ActiveCredential::Secondary(renewed.access_token))
    }
}

// ---------------------------------------------------------------------------
// OAuthSessionProvider
// ---------------------------------------------------------------------------

/// Raw JSON response from an OAuth token endpoint.
#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl TokenResponse {
    /// Converts the token response into a session, keeping the previous
    /// refresh token when the provider does not rotate it.
    fn into_session(self, previous: &SecondarySession) -> SecondarySession {
        let expires_at = self.expires_in.map(|secs| {
            chrono::Utc::now() + chrono::Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))
        });

        SecondarySession {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or_else(|| previous.refresh_token.clone()),
            expires_at,
            token_type: self
                .token_type
                .unwrap_or_else(|| previous.token_type.clone()),
        }
    }
}

/// Secondary provider backed by an OAuth 2 token endpoint.
///
/// POSTs `grant_type=refresh_token` (form-encoded) with the session's
/// refresh token and optional `client_id`.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use url::Url;
/// use hirelink::refresh::{OAuthSessionProvider, SecondaryIdentityProvider};
///
/// let provider = OAuthSessionProvider::new(
///     Arc::new(reqwest::Client::new()),
///     Url::parse("https://id.example.com/oauth/token").unwrap(),
///     Some("hirelink-web".to_string()),
/// );
/// assert_eq!(provider.name(), "oauth");
/// ```
#[derive(Debug, Clone)]
pub struct OAuthSessionProvider {
    http: Arc<reqwest::Client>,
    token_endpoint: Url,
    client_id: Option<String>,
}

impl OAuthSessionProvider {
    /// Creates a provider for `token_endpoint`.
    pub fn new(http: Arc<reqwest::Client>, token_endpoint: Url, client_id: Option<String>) -> Self {
        Self {
            http,
            token_endpoint,
            client_id,
        }
    }
}

#[async_trait::async_trait]
impl SecondaryIdentityProvider for OAuthSessionProvider {
    fn name(&self) -> &str {
        "oauth"
    }

    async fn refresh_session(&self, session: &SecondarySession) -> Result<SecondarySession> {
        let refresh_token = session.refresh_token.as_deref().ok_or_else(|| {
            GatewayError::IdentityProvider("session has no refresh token".to_string())
        })?;

        let mut params: HashMap<&str, &str> = HashMap::new();
        params.insert("grant_type", "refresh_token");
        params.insert("refresh_token", refresh_token);
        if let Some(ref client_id) = self.client_id {
            params.insert("client_id", client_id);
        }

        let resp = self
            .http
            .post(self.token_endpoint.clone())
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                GatewayError::IdentityProvider(format!("session refresh request failed: {e}"))
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::IdentityProvider(format!(
                "token endpoint returned {status}: {body}"
            ))
            .into());
        }

        let raw: TokenResponse = resp.json().await.map_err(|e| {
            GatewayError::IdentityProvider(format!("failed to parse session refresh response: {e}"))
        })?;

        Ok(raw.into_session(session))
    }
}
