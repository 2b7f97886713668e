//! Refresh against the application's own authentication service.

use std::sync::Arc;

use serde::Deserialize;
use url::Url;

use crate::credentials::{ActiveCredential, CredentialStore};
use crate::error::Result;
use crate::gateway::request::resolve_url;
use crate::refresh::{RefreshStrategy, StrategyOutcome};

/// Token body returned by the refresh endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenBody {
    #[serde(alias = "access_token")]
    access_token: String,
    #[serde(default, alias = "refresh_token")]
    refresh_token: Option<String>,
}

/// The API returns either the token body directly or wrapped in `data`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RefreshResponse {
    Wrapped { data: TokenBody },
    Flat(TokenBody),
}

impl RefreshResponse {
    fn into_body(self) -> TokenBody {
        match self {
            RefreshResponse::Wrapped { data } => data,
            RefreshResponse::Flat(body) => body,
        }
    }
}

/// Exchanges the stored primary refresh token for a new access token.
///
/// Sends `POST {base_url}{refresh_path}` with `{"refreshToken": "..."}`.
/// The request bypasses the gateway so a failing refresh can never recurse
/// into another refresh.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use url::Url;
/// use hirelink::refresh::{PrimaryRefresh, RefreshStrategy};
///
/// let strategy = PrimaryRefresh::new(
///     Arc::new(reqwest::Client::new()),
///     Url::parse("https://api.example.com").unwrap(),
///     "/auth/refresh-token",
/// );
/// assert_eq!(strategy.name(), "primary");
/// ```
#[derive(Debug, Clone)]
pub struct PrimaryRefresh {
    http: Arc<reqwest::Client>,
    base_url: Url,
    refresh_path: String,
}

impl PrimaryRefresh {
    /// Creates the strategy for the refresh endpoint at `base_url` + `refresh_path`.
    pub fn new(http: Arc<reqwest::Client>, base_url: Url, refresh_path: impl Into<String>) -> Self {
        Self {
            http,
            base_url,
            refresh_path: refresh_path.into(),
        }
    }

    fn endpoint(&self) -> Result<Url> {
        resolve_url(&self.base_url, &self.refresh_path)
    }
}

#[async_trait::async_trait]
impl RefreshStrategy for PrimaryRefresh {
    fn name(&self) -> &str {
        "primary"
    }

    async fn refresh(&self, store: &CredentialStore) -> StrategyOutcome {
        let refresh_token = match store.refresh_token() {
            Ok(Some(token)) => token,
            Ok(None) => return StrategyOutcome::Unavailable("no refresh token stored".into()),
            Err(e) => return StrategyOutcome::Failed(format!("failed to read refresh token: {e}")),
        };

        let endpoint = match self.endpoint() {
            Ok(url) => url,
            Err(e) => return StrategyOutcome::Failed(format!("invalid refresh endpoint: {e}")),
        };

        tracing::debug!("Requesting primary token refresh from {}", endpoint);

        let resp = match self
            .http
            .post(endpoint)
            .json(&serde_json::json!({ "refreshToken": refresh_token }))
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => return StrategyOutcome::Failed(format!("refresh request failed: {e}")),
        };

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return StrategyOutcome::Failed(format!("refresh endpoint returned {status}: {body}"));
        }

        let body = match resp.json::<RefreshResponse>().await {
            Ok(parsed) => parsed.into_body(),
            Err(e) => {
                return StrategyOutcome::Failed(format!("failed to parse refresh response: {e}"))
            }
        };

        if body.access_token.is_empty() {
            return StrategyOutcome::Failed("refresh response carried an empty access token".into());
        }

        if let Err(e) = store.set_access_token(&body.access_token) {
            return StrategyOutcome::Failed(format!("failed to persist access token: {e}"));
        }
        if let Some(rotated) = body.refresh_token.filter(|t| !t.is_empty()) {
            if let Err(e) = store.set_refresh_token(&rotated) {
                return StrategyOutcome::Failed(format!("failed to persist refresh token: {e}"));
            }
        }

        StrategyOutcome::Refreshed(ActiveCredential::Primary(body.access_token))
    }
}
