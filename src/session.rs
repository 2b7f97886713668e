//! Sign-in, sign-out and session inspection
//!
//! [`SessionService`] writes the credential store outside of refresh: login
//! persists the issued tokens and profiles, logout clears them.  Its calls
//! bypass the gateway's refresh path; a failed login is never "recovered"
//! by refreshing a previous session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::header::HeaderName;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::credentials::{CredentialPair, CredentialStore, OrganizationProfile, UserProfile};
use crate::error::{GatewayError, Result};
use crate::gateway::request::{credential_header, resolve_url};
use crate::gateway::Gateway;

/// Successful login response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// Primary access token
    #[serde(alias = "access_token")]
    pub access_token: String,
    /// Primary refresh token
    #[serde(alias = "refresh_token")]
    pub refresh_token: String,
    /// Signed-in user
    #[serde(default)]
    pub user: Option<UserProfile>,
    /// The user's organization
    #[serde(default)]
    pub organization: Option<OrganizationProfile>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LoginEnvelope {
    Wrapped { data: LoginResponse },
    Flat(LoginResponse),
}

/// Snapshot of what the credential store holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    /// A primary access token is stored
    pub has_access_token: bool,
    /// A primary refresh token is stored
    pub has_refresh_token: bool,
    /// A secondary provider session is stored
    pub has_secondary_session: bool,
    /// Expiry of the secondary session, when known
    pub secondary_expires_at: Option<DateTime<Utc>>,
    /// Email of the signed-in user
    pub user_email: Option<String>,
    /// Name of the signed-in user's organization
    pub organization_name: Option<String>,
}

impl SessionStatus {
    /// Returns `true` when any credential is stored.
    pub fn is_signed_in(&self) -> bool {
        self.has_access_token || self.has_secondary_session
    }
}

/// Login, logout and status over a gateway's credential store.
#[derive(Debug, Clone)]
pub struct SessionService {
    http: Arc<reqwest::Client>,
    base_url: Url,
    secondary_header: HeaderName,
    store: CredentialStore,
    login_path: String,
    logout_path: String,
}

impl SessionService {
    /// Creates a session service sharing `gateway`'s client and store.
    pub fn new(
        gateway: &Gateway,
        login_path: impl Into<String>,
        logout_path: impl Into<String>,
    ) -> Self {
        Self {
            http: Arc::clone(gateway.http_client()),
            base_url: gateway.base_url().clone(),
            secondary_header: gateway.secondary_header().clone(),
            store: gateway.store().clone(),
            login_path: login_path.into(),
            logout_path: logout_path.into(),
        }
    }

    /// Signs in and persists the issued session.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Unauthorized`] for rejected credentials,
    /// [`GatewayError::Api`] for other error statuses,
    /// [`GatewayError::Transport`] for network failures.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let url = resolve_url(&self.base_url, &self.login_path)?;
        tracing::debug!("Signing in at {}", url);

        let resp = self
            .http
            .post(url)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(GatewayError::Transport)?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Unauthorized {
                status: status.as_u16(),
                body,
            }
            .into());
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let bytes = resp.bytes().await.map_err(GatewayError::Transport)?;
        let login = match serde_json::from_slice::<LoginEnvelope>(&bytes)
            .map_err(GatewayError::Serialization)?
        {
            LoginEnvelope::Wrapped { data } => data,
            LoginEnvelope::Flat(login) => login,
        };

        self.store.set_credentials(&CredentialPair {
            access_token: login.access_token.clone(),
            refresh_token: login.refresh_token.clone(),
        })?;
        match login.user {
            Some(ref user) => self.store.set_user(user)?,
            None => self.store.clear(crate::credentials::StoreKey::User)?,
        }
        match login.organization {
            Some(ref organization) => self.store.set_organization(organization)?,
            None => self.store.clear(crate::credentials::StoreKey::Organization)?,
        }

        tracing::info!("Signed in");
        Ok(login)
    }

    /// Signs out: notifies the server when possible, then clears the store.
    ///
    /// The server call is best-effort; its failure is logged and the local
    /// session is cleared regardless.
    ///
    /// # Errors
    ///
    /// Returns error only if the credential store cannot be cleared.
    pub async fn logout(&self) -> Result<()> {
        if let Err(e) = self.notify_logout().await {
            tracing::warn!("Server logout failed, clearing local session anyway: {}", e);
        }
        self.store.clear_all()?;
        tracing::info!("Signed out");
        Ok(())
    }

    async fn notify_logout(&self) -> Result<()> {
        let credential = self.store.active_credential()?;
        if credential.is_none() {
            tracing::debug!("No stored credential, skipping server logout");
            return Ok(());
        }

        let url = resolve_url(&self.base_url, &self.logout_path)?;
        let mut request = self.http.post(url);
        if let Some((name, value)) = credential_header(credential.as_ref(), &self.secondary_header)?
        {
            request = request.header(name, value);
        }
        if let Some(refresh_token) = self.store.refresh_token()? {
            request = request.json(&serde_json::json!({ "refreshToken": refresh_token }));
        }

        let resp = request.send().await.map_err(GatewayError::Transport)?;
        if !resp.status().is_success() {
            return Err(GatewayError::Api {
                status: resp.status().as_u16(),
                body: resp.text().await.unwrap_or_default(),
            }
            .into());
        }
        Ok(())
    }

    /// Reports what the credential store currently holds.
    pub fn status(&self) -> Result<SessionStatus> {
        let secondary = self.store.secondary_session()?;
        Ok(SessionStatus {
            has_access_token: self.store.access_token()?.is_some(),
            has_refresh_token: self.store.refresh_token()?.is_some(),
            has_secondary_session: secondary.is_some(),
            secondary_expires_at: secondary.and_then(|s| s.expires_at),
            user_email: self.store.user()?.and_then(|u| u.email),
            organization_name: self.store.organization()?.and_then(|o| o.name),
        })
    }
}
