//! Authenticated API client
//!
//! [`Gateway`] is the single entry point for calls to the recruiting API.
//! It attaches the active credential, and on `401 Unauthorized` hands
//! recovery to its [`RefreshCoordinator`] before replaying the call once.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::HeaderName;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::Instrument;
use url::Url;

use crate::config::Config;
use crate::credentials::{ActiveCredential, CredentialStore};
use crate::error::{GatewayError, Result};
use crate::gateway::coordinator::RefreshCoordinator;
use crate::gateway::request::{ApiRequest, DEFAULT_SECONDARY_HEADER};
use crate::gateway::teardown::{LoginRedirect, SessionTeardown, TracingRedirect};
use crate::refresh::{
    OAuthSessionProvider, PrimaryRefresh, ProviderFallbackResolver, RefreshStrategy,
    SecondaryIdentityProvider, SecondaryRefresh,
};

/// Default refresh endpoint path.
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh-token";

/// Default unauthenticated entry point.
pub const DEFAULT_LOGIN_ENTRY_POINT: &str = "/login";

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`Gateway`].
///
/// The resolver always tries [`PrimaryRefresh`] first, then
/// [`SecondaryRefresh`] when a secondary provider is configured, then any
/// extra strategies in the order they were added.
///
/// # Examples
///
/// ```
/// use hirelink::credentials::CredentialStore;
/// use hirelink::gateway::Gateway;
///
/// let gateway = Gateway::builder("https://api.example.com")
///     .unwrap()
///     .store(CredentialStore::in_memory())
///     .refresh_path("/auth/refresh-token")
///     .build()
///     .unwrap();
///
/// assert_eq!(gateway.base_url().as_str(), "https://api.example.com/");
/// ```
#[derive(Debug)]
pub struct GatewayBuilder {
    base_url: Url,
    store: Option<CredentialStore>,
    http: Option<Arc<reqwest::Client>>,
    timeout: Option<Duration>,
    refresh_path: String,
    secondary_header: String,
    secondary_provider: Option<Arc<dyn SecondaryIdentityProvider>>,
    extra_strategies: Vec<Arc<dyn RefreshStrategy>>,
    redirect: Arc<dyn LoginRedirect>,
    login_entry_point: String,
    refresh_timeout: Option<Duration>,
}

impl GatewayBuilder {
    fn new(base_url: Url) -> Self {
        Self {
            base_url,
            store: None,
            http: None,
            timeout: None,
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            secondary_header: DEFAULT_SECONDARY_HEADER.to_string(),
            secondary_provider: None,
            extra_strategies: Vec::new(),
            redirect: Arc::new(TracingRedirect),
            login_entry_point: DEFAULT_LOGIN_ENTRY_POINT.to_string(),
            refresh_timeout: None,
        }
    }

    /// Credential store shared with the session service.  Defaults to an
    /// in-memory store.
    pub fn store(mut self, store: CredentialStore) -> Self {
        self.store = Some(store);
        self
    }

    /// HTTP client to reuse.  When unset one is built with [`Self::timeout`].
    pub fn http_client(mut self, http: Arc<reqwest::Client>) -> Self {
        self.http = Some(http);
        self
    }

    /// Per-request timeout for the built-in HTTP client.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Path of the primary refresh endpoint.
    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    /// Header carrying the secondary provider's token.
    pub fn secondary_header(mut self, name: impl Into<String>) -> Self {
        self.secondary_header = name.into();
        self
    }

    /// Enables the secondary fallback through `provider`.
    pub fn secondary_provider(mut self, provider: Arc<dyn SecondaryIdentityProvider>) -> Self {
        self.secondary_provider = Some(provider);
        self
    }

    /// Appends a strategy after the built-in ones.
    pub fn strategy(mut self, strategy: Arc<dyn RefreshStrategy>) -> Self {
        self.extra_strategies.push(strategy);
        self
    }

    /// Hook invoked by session teardown.
    pub fn login_redirect(mut self, redirect: Arc<dyn LoginRedirect>) -> Self {
        self.redirect = redirect;
        self
    }

    /// Path of the unauthenticated entry point passed to the redirect.
    pub fn login_entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.login_entry_point = entry_point.into();
        self
    }

    /// Bounds each refresh cycle.  `None` (the default) leaves it unbounded.
    pub fn refresh_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    /// Builds the gateway and its coordinator.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] for an invalid secondary header name
    /// or when the HTTP client cannot be built.
    pub fn build(self) -> Result<Gateway> {
        let secondary_header = HeaderName::from_bytes(self.secondary_header.as_bytes())
            .map_err(|e| {
                GatewayError::Config(format!(
                    "invalid secondary header name '{}': {}",
                    self.secondary_header, e
                ))
            })?;

        let http = match self.http {
            Some(http) => http,
            None => {
                let mut builder = reqwest::Client::builder();
                if let Some(timeout) = self.timeout {
                    builder = builder.timeout(timeout);
                }
                Arc::new(builder.build().map_err(|e| {
                    GatewayError::Config(format!("failed to build HTTP client: {e}"))
                })?)
            }
        };

        let store = self.store.unwrap_or_else(CredentialStore::in_memory);

        let mut resolver = ProviderFallbackResolver::default().with_strategy(Arc::new(
            PrimaryRefresh::new(Arc::clone(&http), self.base_url.clone(), self.refresh_path),
        ));
        if let Some(provider) = self.secondary_provider {
            resolver = resolver.with_strategy(Arc::new(SecondaryRefresh::new(provider)));
        }
        for strategy in self.extra_strategies {
            resolver = resolver.with_strategy(strategy);
        }
        let resolver = resolver.with_timeout(self.refresh_timeout);

        tracing::debug!(
            strategies = ?resolver.strategy_names(),
            "Gateway refresh strategies configured"
        );

        let teardown = SessionTeardown::new(store.clone(), self.redirect, self.login_entry_point);
        let coordinator = RefreshCoordinator::new(resolver, store.clone(), teardown);

        Ok(Gateway {
            http,
            base_url: self.base_url,
            secondary_header,
            store,
            coordinator,
        })
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Authenticated request gateway.
///
/// Cloning shares the HTTP client, store and coordinator, so clones still
/// refresh at most once at a time.  Separately built gateways never share a
/// coordinator.
#[derive(Debug, Clone)]
pub struct Gateway {
    http: Arc<reqwest::Client>,
    base_url: Url,
    secondary_header: HeaderName,
    store: CredentialStore,
    coordinator: RefreshCoordinator,
}

impl Gateway {
    /// Starts a builder for the API at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Url`] if `base_url` does not parse.
    pub fn builder(base_url: &str) -> Result<GatewayBuilder> {
        let base_url = Url::parse(base_url).map_err(GatewayError::Url)?;
        Ok(GatewayBuilder::new(base_url))
    }

    /// Builds a gateway from validated configuration.
    ///
    /// An [`OAuthSessionProvider`] is configured as the secondary fallback
    /// when `secondary.token_endpoint` is set.
    pub fn from_config(config: &Config, store: CredentialStore) -> Result<Self> {
        Self::configured(config, store)?.build()
    }

    /// Starts a builder preloaded from configuration, for callers that
    /// still want to adjust it (for example, to install a login redirect).
    pub fn configured(config: &Config, store: CredentialStore) -> Result<GatewayBuilder> {
        let http = Arc::new(
            reqwest::Client::builder()
                .timeout(Duration::from_secs(config.api.timeout_seconds))
                .build()
                .map_err(|e| GatewayError::Config(format!("failed to build HTTP client: {e}")))?,
        );

        let mut builder = Self::builder(&config.api.base_url)?
            .store(store)
            .http_client(Arc::clone(&http))
            .refresh_path(config.auth.refresh_path.clone())
            .secondary_header(config.auth.secondary_header.clone())
            .login_entry_point(config.auth.login_entry_point.clone())
            .refresh_timeout(config.auth.refresh_timeout_seconds.map(Duration::from_secs));

        if let Some(ref endpoint) = config.secondary.token_endpoint {
            let endpoint = Url::parse(endpoint).map_err(GatewayError::Url)?;
            builder = builder.secondary_provider(Arc::new(OAuthSessionProvider::new(
                http,
                endpoint,
                config.secondary.client_id.clone(),
            )));
        }

        Ok(builder)
    }

    /// Sends `request`, recovering from a single `401 Unauthorized`.
    ///
    /// The first `401` is replayed once. If the stored credential already
    /// differs from the one the call carried, the replay uses it directly;
    /// otherwise the refresh coordinator delivers a new one.  Every other
    /// status is returned as-is.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Transport`] when the request cannot be sent.
    ///   Network failures never trigger a refresh.
    /// - [`GatewayError::Unauthorized`] when the replayed call is rejected
    ///   again.
    /// - [`GatewayError::RefreshFailed`] when every refresh avenue failed;
    ///   the session has been torn down.
    pub async fn send(&self, request: ApiRequest) -> Result<reqwest::Response> {
        let call_id = uuid::Uuid::new_v4();
        let span = tracing::debug_span!(
            "api_call",
            %call_id,
            method = %request.method,
            path = %request.path
        );
        self.send_with_recovery(&request).instrument(span).await
    }

    async fn send_with_recovery(&self, request: &ApiRequest) -> Result<reqwest::Response> {
        let mut credential = self.store.active_credential()?;
        let mut retried = false;

        loop {
            tracing::debug!(
                credential = credential.as_ref().map_or("none", ActiveCredential::kind),
                retried,
                "Dispatching request"
            );

            let response = request
                .to_builder(
                    &self.http,
                    &self.base_url,
                    credential.as_ref(),
                    &self.secondary_header,
                )?
                .send()
                .await
                .map_err(GatewayError::Transport)?;

            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            if retried {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                tracing::debug!("Replayed request rejected again");
                return Err(GatewayError::Unauthorized { status, body }.into());
            }

            retried = true;

            // Another cycle may have rotated the credential while this call
            // was in flight. Replay with that one before spending a refresh.
            let current = self.store.active_credential()?;
            if current.is_some() && current != credential {
                tracing::debug!("Credential changed in flight, replaying without refresh");
                credential = current;
                continue;
            }

            credential = Some(self.coordinator.recover().await?);
            tracing::debug!("Replaying request with refreshed credential");
        }
    }

    /// Sends `request` and deserializes a successful JSON response.
    ///
    /// # Errors
    ///
    /// Any [`Gateway::send`] error, [`GatewayError::Api`] for a non-2xx
    /// status, or a deserialization error.
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let response = self.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                status: status.as_u16(),
                body,
            }
            .into());
        }
        let bytes = response.bytes().await.map_err(GatewayError::Transport)?;
        Ok(serde_json::from_slice(&bytes).map_err(GatewayError::Serialization)?)
    }

    /// `GET path`, deserializing the JSON response.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send_json(ApiRequest::get(path)).await
    }

    /// `GET path`
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        self.send(ApiRequest::get(path)).await
    }

    /// `POST path` with a JSON body
    pub async fn post(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        self.send(ApiRequest::post(path, body)).await
    }

    /// `PUT path` with a JSON body
    pub async fn put(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        self.send(ApiRequest::put(path, body)).await
    }

    /// `PATCH path` with a JSON body
    pub async fn patch(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        self.send(ApiRequest::patch(path, body)).await
    }

    /// `DELETE path`
    pub async fn delete(&self, path: &str) -> Result<reqwest::Response> {
        self.send(ApiRequest::delete(path)).await
    }

    /// Credential store used by this gateway.
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// This gateway's refresh coordinator.
    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Shared HTTP client.
    pub fn http_client(&self) -> &Arc<reqwest::Client> {
        &self.http
    }

    /// Header carrying the secondary provider's token.
    pub fn secondary_header(&self) -> &HeaderName {
        &self.secondary_header
    }
}
