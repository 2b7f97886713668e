//! Configuration management for Hirelink
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::credentials::{CredentialStore, FileBackend, KeyringBackend, MemoryBackend};
use crate::error::{GatewayError, Result};
use reqwest::header::HeaderName;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Main configuration structure for Hirelink
///
/// This structure holds all configuration needed by the gateway, the
/// session service and the credential store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Recruiting API settings
    #[serde(default)]
    pub api: ApiConfig,
    /// Authentication endpoints and credential headers
    #[serde(default)]
    pub auth: AuthConfig,
    /// Secondary identity provider used as the refresh fallback
    #[serde(default)]
    pub secondary: SecondaryConfig,
    /// Credential persistence
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

/// Recruiting API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL every request path is joined onto
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Login endpoint path
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Primary token refresh endpoint path
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,

    /// Logout endpoint path
    #[serde(default = "default_logout_path")]
    pub logout_path: String,

    /// Header carrying the secondary provider's access token
    #[serde(default = "default_secondary_header")]
    pub secondary_header: String,

    /// Unauthenticated entry point the session returns to after teardown
    #[serde(default = "default_login_entry_point")]
    pub login_entry_point: String,

    /// Upper bound for a whole refresh cycle; unbounded when unset
    #[serde(default)]
    pub refresh_timeout_seconds: Option<u64>,
}

fn default_login_path() -> String {
    "/auth/login".to_string()
}

fn default_refresh_path() -> String {
    crate::gateway::DEFAULT_REFRESH_PATH.to_string()
}

fn default_logout_path() -> String {
    "/auth/logout".to_string()
}

fn default_secondary_header() -> String {
    crate::gateway::DEFAULT_SECONDARY_HEADER.to_string()
}

fn default_login_entry_point() -> String {
    crate::gateway::DEFAULT_LOGIN_ENTRY_POINT.to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_path: default_login_path(),
            refresh_path: default_refresh_path(),
            logout_path: default_logout_path(),
            secondary_header: default_secondary_header(),
            login_entry_point: default_login_entry_point(),
            refresh_timeout_seconds: None,
        }
    }
}

/// Secondary identity provider configuration
///
/// When `token_endpoint` is unset the gateway has no secondary fallback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecondaryConfig {
    /// OAuth 2 token endpoint used to renew the secondary session
    #[serde(default)]
    pub token_endpoint: Option<String>,

    /// OAuth client identifier sent with refresh requests
    #[serde(default)]
    pub client_id: Option<String>,
}

/// Where credentials are persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// OS keyring
    Keyring,
    /// JSON file in the user data directory
    #[default]
    File,
    /// Process memory only
    Memory,
}

impl std::str::FromStr for BackendKind {
    type Err = GatewayError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keyring" => Ok(BackendKind::Keyring),
            "file" => Ok(BackendKind::File),
            "memory" => Ok(BackendKind::Memory),
            other => Err(GatewayError::Config(format!(
                "Invalid credentials backend: {}. Must be one of: keyring, file, memory",
                other
            ))),
        }
    }
}

/// Credential persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Storage backend
    #[serde(default)]
    pub backend: BackendKind,

    /// Keyring service namespace
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Credentials file for the `file` backend; defaults to the user data
    /// directory
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_namespace() -> String {
    "hirelink".to_string()
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            namespace: default_namespace(),
            path: None,
        }
    }
}

impl CredentialsConfig {
    /// Resolved credentials file path for the `file` backend.
    ///
    /// # Errors
    ///
    /// Returns error if no path is configured and the user data directory
    /// cannot be determined.
    pub fn file_path(&self) -> Result<PathBuf> {
        match self.path {
            Some(ref path) => Ok(path.clone()),
            None => FileBackend::default_path(),
        }
    }

    /// Opens a credential store on the configured backend.
    ///
    /// # Errors
    ///
    /// Returns error if the credentials file cannot be opened.
    pub fn open_store(&self) -> Result<CredentialStore> {
        let store = match self.backend {
            BackendKind::Keyring => {
                CredentialStore::new(Arc::new(KeyringBackend::new(self.namespace.clone())))
            }
            BackendKind::File => {
                let path = self.file_path()?;
                tracing::debug!("Using credentials file {}", path.display());
                CredentialStore::new(Arc::new(FileBackend::open(path)?))
            }
            BackendKind::Memory => CredentialStore::new(Arc::new(MemoryBackend::new())),
        };
        Ok(store)
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| GatewayError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| GatewayError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        // API overrides
        if let Ok(base_url) = std::env::var("HIRELINK_API_BASE_URL") {
            tracing::debug!(base_url = %base_url, "Env override: HIRELINK_API_BASE_URL");
            self.api.base_url = base_url;
        }

        if let Ok(timeout) = std::env::var("HIRELINK_API_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.api.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid HIRELINK_API_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        // Auth overrides
        if let Ok(refresh_path) = std::env::var("HIRELINK_REFRESH_PATH") {
            self.auth.refresh_path = refresh_path;
        }

        if let Ok(header) = std::env::var("HIRELINK_SECONDARY_HEADER") {
            self.auth.secondary_header = header;
        }

        if let Ok(timeout) = std::env::var("HIRELINK_REFRESH_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.auth.refresh_timeout_seconds = Some(value);
            } else {
                tracing::warn!("Invalid HIRELINK_REFRESH_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        // Credential storage overrides
        if let Ok(backend) = std::env::var("HIRELINK_CREDENTIALS_BACKEND") {
            match backend.parse() {
                Ok(kind) => self.credentials.backend = kind,
                Err(e) => tracing::warn!("{}, keeping configured backend", e),
            }
        }

        if let Ok(path) = std::env::var("HIRELINK_CREDENTIALS_PATH") {
            self.credentials.path = Some(PathBuf::from(path));
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let Some(ref base_url) = cli.base_url {
            self.api.base_url = base_url.clone();
        }
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are within acceptable ranges
    /// and that required fields are properly set.
    ///
    /// # Returns
    ///
    /// Returns Ok if configuration is valid
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        let base_url = url::Url::parse(&self.api.base_url).map_err(|e| {
            GatewayError::Config(format!("Invalid api.base_url '{}': {}", self.api.base_url, e))
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(GatewayError::Config(format!(
                "api.base_url must use http or https, got {}",
                base_url.scheme()
            ))
            .into());
        }

        if self.api.timeout_seconds == 0 {
            return Err(GatewayError::Config(
                "api.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        for (name, value) in [
            ("auth.login_path", &self.auth.login_path),
            ("auth.refresh_path", &self.auth.refresh_path),
            ("auth.logout_path", &self.auth.logout_path),
            ("auth.login_entry_point", &self.auth.login_entry_point),
        ] {
            if !value.starts_with('/') {
                return Err(
                    GatewayError::Config(format!("{} must start with '/': {}", name, value)).into(),
                );
            }
        }

        if self.auth.secondary_header.is_empty() {
            return Err(GatewayError::Config(
                "auth.secondary_header cannot be empty".to_string(),
            )
            .into());
        }

        if HeaderName::from_bytes(self.auth.secondary_header.as_bytes()).is_err() {
            return Err(GatewayError::Config(format!(
                "auth.secondary_header is not a valid header name: {}",
                self.auth.secondary_header
            ))
            .into());
        }

        if self.auth.refresh_timeout_seconds == Some(0) {
            return Err(GatewayError::Config(
                "auth.refresh_timeout_seconds must be greater than 0 when set".to_string(),
            )
            .into());
        }

        if let Some(ref endpoint) = self.secondary.token_endpoint {
            url::Url::parse(endpoint).map_err(|e| {
                GatewayError::Config(format!(
                    "Invalid secondary.token_endpoint '{}': {}",
                    endpoint, e
                ))
            })?;
        }

        if self.credentials.backend == BackendKind::File {
            self.credentials.file_path().map_err(|e| {
                GatewayError::Config(format!("No credentials file path available: {}", e))
            })?;
        }

        Ok(())
    }
}
