//! Error types for Hirelink
//!
//! This module defines the error types used throughout the gateway, the
//! credential store and the CLI, using `thiserror` for ergonomic error
//! handling.

use std::sync::Arc;

use thiserror::Error;

use crate::refresh::RefreshError;

/// Main error type for Hirelink operations
///
/// Gateway functions return [`Result`], an `anyhow` alias; the typed variant
/// is recovered with `err.downcast_ref::<GatewayError>()`.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network-level failure of an outbound call (connection refused,
    /// timeout, TLS).  Never triggers a credential refresh.
    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// Authorization failure that will not be retried
    #[error("Unauthorized ({status}): {body}")]
    Unauthorized {
        /// HTTP status returned by the API
        status: u16,
        /// Response body, best-effort
        body: String,
    },

    /// Every refresh avenue was exhausted; the session has been torn down.
    ///
    /// All callers waiting on the same refresh receive clones of the same
    /// `Arc`.
    #[error("Credential refresh failed: {0}")]
    RefreshFailed(Arc<RefreshError>),

    /// The in-flight refresh ended without delivering an outcome
    #[error("Credential refresh was aborted before completing")]
    RefreshAborted,

    /// Non-success HTTP status surfaced by the typed JSON helpers
    #[error("API error ({status}): {body}")]
    Api {
        /// HTTP status returned by the API
        status: u16,
        /// Response body, best-effort
        body: String,
    },

    /// Secondary identity provider errors (session refresh failures)
    #[error("Identity provider error: {0}")]
    IdentityProvider(String),

    /// Credential storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Keyring/credential storage errors
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// URL parsing errors
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Result type alias for Hirelink operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
