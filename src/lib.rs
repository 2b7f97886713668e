//! Hirelink - recruiting API client library
//!
//! This library provides the authenticated request gateway used by the
//! Hirelink recruiting client: credential persistence, single-flight token
//! refresh with provider fallback, session teardown, and configuration.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `credentials`: Persisted tokens, profiles and the secondary session
//! - `gateway`: Authenticated API client, refresh coordinator and teardown
//! - `refresh`: Refresh strategies and the provider fallback resolver
//! - `session`: Login, logout and session status
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli` / `commands`: Command-line interface and its handlers
//!
//! # Example
//!
//! ```no_run
//! use hirelink::{Config, CredentialStore, Gateway};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     config.validate()?;
//!
//!     let gateway = Gateway::from_config(&config, CredentialStore::in_memory())?;
//!     let jobs: serde_json::Value = gateway.get_json("/jobs").await?;
//!     println!("{jobs}");
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod refresh;
pub mod session;

// Re-export commonly used types
pub use config::Config;
pub use credentials::{ActiveCredential, CredentialStore};
pub use error::{GatewayError, Result};
pub use gateway::{ApiRequest, Gateway, GatewayBuilder};
pub use refresh::{ProviderFallbackResolver, RefreshError, RefreshStrategy};
pub use session::{SessionService, SessionStatus};
