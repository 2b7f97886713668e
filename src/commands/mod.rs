/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

- `auth`    -- login, logout and session status
- `request` -- send an authenticated API request

Handlers open the configured credential store, build a gateway over it and
print results with `colored`.
*/

use std::sync::Arc;

use colored::Colorize;

use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::error::Result;
use crate::gateway::{Gateway, LoginRedirect};
use crate::session::SessionService;

pub mod auth;
pub mod request;

/// Login redirect for the terminal: tells the user how to sign in again.
#[derive(Debug, Default, Clone)]
pub struct CliRedirect;

impl LoginRedirect for CliRedirect {
    fn redirect_to_login(&self, entry_point: &str, reason: &str) {
        tracing::debug!(entry_point, "Session torn down: {}", reason);
        eprintln!(
            "{} {}",
            "Session expired.".yellow().bold(),
            format!("Run `hirelink login --email <EMAIL>` to sign in again ({entry_point}).")
                .yellow()
        );
    }
}

/// Builds the gateway and session service for `config`.
pub(crate) fn connect(config: &Config) -> Result<(Gateway, SessionService)> {
    let store = config.credentials.open_store()?;
    connect_with_store(config, store)
}

pub(crate) fn connect_with_store(
    config: &Config,
    store: CredentialStore,
) -> Result<(Gateway, SessionService)> {
    let gateway = Gateway::configured(config, store)?
        .login_redirect(Arc::new(CliRedirect))
        .build()?;
    let sessions = SessionService::new(
        &gateway,
        config.auth.login_path.clone(),
        config.auth.logout_path.clone(),
    );
    Ok((gateway, sessions))
}
