//! `login`, `logout` and `status` handlers.

use colored::Colorize;

use crate::config::Config;
use crate::error::Result;
use crate::session::{SessionService, SessionStatus};

/// Sign in and persist the issued session.
pub async fn login(config: &Config, email: &str, password: &str) -> Result<()> {
    let (_, sessions) = super::connect(config)?;
    login_with(&sessions, email, password).await
}

pub(crate) async fn login_with(
    sessions: &SessionService,
    email: &str,
    password: &str,
) -> Result<()> {
    let response = sessions.login(email, password).await?;

    let who = response
        .user
        .as_ref()
        .and_then(|u| u.email.clone())
        .unwrap_or_else(|| email.to_string());
    println!("{} {}", "Signed in as".green(), who.cyan());
    if let Some(name) = response.organization.as_ref().and_then(|o| o.name.as_ref()) {
        println!("{} {}", "Organization:".bold(), name);
    }
    Ok(())
}

/// Sign out and clear the stored session.
pub async fn logout(config: &Config) -> Result<()> {
    let (_, sessions) = super::connect(config)?;
    sessions.logout().await?;
    println!("{}", "Signed out".green());
    Ok(())
}

/// Print the stored session.
pub fn status(config: &Config) -> Result<()> {
    let (_, sessions) = super::connect(config)?;
    let status = sessions.status()?;
    print!("{}", format_status(&status));
    Ok(())
}

fn yes_no(value: bool) -> colored::ColoredString {
    if value {
        "yes".green()
    } else {
        "no".red()
    }
}

/// Renders `status` for the terminal.
pub fn format_status(status: &SessionStatus) -> String {
    let mut out = String::new();

    if !status.is_signed_in() {
        out.push_str(&format!("{}\n", "Not signed in.".yellow()));
        return out;
    }

    out.push_str(&format!("{}\n", "Session".bold()));
    out.push_str(&format!(
        "  User:              {}\n",
        status.user_email.as_deref().unwrap_or("-").cyan()
    ));
    out.push_str(&format!(
        "  Organization:      {}\n",
        status.organization_name.as_deref().unwrap_or("-")
    ));
    out.push_str(&format!(
        "  Access token:      {}\n",
        yes_no(status.has_access_token)
    ));
    out.push_str(&format!(
        "  Refresh token:     {}\n",
        yes_no(status.has_refresh_token)
    ));
    out.push_str(&format!(
        "  Secondary session: {}\n",
        yes_no(status.has_secondary_session)
    ));
    if let Some(expires_at) = status.secondary_expires_at {
        out.push_str(&format!(
            "  Secondary expires: {}\n",
            expires_at.format("%Y-%m-%d %H:%M UTC")
        ));
    }
    out
}
