//! Command-line interface definition for Hirelink
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for signing in and out, inspecting the stored
//! session, and sending authenticated API requests.

use clap::{Parser, Subcommand};

/// Hirelink - recruiting API client
///
/// Signs in to the recruiting API and sends requests through the
/// authenticated gateway, refreshing credentials as needed.
#[derive(Parser, Debug, Clone)]
#[command(name = "hirelink")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/hirelink.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the API base URL from config
    #[arg(long)]
    pub base_url: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Hirelink
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Sign in with email and password
    Login {
        /// Account email
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long, env = "HIRELINK_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Sign out and clear stored credentials
    Logout,

    /// Show the stored session
    Status,

    /// Send an authenticated request
    Request {
        /// HTTP method (GET, POST, PUT, PATCH, DELETE)
        method: String,

        /// Path relative to the API base URL
        path: String,

        /// JSON request body
        #[arg(short, long)]
        body: Option<String>,

        /// Query parameter as key=value (repeatable)
        #[arg(short, long = "query", value_name = "KEY=VALUE")]
        query: Vec<String>,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Splits a `key=value` query argument.
///
/// # Examples
///
/// ```
/// use hirelink::cli::parse_query_pair;
///
/// assert_eq!(
///     parse_query_pair("status=open").unwrap(),
///     ("status".to_string(), "open".to_string())
/// );
/// assert!(parse_query_pair("status").is_none());
/// ```
pub fn parse_query_pair(raw: &str) -> Option<(String, String)> {
    let (key, value) = raw.split_once('=')?;
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_login() {
        let cli = Cli::try_parse_from([
            "hirelink",
            "login",
            "--email",
            "ana@example.com",
            "--password",
            "secret",
        ])
        .unwrap();

        match cli.command {
            Commands::Login { email, password } => {
                assert_eq!(email, "ana@example.com");
                assert_eq!(password, "secret");
            }
            _ => panic!("Expected Login command"),
        }
    }

    #[test]
    fn test_cli_parse_status_with_globals() {
        let cli = Cli::try_parse_from([
            "hirelink",
            "--verbose",
            "--base-url",
            "https://api.example.com",
            "status",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.base_url.as_deref(), Some("https://api.example.com"));
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn test_cli_default_config_path() {
        let cli = Cli::try_parse_from(["hirelink", "logout"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some("config/hirelink.yaml"));
        assert!(matches!(cli.command, Commands::Logout));
    }

    #[test]
    fn test_cli_parse_request() {
        let cli = Cli::try_parse_from([
            "hirelink",
            "request",
            "post",
            "/jobs",
            "--body",
            r#"{"title":"Engineer"}"#,
            "--query",
            "draft=true",
            "-q",
            "notify=false",
        ])
        .unwrap();

        match cli.command {
            Commands::Request {
                method,
                path,
                body,
                query,
            } => {
                assert_eq!(method, "post");
                assert_eq!(path, "/jobs");
                assert_eq!(body.as_deref(), Some(r#"{"title":"Engineer"}"#));
                assert_eq!(query, vec!["draft=true", "notify=false"]);
            }
            _ => panic!("Expected Request command"),
        }
    }

    #[test]
    fn test_parse_query_pair_keeps_equals_in_value() {
        assert_eq!(
            parse_query_pair("filter=a=b"),
            Some(("filter".to_string(), "a=b".to_string()))
        );
        assert_eq!(parse_query_pair("=x"), None);
    }
}
