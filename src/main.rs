//! Hirelink - recruiting API client CLI
//!
#![doc = "Hirelink - recruiting API client CLI"]
#![doc = "Main entry point for the Hirelink command-line client."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hirelink::cli::{Cli, Commands};
use hirelink::commands;
use hirelink::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/hirelink.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Login { email, password } => {
            tracing::info!("Signing in");
            commands::auth::login(&config, &email, &password).await?;
            Ok(())
        }
        Commands::Logout => {
            tracing::info!("Signing out");
            commands::auth::logout(&config).await?;
            Ok(())
        }
        Commands::Status => {
            commands::auth::status(&config)?;
            Ok(())
        }
        Commands::Request {
            method,
            path,
            body,
            query,
        } => {
            tracing::debug!("Sending {} {}", method, path);
            commands::request::run_request(&config, &method, &path, body.as_deref(), &query)
                .await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "hirelink=debug"
    } else {
        "hirelink=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
