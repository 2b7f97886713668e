//! `request` handler: send one call through the gateway and print the reply.

use colored::Colorize;
use reqwest::Method;

use crate::cli::parse_query_pair;
use crate::config::Config;
use crate::error::{GatewayError, Result};
use crate::gateway::{ApiRequest, Gateway};

/// Builds an [`ApiRequest`] from CLI arguments.
///
/// # Errors
///
/// Returns [`GatewayError::Config`] for an unknown method, a malformed
/// query pair or a body that is not JSON.
pub fn build_request(
    method: &str,
    path: &str,
    body: Option<&str>,
    query: &[String],
) -> Result<ApiRequest> {
    let method = Method::from_bytes(method.to_uppercase().as_bytes())
        .map_err(|_| GatewayError::Config(format!("Invalid HTTP method: {}", method)))?;

    let mut request = ApiRequest::new(method, path);

    for raw in query {
        let (key, value) = parse_query_pair(raw).ok_or_else(|| {
            GatewayError::Config(format!("Query must be KEY=VALUE, got '{}'", raw))
        })?;
        request = request.query(key, value);
    }

    if let Some(body) = body {
        let value: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| GatewayError::Config(format!("Body is not valid JSON: {}", e)))?;
        request = request.json(value);
    }

    Ok(request)
}

/// Send a request and print the status line and body.
pub async fn run_request(
    config: &Config,
    method: &str,
    path: &str,
    body: Option<&str>,
    query: &[String],
) -> Result<()> {
    let request = build_request(method, path, body, query)?;
    let (gateway, _) = super::connect(config)?;
    let rendered = send_and_render(&gateway, request).await?;
    println!("{}", rendered);
    Ok(())
}

pub(crate) async fn send_and_render(gateway: &Gateway, request: ApiRequest) -> Result<String> {
    let response = gateway.send(request).await?;
    let status = response.status();
    let text = response.text().await.map_err(GatewayError::Transport)?;

    let status_line = if status.is_success() {
        status.to_string().green()
    } else {
        status.to_string().red()
    };

    let body = match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(json) => serde_json::to_string_pretty(&json).unwrap_or(text),
        Err(_) => text,
    };

    if body.is_empty() {
        Ok(status_line.to_string())
    } else {
        Ok(format!("{}\n{}", status_line, body))
    }
}
