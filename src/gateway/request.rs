//! Request descriptors and credential header attachment
//!
//! An [`ApiRequest`] describes one outbound call independently of any
//! credential, so the same descriptor can be sent, rejected with `401`,
//! and replayed with a refreshed credential.

use std::collections::HashMap;

use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use url::Url;

use crate::credentials::ActiveCredential;
use crate::error::{GatewayError, Result};

/// Default header carrying the secondary provider's access token.
pub const DEFAULT_SECONDARY_HEADER: &str = "X-Identity-Token";

/// Description of a single API call.
///
/// # Examples
///
/// ```
/// use hirelink::gateway::ApiRequest;
///
/// let request = ApiRequest::post("/jobs", serde_json::json!({ "title": "Rust engineer" }))
///     .query("draft", "true")
///     .header("X-Request-Source", "cli");
///
/// assert_eq!(request.method, reqwest::Method::POST);
/// assert_eq!(request.path, "/jobs");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the API base URL, or an absolute URL on the same
    /// origin.
    pub path: String,
    /// Query string pairs, in order.
    pub query: Vec<(String, String)>,
    /// JSON body, if any.
    pub body: Option<serde_json::Value>,
    /// Extra request headers.  Credential headers are always replaced.
    pub headers: HashMap<String, String>,
}

impl ApiRequest {
    /// Creates a request without a body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            headers: HashMap::new(),
        }
    }

    /// `GET path`
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `POST path` with a JSON body
    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::POST, path).json(body)
    }

    /// `PUT path` with a JSON body
    pub fn put(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::PUT, path).json(body)
    }

    /// `PATCH path` with a JSON body
    pub fn patch(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::PATCH, path).json(body)
    }

    /// `DELETE path`
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Sets the JSON body.
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Appends a query pair.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Adds or replaces a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Builds a `reqwest` request for this descriptor carrying `credential`.
    ///
    /// Caller-supplied headers named like either credential header are
    /// dropped so a stale token can never ride along with a fresh one.
    pub(crate) fn to_builder(
        &self,
        http: &reqwest::Client,
        base_url: &Url,
        credential: Option<&ActiveCredential>,
        secondary_header: &HeaderName,
    ) -> Result<reqwest::RequestBuilder> {
        let url = resolve_url(base_url, &self.path)?;
        let mut builder = http.request(self.method.clone(), url);

        if !self.query.is_empty() {
            builder = builder.query(&self.query);
        }

        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case(AUTHORIZATION.as_str())
                || name.eq_ignore_ascii_case(secondary_header.as_str())
            {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some((name, value)) = credential_header(credential, secondary_header)? {
            builder = builder.header(name, value);
        }

        if let Some(ref body) = self.body {
            builder = builder.json(body);
        }

        Ok(builder)
    }
}

/// Returns the single header that carries `credential`.
///
/// Primary tokens use `Authorization: Bearer <token>`; secondary tokens use
/// `secondary_header: <token>`.  No credential means no header.
pub fn credential_header(
    credential: Option<&ActiveCredential>,
    secondary_header: &HeaderName,
) -> Result<Option<(HeaderName, HeaderValue)>> {
    let header = match credential {
        None => return Ok(None),
        Some(ActiveCredential::Primary(token)) => {
            (AUTHORIZATION, header_value(&format!("Bearer {token}"))?)
        }
        Some(ActiveCredential::Secondary(token)) => (secondary_header.clone(), header_value(token)?),
    };
    Ok(Some(header))
}

fn header_value(value: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(value)
        .map_err(|e| GatewayError::Config(format!("credential is not a valid header value: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Joins `path` onto `base`, keeping any path prefix `base` carries.
///
/// Absolute `http(s)` URLs are accepted only on the origin of `base`, so
/// session credentials never reach another host.
///
/// # Errors
///
/// [`GatewayError::Url`] when the result does not parse, and
/// [`GatewayError::Config`] for an absolute URL on a foreign origin.
pub fn resolve_url(base: &Url, path: &str) -> Result<Url> {
    if path.starts_with("http://") || path.starts_with("https://") {
        let url = Url::parse(path).map_err(GatewayError::Url)?;
        if url.origin() != base.origin() {
            return Err(GatewayError::Config(format!(
                "refusing to send credentials to {}: not the API origin {}",
                url.origin().ascii_serialization(),
                base.origin().ascii_serialization()
            ))
            .into());
        }
        return Ok(url);
    }
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Ok(Url::parse(&joined).map_err(GatewayError::Url)?)
}
