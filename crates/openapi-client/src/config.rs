use crate::error::{OpenApiClientError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

/// Default bound on every outbound call (token exchange and dispatch).
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for an OpenAPI-backed client.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// `OpenAPI` spec location (URL or file path).
    #[serde(default)]
    pub spec: String,

    /// Override the base URL taken from the spec's first server.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Static headers sent with every request. Free-form JSON object; non-string values are
    /// sent in their JSON text form.
    #[serde(default)]
    pub headers: Map<String, Value>,

    /// OAuth2 client-credentials settings.
    #[serde(default)]
    pub oauth2: Option<OAuth2Config>,

    /// Outbound request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Fail locally when a required parameter is missing instead of leaving it to the server.
    #[serde(default)]
    pub strict_required: bool,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl ClientConfig {
    #[must_use]
    pub fn new(spec: impl Into<String>) -> Self {
        Self {
            spec: spec.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Static headers as `(name, value)` string pairs.
    #[must_use]
    pub fn header_pairs(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect()
    }
}

/// OAuth2 client-credentials settings.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuth2Config {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub token_url: Option<String>,
    /// Space-delimited scopes.
    #[serde(default)]
    pub scopes: Option<String>,
}

impl OAuth2Config {
    /// Client id, secret, and token URL are all present and non-empty.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        [&self.client_id, &self.client_secret, &self.token_url]
            .iter()
            .all(|v| v.as_deref().is_some_and(|s| !s.is_empty()))
    }
}

impl fmt::Debug for OAuth2Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2Config")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("token_url", &self.token_url)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Parse a `--headers` style argument: the text must be a JSON object.
///
/// # Errors
///
/// Returns [`OpenApiClientError::Config`] if the text is not valid JSON or not an object.
pub fn parse_headers_json(text: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(OpenApiClientError::Config(
            "headers must be a JSON object (e.g. '{\"X-Api-Key\": \"abc\"}')".to_string(),
        )),
        Err(e) => Err(OpenApiClientError::Config(format!(
            "headers must be valid JSON: {e}"
        ))),
    }
}
