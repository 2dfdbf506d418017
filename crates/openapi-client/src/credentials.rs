//! Outgoing authentication headers: static headers plus an optional OAuth2 client-credentials
//! bearer token that is fetched lazily and cached until shortly before it expires.

use crate::config::{ClientConfig, OAuth2Config};
use crate::error::{OpenApiClientError, Result};
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Tokens are treated as expired this long before the server says they are.
pub const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Lifetime assumed when the token response has no `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Source of the current instant for token expiry checks.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<ExpiresIn>,
}

/// `expires_in` as providers actually send it: `3600`, `3600.0` or `"3600"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExpiresIn {
    Seconds(u64),
    Fractional(f64),
    Text(String),
}

impl ExpiresIn {
    /// Negative or non-finite values count as already expired.
    fn lifetime(&self) -> Option<Duration> {
        let fractional = |secs: f64| Duration::try_from_secs_f64(secs).unwrap_or_default();
        match self {
            Self::Seconds(secs) => Some(Duration::from_secs(*secs)),
            Self::Fractional(secs) => Some(fractional(*secs)),
            Self::Text(text) => {
                let text = text.trim();
                match text.parse::<u64>() {
                    Ok(secs) => Some(Duration::from_secs(secs)),
                    Err(_) => text.parse::<f64>().ok().map(fractional),
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
struct OAuth2Settings {
    client_id: String,
    client_secret: String,
    token_url: String,
    scopes: Option<String>,
}

impl OAuth2Settings {
    fn from_config(cfg: &OAuth2Config) -> Option<Self> {
        if !cfg.is_complete() {
            return None;
        }
        Some(Self {
            client_id: cfg.client_id.clone()?,
            client_secret: cfg.client_secret.clone()?,
            token_url: cfg.token_url.clone()?,
            scopes: cfg.scopes.clone().filter(|s| !s.is_empty()),
        })
    }
}

/// Produces the authentication headers for each outbound call.
///
/// Concurrent callers share one token fetch: the cache lock is held across the exchange, so
/// only the first caller that finds the token stale performs it.
pub struct CredentialInjector {
    static_headers: HeaderMap,
    oauth2: Option<OAuth2Settings>,
    client: Client,
    clock: Arc<dyn Clock>,
    token: Mutex<Option<CachedToken>>,
}

impl fmt::Debug for CredentialInjector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialInjector")
            .field("static_headers", &self.static_headers.keys().collect::<Vec<_>>())
            .field(
                "token_url",
                &self.oauth2.as_ref().map(|o| o.token_url.as_str()),
            )
            .finish_non_exhaustive()
    }
}

impl CredentialInjector {
    /// # Errors
    ///
    /// Returns [`OpenApiClientError::Config`] if a static header name or value is not valid HTTP.
    pub fn new(config: &ClientConfig, client: Client) -> Result<Self> {
        let mut static_headers = HeaderMap::new();
        for (name, value) in config.header_pairs() {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                OpenApiClientError::Config(format!("invalid header name '{name}': {e}"))
            })?;
            let header_value = HeaderValue::from_str(&value).map_err(|e| {
                OpenApiClientError::Config(format!("invalid value for header '{name}': {e}"))
            })?;
            static_headers.insert(header_name, header_value);
        }

        let oauth2 = config.oauth2.as_ref().and_then(|cfg| {
            let settings = OAuth2Settings::from_config(cfg);
            if settings.is_none() {
                tracing::warn!(
                    "OAuth2 configuration is incomplete (client id, secret and token URL are \
                     all required); requests will not carry a bearer token"
                );
            }
            settings
        });

        Ok(Self {
            static_headers,
            oauth2,
            client,
            clock: Arc::new(SystemClock),
            token: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn has_oauth2(&self) -> bool {
        self.oauth2.is_some()
    }

    /// Headers to attach to the next request.
    ///
    /// # Errors
    ///
    /// Returns [`OpenApiClientError::TokenFetch`] if a token is needed and the exchange fails.
    pub async fn headers(&self) -> Result<HeaderMap> {
        let mut headers = self.static_headers.clone();

        if let Some(oauth2) = &self.oauth2 {
            let token = self.bearer_token(oauth2).await?;
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
                OpenApiClientError::TokenFetch {
                    token_url: oauth2.token_url.clone(),
                    message: format!("access token is not a valid header value: {e}"),
                }
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }

    async fn bearer_token(&self, oauth2: &OAuth2Settings) -> Result<String> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref()
            && self.clock.now() < token.expires_at
        {
            return Ok(token.access_token.clone());
        }

        let fetched_at = self.clock.now();
        let (access_token, lifetime) = self.fetch_token(oauth2).await?;
        let expires_at = fetched_at
            .checked_add(lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN))
            .unwrap_or(fetched_at);

        tracing::debug!(
            token_url = %oauth2.token_url,
            expires_in_secs = lifetime.as_secs(),
            "Fetched OAuth2 access token"
        );

        *cached = Some(CachedToken {
            access_token: access_token.clone(),
            expires_at,
        });
        Ok(access_token)
    }

    async fn fetch_token(&self, oauth2: &OAuth2Settings) -> Result<(String, Duration)> {
        let token_error = |message: String| OpenApiClientError::TokenFetch {
            token_url: oauth2.token_url.clone(),
            message,
        };

        let mut form: Vec<(&str, &str)> = vec![("grant_type", "client_credentials")];
        if let Some(scopes) = &oauth2.scopes {
            form.push(("scope", scopes.as_str()));
        }
        form.push(("client_id", oauth2.client_id.as_str()));
        form.push(("client_secret", oauth2.client_secret.as_str()));

        let resp = self
            .client
            .post(&oauth2.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| token_error(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(token_error(format!("token endpoint returned {status}: {body}")));
        }

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| token_error(format!("malformed token response: {e}")))?;

        let access_token = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| token_error("token response has no access_token".to_string()))?;
        let lifetime = match &body.expires_in {
            None => DEFAULT_TOKEN_LIFETIME,
            Some(expires_in) => expires_in.lifetime().unwrap_or_else(|| {
                tracing::warn!(
                    token_url = %oauth2.token_url,
                    ?expires_in,
                    "Unreadable expires_in in token response; assuming the default lifetime"
                );
                DEFAULT_TOKEN_LIFETIME
            }),
        };

        Ok((access_token, lifetime))
    }
}
