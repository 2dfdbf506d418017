use crate::error::Result;
use crate::synthesize::SynthesizedRequest;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde_json::Value;

/// Raw result of one operation call. Non-2xx statuses are returned here, not as errors.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The `Content-Type` header, if present and readable.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Body parsed as JSON, if it is JSON.
    #[must_use]
    pub fn json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }

    /// Body decoded as UTF-8, lossily.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends synthesized requests. Holds the shared connection pool.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: Client,
}

impl Dispatcher {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Send `request` with `auth_headers` applied first; header parameters of the request
    /// override auth headers of the same name.
    ///
    /// # Errors
    ///
    /// Returns [`crate::OpenApiClientError::Transport`] if the request could not be completed
    /// (connect failure, timeout, broken body).
    pub async fn send(
        &self,
        request: SynthesizedRequest,
        auth_headers: HeaderMap,
    ) -> Result<ApiResponse> {
        let mut headers = auth_headers;
        for (name, value) in &request.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => {
                    tracing::warn!(
                        "Skipping header parameter '{name}' with an invalid name or value"
                    );
                }
            }
        }

        tracing::debug!(method = %request.method, url = %request.url, "Dispatching request");

        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?.to_vec();

        tracing::debug!(%status, bytes = body.len(), "Received response");

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}
