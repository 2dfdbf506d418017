use crate::catalog::OperationCatalog;
use crate::config::ClientConfig;
use crate::credentials::CredentialInjector;
use crate::dispatch::{ApiResponse, Dispatcher};
use crate::error::{OpenApiClientError, Result};
use crate::synthesize::{RequestSynthesizer, resolve_base_url};
use reqwest::Client;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Invoke API operations by identifier.
///
/// Cheap to clone; clones share the catalog, the connection pool and the token cache.
#[derive(Debug, Clone)]
pub struct OpenApiClient {
    catalog: Arc<OperationCatalog>,
    synthesizer: RequestSynthesizer,
    credentials: Arc<CredentialInjector>,
    dispatcher: Dispatcher,
}

fn build_http_client(config: &ClientConfig) -> Result<Client> {
    Client::builder()
        .timeout(config.timeout())
        .build()
        .map_err(|e| OpenApiClientError::Config(format!("failed to build HTTP client: {e}")))
}

impl OpenApiClient {
    /// Load the API description named by `config.spec` and set up credentials.
    ///
    /// # Errors
    ///
    /// Any load, validation, configuration or base-URL error.
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let http = build_http_client(config)?;
        let catalog = OperationCatalog::load(&config.spec, &http).await?;
        Self::with_http_client(catalog, config, http)
    }

    /// Load only the catalog named by `config.spec`, honoring the configured timeout.
    ///
    /// Unlike [`OpenApiClient::connect`] this needs no base URL.
    ///
    /// # Errors
    ///
    /// Any load or validation error.
    pub async fn load_catalog(config: &ClientConfig) -> Result<OperationCatalog> {
        let http = build_http_client(config)?;
        OperationCatalog::load(&config.spec, &http).await
    }

    /// Build a client over an already loaded catalog.
    ///
    /// # Errors
    ///
    /// Configuration or base-URL errors.
    pub fn new(catalog: OperationCatalog, config: &ClientConfig) -> Result<Self> {
        let http = build_http_client(config)?;
        Self::with_http_client(catalog, config, http)
    }

    fn with_http_client(
        catalog: OperationCatalog,
        config: &ClientConfig,
        http: Client,
    ) -> Result<Self> {
        let base_url = resolve_base_url(&catalog, config.base_url.as_deref())?;
        tracing::info!("Using base URL {base_url}");

        Ok(Self {
            catalog: Arc::new(catalog),
            synthesizer: RequestSynthesizer::new(base_url, config.strict_required),
            credentials: Arc::new(CredentialInjector::new(config, http.clone())?),
            dispatcher: Dispatcher::new(http),
        })
    }

    /// Replace the credential injector (for example one with a custom clock).
    #[must_use]
    pub fn with_credentials(mut self, credentials: CredentialInjector) -> Self {
        self.credentials = Arc::new(credentials);
        self
    }

    #[must_use]
    pub fn catalog(&self) -> &OperationCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.synthesizer.base_url()
    }

    /// Look up `operation_id`, build the request from `args`, attach credentials and send it.
    ///
    /// The returned response may carry any status; only failures to produce a response are
    /// errors.
    ///
    /// # Errors
    ///
    /// - [`OpenApiClientError::OperationNotFound`]
    /// - [`OpenApiClientError::MissingParameter`] (strict mode)
    /// - [`OpenApiClientError::TokenFetch`]
    /// - [`OpenApiClientError::InvalidUrl`]
    /// - [`OpenApiClientError::Transport`]
    pub async fn invoke(
        &self,
        operation_id: &str,
        args: &Map<String, Value>,
    ) -> Result<ApiResponse> {
        let operation = self.catalog.get_operation(operation_id)?;
        let request = self.synthesizer.synthesize(operation, args)?;
        let auth_headers = self.credentials.headers().await?;

        tracing::info!(
            operation_id,
            method = %request.method,
            path = %request.url.path(),
            "Invoking operation"
        );

        self.dispatcher.send(request, auth_headers).await
    }
}
