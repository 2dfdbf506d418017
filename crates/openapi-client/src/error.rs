//! Error types for `mcp-openapi-client`.

use thiserror::Error;

/// Main error type for loading an API description and invoking its operations.
#[derive(Error, Debug)]
pub enum OpenApiClientError {
    /// The API description could not be read, fetched, or parsed.
    #[error("failed to load OpenAPI spec from '{location}': {message}")]
    SpecLoad { location: String, message: String },

    /// The declared `openapi` version is not a supported major version.
    #[error("unsupported OpenAPI version {found:?} (expected 3.0.x or 3.1.x)")]
    SpecVersion { found: Option<String> },

    /// The document does not have the structural shape expected for its version.
    #[error("invalid OpenAPI spec: {0}")]
    SpecValidation(String),

    /// No operation carries the requested identifier.
    #[error("operation '{operation_id}' not found in the spec")]
    OperationNotFound { operation_id: String },

    /// The OAuth2 client-credentials exchange did not succeed.
    #[error("failed to fetch OAuth2 token from '{token_url}': {message}")]
    TokenFetch { token_url: String, message: String },

    /// A required parameter was absent (strict mode only).
    #[error("missing required {location} parameter '{name}' for operation '{operation_id}'")]
    MissingParameter {
        operation_id: String,
        name: String,
        location: &'static str,
    },

    /// The request target could not be built into an absolute URL.
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),

    /// Configuration errors (bad header names, malformed header JSON).
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport errors from the outbound request, passed through as-is.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl OpenApiClientError {
    pub(crate) fn spec_load(location: impl Into<String>, message: impl ToString) -> Self {
        Self::SpecLoad {
            location: location.into(),
            message: message.to_string(),
        }
    }
}

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, OpenApiClientError>;
