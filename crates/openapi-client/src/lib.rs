//! Invoke operations described by an `OpenAPI` 3.0/3.1 document by their `operationId`.
//!
//! The pieces, in the order a call passes through them:
//! - [`OperationCatalog`] loads and validates the document and indexes its operations
//! - [`RequestSynthesizer`] turns an operation plus arguments into a concrete request
//! - [`CredentialInjector`] supplies static headers and an OAuth2 client-credentials token
//! - [`Dispatcher`] sends the request and returns the raw [`ApiResponse`]
//!
//! [`OpenApiClient::invoke`] ties them together; [`tools`] exposes the same operations as MCP
//! tools.

pub mod catalog;
pub mod client;
pub mod config;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod resolver;
pub mod synthesize;
pub mod tools;

pub use catalog::{HttpMethod, Operation, OperationCatalog, ParamLocation, Parameter};
pub use client::OpenApiClient;
pub use config::{ClientConfig, OAuth2Config};
pub use credentials::{Clock, CredentialInjector, SystemClock};
pub use dispatch::{ApiResponse, Dispatcher};
pub use error::{OpenApiClientError, Result};
pub use synthesize::{RequestSynthesizer, SynthesizedRequest};
