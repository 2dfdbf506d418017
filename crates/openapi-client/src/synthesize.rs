//! Turn an operation plus caller arguments into a concrete HTTP request.

use crate::catalog::{Operation, OperationCatalog, ParamLocation};
use crate::error::{OpenApiClientError, Result};
use crate::resolver::is_http_url;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use url::Url;

static SERVER_VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^}]*\}").expect("static regex"));
static QUERY_EXPANSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\?[^}]*\}").expect("static regex"));

/// A request ready for dispatch. Query parameters are already encoded into `url`.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedRequest {
    pub method: reqwest::Method,
    pub url: Url,
    /// Header parameters, in declaration order.
    pub headers: Vec<(String, String)>,
    /// JSON body; `None` unless at least one declared body property was supplied.
    pub body: Option<Map<String, Value>>,
}

/// Resolve the prefix every route is appended to.
///
/// Uses `override_url` when given, else the first declared server (`/` when none are
/// declared). Server-variable segments (`{region}`) are removed. A relative server URL is
/// joined onto the document URL when the document was fetched over HTTP.
///
/// # Errors
///
/// Returns [`OpenApiClientError::InvalidUrl`] if no absolute base URL can be determined, which
/// is the case for a relative (or absent) server in a document loaded from a file.
pub fn resolve_base_url(catalog: &OperationCatalog, override_url: Option<&str>) -> Result<String> {
    if let Some(url) = override_url.filter(|u| !u.trim().is_empty()) {
        return Ok(url.trim().trim_end_matches('/').to_string());
    }

    let server = catalog.servers().first().map_or("/", String::as_str);
    let server = SERVER_VARIABLE.replace_all(server, "");

    if Url::parse(&server).is_ok() {
        return Ok(server.trim_end_matches('/').to_string());
    }

    match catalog.source().filter(|s| is_http_url(s)) {
        Some(source) => {
            let joined = Url::parse(source)
                .and_then(|base| base.join(&server))
                .map_err(|e| {
                    OpenApiClientError::InvalidUrl(format!(
                        "cannot resolve server '{server}' against '{source}': {e}"
                    ))
                })?;
            Ok(joined.as_str().trim_end_matches('/').to_string())
        }
        None => Err(OpenApiClientError::InvalidUrl(format!(
            "server URL '{server}' is relative and the spec was not fetched over HTTP; \
             pass a base URL override"
        ))),
    }
}

/// Builds requests against one base URL.
#[derive(Debug, Clone)]
pub struct RequestSynthesizer {
    base_url: String,
    strict_required: bool,
}

impl RequestSynthesizer {
    #[must_use]
    pub fn new(base_url: impl Into<String>, strict_required: bool) -> Self {
        Self {
            base_url: base_url.into(),
            strict_required,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Classify `args` by the operation's declared parameters and build the request.
    ///
    /// Arguments that match no declared parameter or body property are ignored. Absent or
    /// `null` parameters are skipped unless strict mode is on and the parameter is required.
    ///
    /// # Errors
    ///
    /// - [`OpenApiClientError::MissingParameter`] in strict mode
    /// - [`OpenApiClientError::InvalidUrl`] if the final target is not a valid URL
    pub fn synthesize(
        &self,
        operation: &Operation,
        args: &Map<String, Value>,
    ) -> Result<SynthesizedRequest> {
        let mut path = QUERY_EXPANSION.replace_all(&operation.path, "").into_owned();
        let mut query: Vec<(String, String)> = Vec::new();
        let mut headers = Vec::new();

        for param in &operation.parameters {
            let value = match args.get(&param.name) {
                Some(Value::Null) | None => {
                    if self.strict_required && param.required {
                        return Err(OpenApiClientError::MissingParameter {
                            operation_id: operation.operation_id.clone(),
                            name: param.name.clone(),
                            location: param.location.as_str(),
                        });
                    }
                    continue;
                }
                Some(v) => v,
            };

            match param.location {
                ParamLocation::Path => {
                    let placeholder = format!("{{{}}}", param.name);
                    path = path.replace(&placeholder, &encode_component(&value_to_string(value)));
                }
                ParamLocation::Query => match value {
                    Value::Array(items) => {
                        for item in items.iter().filter(|v| !v.is_null()) {
                            query.push((param.name.clone(), value_to_string(item)));
                        }
                    }
                    other => query.push((param.name.clone(), value_to_string(other))),
                },
                ParamLocation::Header => {
                    headers.push((param.name.clone(), value_to_string(value)));
                }
            }
        }

        let body = operation.request_body.as_ref().and_then(|spec| {
            let fields: Map<String, Value> = spec
                .properties
                .iter()
                .filter_map(|name| args.get(name).map(|v| (name.clone(), v.clone())))
                .collect();
            (!fields.is_empty()).then_some(fields)
        });

        if self.strict_required
            && let Some(spec) = &operation.request_body
        {
            if let Some(name) = spec
                .required_properties
                .iter()
                .find(|name| args.get(*name).is_none_or(Value::is_null))
            {
                return Err(OpenApiClientError::MissingParameter {
                    operation_id: operation.operation_id.clone(),
                    name: name.clone(),
                    location: "body",
                });
            }
        }

        Ok(SynthesizedRequest {
            method: operation.method.to_reqwest(),
            url: build_url(&self.base_url, &path, &query)?,
            headers,
            body,
        })
    }
}

fn build_url(base_url: &str, path: &str, query: &[(String, String)]) -> Result<Url> {
    let target = format!("{}{}", base_url.trim_end_matches('/'), path);
    let mut url = Url::parse(&target)
        .map_err(|e| OpenApiClientError::InvalidUrl(format!("'{target}': {e}")))?;

    if !query.is_empty() {
        let encoded = query
            .iter()
            .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
            .collect::<Vec<_>>()
            .join("&");
        url.set_query(Some(&encoded));
    }

    Ok(url)
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
fn encode_component(s: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 0x0F) as usize] as char);
        }
    }
    out
}

fn is_unreserved(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~')
}

/// Scalars in their plain form; objects and nested arrays as JSON text.
pub(crate) fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}
