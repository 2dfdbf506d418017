//! Operation catalog: an indexed, read-only view of an `OpenAPI` 3.0/3.1 document.
//!
//! Loading reads the document, expands every `$ref`, validates the structural shape the rest of
//! the crate relies on, and assigns an identifier to every operation that lacks one. After
//! construction the catalog is immutable and can be shared freely across tasks.

use crate::error::{OpenApiClientError, Result};
use crate::resolver::{DocId, RefResolver, parse_document, read_document};
use reqwest::Client;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// HTTP methods an `OpenAPI` path item can carry, in path-item field order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl HttpMethod {
    /// Parse a path-item key (`get`, `post`, ...). Keys are case-sensitive in `OpenAPI`.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "get" => Self::Get,
            "put" => Self::Put,
            "post" => Self::Post,
            "delete" => Self::Delete,
            "options" => Self::Options,
            "head" => Self::Head,
            "patch" => Self::Patch,
            "trace" => Self::Trace,
            _ => return None,
        })
    }

    /// Lower-case key as written in the document.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Put => "put",
            Self::Post => "post",
            Self::Delete => "delete",
            Self::Options => "options",
            Self::Head => "head",
            Self::Patch => "patch",
            Self::Trace => "trace",
        }
    }

    #[must_use]
    pub fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Put => reqwest::Method::PUT,
            Self::Post => reqwest::Method::POST,
            Self::Delete => reqwest::Method::DELETE,
            Self::Options => reqwest::Method::OPTIONS,
            Self::Head => reqwest::Method::HEAD,
            Self::Patch => reqwest::Method::PATCH,
            Self::Trace => reqwest::Method::TRACE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_ascii_uppercase())
    }
}

/// Where a parameter goes in the outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamLocation {
    Path,
    Query,
    Header,
}

impl ParamLocation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
        }
    }
}

/// A declared request parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub location: ParamLocation,
    pub required: bool,
    pub description: Option<String>,
    /// JSON schema for the parameter (`{"type": "string"}` when the document gives none).
    pub schema: Value,
}

/// JSON request body declared by an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestBodySpec {
    pub content_type: String,
    pub required: bool,
    /// Top-level property names, in declaration order.
    pub properties: Vec<String>,
    pub required_properties: Vec<String>,
    pub schema: Value,
}

impl RequestBodySpec {
    /// Schema of one top-level property, if declared.
    #[must_use]
    pub fn property_schema(&self, name: &str) -> Option<&Value> {
        self.schema.get("properties").and_then(|p| p.get(name)).or_else(|| {
            self.schema
                .get("allOf")
                .and_then(Value::as_array)?
                .iter()
                .find_map(|part| part.get("properties").and_then(|p| p.get(name)))
        })
    }
}

/// One method-on-route.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub operation_id: String,
    /// The identifier was generated at load time rather than read from the document.
    pub synthesized_id: bool,
    pub method: HttpMethod,
    pub path: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    /// Path-item parameters merged with operation parameters (operation wins per name+location).
    pub parameters: Vec<Parameter>,
    pub request_body: Option<RequestBodySpec>,
}

/// Indexed set of operations from one API description.
#[derive(Debug, Clone)]
pub struct OperationCatalog {
    document: Value,
    version: String,
    title: String,
    servers: Vec<String>,
    source: Option<String>,
    operations: Vec<Operation>,
    by_id: HashMap<String, usize>,
}

impl OperationCatalog {
    /// Load an API description from a file path, `file://` URL, or `http(s)://` URL.
    ///
    /// # Errors
    ///
    /// - [`OpenApiClientError::SpecLoad`] if the document (or a document it references) cannot
    ///   be read or parsed
    /// - [`OpenApiClientError::SpecVersion`] if it is not `OpenAPI` 3.0/3.1
    /// - [`OpenApiClientError::SpecValidation`] if its structure is invalid
    pub async fn load(source: &str, client: &Client) -> Result<Self> {
        tracing::info!("Loading OpenAPI spec from {source}");

        let root_doc = DocId::parse(source)?;
        let text = read_document(&root_doc, client).await?;
        let raw = parse_document(source, &text)?;

        // Reject unsupported versions before chasing external references.
        check_version(&raw)?;

        let resolver = RefResolver::new(root_doc, raw, client);
        resolver.load_referenced_documents().await?;
        let resolved = resolver.inline_root()?;

        let mut catalog = Self::build(resolved)?;
        catalog.source = Some(source.to_string());

        tracing::info!(
            "Indexed {} operations from OpenAPI spec '{}'",
            catalog.operations.len(),
            catalog.title
        );
        Ok(catalog)
    }

    /// Build a catalog from an in-memory document. Only local `#/...` refs are expanded.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`], minus fetching.
    pub fn from_value(document: Value) -> Result<Self> {
        check_version(&document)?;
        let resolved = RefResolver::local(document).inline_root()?;
        Self::build(resolved)
    }

    fn build(mut document: Value) -> Result<Self> {
        let version = check_version(&document)?;
        let title = validate_info(&document)?;
        let servers = parse_servers(&document)?;

        let paths = document
            .get("paths")
            .and_then(Value::as_object)
            .ok_or_else(|| invalid("'paths' must be an object"))?;

        let mut taken = collect_explicit_ids(paths)?;
        let mut operations = Vec::new();
        let mut write_back: Vec<(String, &'static str, String)> = Vec::new();

        for (route, item) in paths {
            // Validated by `collect_explicit_ids`.
            let Some(item) = item.as_object() else {
                continue;
            };
            let path_level = parse_parameters(item.get("parameters"), route)?;

            for (key, op) in item {
                let Some(method) = HttpMethod::from_key(key) else {
                    continue;
                };
                let context = format!("{method} {route}");

                let (operation_id, synthesized_id) =
                    match op.get("operationId").and_then(Value::as_str) {
                        Some(id) => (id.to_string(), false),
                        None => {
                            let base = synthesize_operation_id(method, route);
                            let id = reserve_unique_id(&mut taken, &base);
                            write_back.push((route.clone(), method.as_str(), id.clone()));
                            (id, true)
                        }
                    };

                let op_level = parse_parameters(op.get("parameters"), &context)?;

                operations.push(Operation {
                    operation_id,
                    synthesized_id,
                    method,
                    path: route.clone(),
                    summary: string_field(op, "summary"),
                    description: string_field(op, "description"),
                    parameters: merge_parameters(&path_level, op_level),
                    request_body: parse_request_body(op.get("requestBody"), &context)?,
                });
            }
        }

        for (route, method, id) in write_back {
            if let Some(op) = document
                .get_mut("paths")
                .and_then(|p| p.get_mut(&route))
                .and_then(|item| item.get_mut(method))
                .and_then(Value::as_object_mut)
            {
                op.insert("operationId".to_string(), Value::String(id));
            }
        }

        let by_id = operations
            .iter()
            .enumerate()
            .map(|(i, op)| (op.operation_id.clone(), i))
            .collect();

        Ok(Self {
            document,
            version,
            title,
            servers,
            source: None,
            operations,
            by_id,
        })
    }

    /// All operations in document order (route order, then method order as written).
    #[must_use]
    pub fn list_operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Exact-match lookup by operation identifier.
    ///
    /// # Errors
    ///
    /// Returns [`OpenApiClientError::OperationNotFound`] if no operation has this identifier.
    pub fn get_operation(&self, operation_id: &str) -> Result<&Operation> {
        self.by_id
            .get(operation_id)
            .map(|&i| &self.operations[i])
            .ok_or_else(|| OpenApiClientError::OperationNotFound {
                operation_id: operation_id.to_string(),
            })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Declared server URLs, in document order.
    #[must_use]
    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Where the document was loaded from (`None` for in-memory documents).
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// The resolved document, with generated identifiers written back.
    #[must_use]
    pub fn document(&self) -> &Value {
        &self.document
    }
}

impl FromStr for OperationCatalog {
    type Err = OpenApiClientError;

    fn from_str(text: &str) -> Result<Self> {
        Self::from_value(parse_document("<inline>", text)?)
    }
}

/// Derive an identifier from method and route: `GET /users/{id}/posts` → `getUsersIdPosts`.
///
/// The route is lower-cased, template braces are dropped (the parameter name stays), and every
/// run of non-alphanumeric characters starts a new capitalized word.
#[must_use]
pub fn synthesize_operation_id(method: HttpMethod, route: &str) -> String {
    let lowered: String = route
        .to_lowercase()
        .chars()
        .filter(|c| *c != '{' && *c != '}')
        .collect();

    let mut id = method.as_str().to_string();
    for word in lowered
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            id.push(first.to_ascii_uppercase());
            id.push_str(chars.as_str());
        }
    }
    id
}

fn reserve_unique_id(taken: &mut HashSet<String>, base: &str) -> String {
    if taken.insert(base.to_string()) {
        return base.to_string();
    }

    let mut counter = 2;
    loop {
        let candidate = format!("{base}_{counter}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}

fn invalid(message: impl Into<String>) -> OpenApiClientError {
    OpenApiClientError::SpecValidation(message.into())
}

fn string_field(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(Value::as_str).map(str::to_string)
}

fn is_supported_version(version: &str) -> bool {
    let mut parts = version.split('.');
    matches!(
        (parts.next(), parts.next()),
        (Some("3"), Some("0" | "1"))
    )
}

fn check_version(document: &Value) -> Result<String> {
    if !document.is_object() {
        return Err(invalid("document root must be an object"));
    }

    match document.get("openapi").and_then(Value::as_str) {
        Some(v) if is_supported_version(v) => Ok(v.to_string()),
        Some(v) => Err(OpenApiClientError::SpecVersion {
            found: Some(v.to_string()),
        }),
        // Swagger 2.0 documents carry `swagger` instead of `openapi`.
        None => Err(OpenApiClientError::SpecVersion {
            found: document
                .get("swagger")
                .and_then(Value::as_str)
                .map(str::to_string),
        }),
    }
}

fn validate_info(document: &Value) -> Result<String> {
    let info = document
        .get("info")
        .and_then(Value::as_object)
        .ok_or_else(|| invalid("'info' must be an object"))?;
    if !info.get("version").is_some_and(Value::is_string) {
        return Err(invalid("'info.version' must be a string"));
    }
    info.get("title")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| invalid("'info.title' must be a string"))
}

fn parse_servers(document: &Value) -> Result<Vec<String>> {
    let Some(servers) = document.get("servers") else {
        return Ok(Vec::new());
    };
    let servers = servers
        .as_array()
        .ok_or_else(|| invalid("'servers' must be a list"))?;

    servers
        .iter()
        .enumerate()
        .map(|(i, s)| {
            s.get("url")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    invalid(format!("servers[{i}] must be an object with a string 'url'"))
                })
        })
        .collect()
}

/// Validate path items and operations, and gather the identifiers the document declares.
fn collect_explicit_ids(paths: &Map<String, Value>) -> Result<HashSet<String>> {
    let mut ids = HashSet::new();

    for (route, item) in paths {
        if !route.starts_with('/') {
            return Err(invalid(format!("path '{route}' must start with '/'")));
        }
        let item = item
            .as_object()
            .ok_or_else(|| invalid(format!("path item '{route}' must be an object")))?;

        for (key, op) in item {
            let Some(method) = HttpMethod::from_key(key) else {
                continue;
            };
            if !op.is_object() {
                return Err(invalid(format!(
                    "operation {method} {route} must be an object"
                )));
            }
            let Some(id) = op.get("operationId") else {
                continue;
            };
            let id = id
                .as_str()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    invalid(format!(
                        "operationId of {method} {route} must be a non-empty string"
                    ))
                })?;
            if !ids.insert(id.to_string()) {
                return Err(invalid(format!("duplicate operationId '{id}'")));
            }
        }
    }

    Ok(ids)
}

fn parse_parameters(value: Option<&Value>, context: &str) -> Result<Vec<Parameter>> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    let list = value
        .as_array()
        .ok_or_else(|| invalid(format!("parameters of {context} must be a list")))?;

    let mut out = Vec::with_capacity(list.len());
    for (i, p) in list.iter().enumerate() {
        let name = p.get("name").and_then(Value::as_str);
        let location = p.get("in").and_then(Value::as_str);
        let (Some(name), Some(location)) = (name, location) else {
            return Err(invalid(format!(
                "parameters[{i}] of {context} needs string 'name' and 'in'"
            )));
        };

        let location = match location {
            "path" => ParamLocation::Path,
            "query" => ParamLocation::Query,
            "header" => ParamLocation::Header,
            "cookie" => {
                tracing::warn!("Skipping cookie parameter '{name}' of {context}");
                continue;
            }
            other => {
                return Err(invalid(format!(
                    "parameter '{name}' of {context} has unknown location '{other}'"
                )));
            }
        };

        out.push(Parameter {
            name: name.to_string(),
            location,
            // Path parameters are always required.
            required: location == ParamLocation::Path
                || p.get("required").and_then(Value::as_bool).unwrap_or(false),
            description: string_field(p, "description"),
            schema: p
                .get("schema")
                .cloned()
                .unwrap_or_else(|| serde_json::json!({"type": "string"})),
        });
    }

    Ok(out)
}

fn merge_parameters(path_level: &[Parameter], operation_level: Vec<Parameter>) -> Vec<Parameter> {
    let mut merged = path_level.to_vec();
    for p in operation_level {
        if let Some(existing) = merged
            .iter_mut()
            .find(|m| m.name == p.name && m.location == p.location)
        {
            *existing = p;
        } else {
            merged.push(p);
        }
    }
    merged
}

fn is_json_media_type(media_type: &str) -> bool {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

fn parse_request_body(value: Option<&Value>, context: &str) -> Result<Option<RequestBodySpec>> {
    let Some(value) = value else {
        return Ok(None);
    };
    let body = value
        .as_object()
        .ok_or_else(|| invalid(format!("requestBody of {context} must be an object")))?;

    let Some(content) = body.get("content").and_then(Value::as_object) else {
        return Ok(None);
    };

    let chosen = content.get_key_value("application/json").or_else(|| {
        content
            .iter()
            .find(|(media_type, _)| is_json_media_type(media_type))
    });
    let Some((content_type, media)) = chosen else {
        return Ok(None);
    };

    let schema = media
        .get("schema")
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));

    let mut properties = Vec::new();
    let mut required_properties = Vec::new();
    let parts = std::iter::once(&schema).chain(
        schema
            .get("allOf")
            .and_then(Value::as_array)
            .into_iter()
            .flatten(),
    );
    for part in parts {
        if let Some(props) = part.get("properties").and_then(Value::as_object) {
            for name in props.keys() {
                if !properties.contains(name) {
                    properties.push(name.clone());
                }
            }
        }
        if let Some(req) = part.get("required").and_then(Value::as_array) {
            required_properties.extend(req.iter().filter_map(Value::as_str).map(str::to_string));
        }
    }

    Ok(Some(RequestBodySpec {
        content_type: content_type.clone(),
        required: body.get("required").and_then(Value::as_bool).unwrap_or(false),
        properties,
        required_properties,
        schema,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn petstore() -> Value {
        json!({
            "openapi": "3.0.3",
            "info": { "title": "Petstore", "version": "1" },
            "servers": [ { "url": "https://api.example.com/v1" } ],
            "components": {
                "parameters": {
                    "PetId": { "name": "petId", "in": "path", "required": true, "schema": { "type": "integer" } }
                },
                "schemas": {
                    "NewPet": {
                        "type": "object",
                        "required": ["name"],
                        "properties": { "name": { "type": "string" }, "tag": { "type": "string" } }
                    }
                }
            },
            "paths": {
                "/pets": {
                    "get": {
                        "operationId": "listPets",
                        "summary": "List pets",
                        "parameters": [ { "name": "limit", "in": "query", "schema": { "type": "integer" } } ]
                    },
                    "post": {
                        "requestBody": {
                            "required": true,
                            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/NewPet" } } }
                        }
                    }
                },
                "/pets/{petId}": {
                    "parameters": [ { "$ref": "#/components/parameters/PetId" } ],
                    "get": { "operationId": "showPetById" },
                    "delete": {}
                }
            }
        })
    }

    #[test]
    fn lists_every_method_entry_in_document_order() {
        let catalog = OperationCatalog::from_value(petstore()).unwrap();
        let listed: Vec<(HttpMethod, &str)> = catalog
            .list_operations()
            .iter()
            .map(|op| (op.method, op.path.as_str()))
            .collect();

        assert_eq!(
            listed,
            vec![
                (HttpMethod::Get, "/pets"),
                (HttpMethod::Post, "/pets"),
                (HttpMethod::Get, "/pets/{petId}"),
                (HttpMethod::Delete, "/pets/{petId}"),
            ]
        );
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.title(), "Petstore");
        assert_eq!(catalog.version(), "3.0.3");
        assert_eq!(catalog.servers(), ["https://api.example.com/v1"]);
    }

    #[test]
    fn synthesizes_missing_ids_and_writes_them_back() {
        let catalog = OperationCatalog::from_value(petstore()).unwrap();

        let post = catalog.get_operation("postPets").unwrap();
        assert!(post.synthesized_id);
        assert_eq!(post.method, HttpMethod::Post);
        assert_eq!(post.path, "/pets");

        let delete = catalog.get_operation("deletePetsPetid").unwrap();
        assert_eq!(delete.path, "/pets/{petId}");

        assert_eq!(
            catalog.document()["paths"]["/pets"]["post"]["operationId"],
            "postPets"
        );
        assert!(!catalog.get_operation("listPets").unwrap().synthesized_id);
    }

    #[test]
    fn synthesis_is_deterministic() {
        let a = synthesize_operation_id(HttpMethod::Get, "/users/{userId}/repos");
        let b = synthesize_operation_id(HttpMethod::Get, "/users/{userId}/repos");
        assert_eq!(a, "getUsersUseridRepos");
        assert_eq!(a, b);
        assert_eq!(synthesize_operation_id(HttpMethod::Get, "/"), "get");
        assert_eq!(
            synthesize_operation_id(HttpMethod::Patch, "/store/order-items"),
            "patchStoreOrderItems"
        );
    }

    #[test]
    fn colliding_synthesized_ids_get_suffixes() {
        let doc = json!({
            "openapi": "3.1.0",
            "info": { "title": "t", "version": "1" },
            "paths": {
                "/user-name": { "get": {} },
                "/user_name": { "get": {} },
                "/user/name": { "get": {} },
                "/other": { "get": { "operationId": "getUserName_2" } }
            }
        });
        let catalog = OperationCatalog::from_value(doc).unwrap();
        let ids: Vec<&str> = catalog
            .list_operations()
            .iter()
            .map(|op| op.operation_id.as_str())
            .collect();

        assert_eq!(
            ids,
            vec!["getUserName", "getUserName_3", "getUserName_4", "getUserName_2"]
        );
        let unique: HashSet<&str> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn get_operation_reports_missing_identifier() {
        let catalog = OperationCatalog::from_value(petstore()).unwrap();
        let err = catalog.get_operation("nope").unwrap_err();
        assert!(matches!(
            &err,
            OpenApiClientError::OperationNotFound { operation_id } if operation_id == "nope"
        ));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn merges_path_level_parameters_with_operation_override() {
        let doc = json!({
            "openapi": "3.0.0",
            "info": { "title": "t", "version": "1" },
            "paths": {
                "/users/{id}": {
                    "parameters": [
                        { "name": "id", "in": "path", "required": true },
                        { "name": "q", "in": "query", "required": false }
                    ],
                    "get": {
                        "operationId": "getUser",
                        "parameters": [
                            { "name": "q", "in": "query", "required": true, "description": "op-level" },
                            { "name": "X-Trace", "in": "header" },
                            { "name": "session", "in": "cookie" }
                        ]
                    }
                }
            }
        });
        let catalog = OperationCatalog::from_value(doc).unwrap();
        let op = catalog.get_operation("getUser").unwrap();

        let names: Vec<(&str, ParamLocation)> = op
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), p.location))
            .collect();
        assert_eq!(
            names,
            vec![
                ("id", ParamLocation::Path),
                ("q", ParamLocation::Query),
                ("X-Trace", ParamLocation::Header),
            ]
        );
        assert!(op.parameters[1].required);
        assert_eq!(op.parameters[1].description.as_deref(), Some("op-level"));
        assert_eq!(op.parameters[0].schema, json!({"type": "string"}));
    }

    #[test]
    fn resolves_refs_into_request_body_properties() {
        let catalog = OperationCatalog::from_value(petstore()).unwrap();
        let body = catalog
            .get_operation("postPets")
            .unwrap()
            .request_body
            .clone()
            .unwrap();

        assert_eq!(body.content_type, "application/json");
        assert!(body.required);
        assert_eq!(body.properties, vec!["name", "tag"]);
        assert_eq!(body.required_properties, vec!["name"]);
        assert_eq!(
            body.property_schema("tag"),
            Some(&json!({ "type": "string" }))
        );

        let show = catalog.get_operation("showPetById").unwrap();
        assert_eq!(show.parameters[0].name, "petId");
    }

    #[test]
    fn ignores_non_json_request_bodies() {
        let doc = json!({
            "openapi": "3.0.0",
            "info": { "title": "t", "version": "1" },
            "paths": { "/upload": { "post": {
                "operationId": "upload",
                "requestBody": { "content": { "multipart/form-data": { "schema": { "type": "object" } } } }
            } } }
        });
        let catalog = OperationCatalog::from_value(doc).unwrap();
        assert!(catalog.get_operation("upload").unwrap().request_body.is_none());
    }

    #[test]
    fn rejects_swagger_and_unknown_versions() {
        let swagger =
            json!({ "swagger": "2.0", "info": { "title": "t", "version": "1" }, "paths": {} });
        assert!(matches!(
            OperationCatalog::from_value(swagger),
            Err(OpenApiClientError::SpecVersion { found: Some(v) }) if v == "2.0"
        ));

        let declared_two =
            json!({ "openapi": "2.0", "info": { "title": "t", "version": "1" }, "paths": {} });
        assert!(matches!(
            OperationCatalog::from_value(declared_two),
            Err(OpenApiClientError::SpecVersion { .. })
        ));

        let four =
            json!({ "openapi": "4.0.0", "info": { "title": "t", "version": "1" }, "paths": {} });
        assert!(matches!(
            OperationCatalog::from_value(four),
            Err(OpenApiClientError::SpecVersion { .. })
        ));
    }

    #[test]
    fn rejects_structurally_invalid_documents() {
        let cases = [
            json!({ "openapi": "3.0.0", "info": { "title": "t", "version": "1" }, "paths": [] }),
            json!({ "openapi": "3.0.0", "paths": {} }),
            json!({ "openapi": "3.0.0", "info": { "title": "t", "version": "1" }, "paths": { "users": {} } }),
            json!({ "openapi": "3.0.0", "info": { "title": "t", "version": "1" }, "paths": { "/u": { "get": [] } } }),
            json!({ "openapi": "3.0.0", "info": { "title": "t", "version": "1" }, "paths": { "/u": { "get": { "parameters": {} } } } }),
            json!({ "openapi": "3.0.0", "info": { "title": "t", "version": "1" }, "paths": { "/u": { "get": { "parameters": [ { "name": "x", "in": "body" } ] } } } }),
            json!({ "openapi": "3.0.0", "info": { "title": "t", "version": "1" }, "servers": [ {} ], "paths": {} }),
            json!({ "openapi": "3.0.0", "info": { "title": "t", "version": "1" }, "paths": {
                "/a": { "get": { "operationId": "dup" } },
                "/b": { "get": { "operationId": "dup" } }
            } }),
        ];

        for doc in cases {
            let res = OperationCatalog::from_value(doc.clone());
            assert!(
                matches!(res, Err(OpenApiClientError::SpecValidation(_))),
                "expected validation error for {doc}"
            );
        }
    }

    #[test]
    fn from_str_reports_malformed_json_as_load_error() {
        let res = r#"{"openapi": "3.0.0", "paths": {"#.parse::<OperationCatalog>();
        assert!(matches!(res, Err(OpenApiClientError::SpecLoad { .. })));
    }

    #[tokio::test]
    async fn load_from_missing_file_is_a_load_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let res = OperationCatalog::load(&path.display().to_string(), &Client::new()).await;
        assert!(matches!(res, Err(OpenApiClientError::SpecLoad { .. })));
    }

    #[tokio::test]
    async fn load_from_yaml_file_with_external_ref() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("common.yaml"),
            r"
components:
  parameters:
    Limit:
      name: limit
      in: query
      schema:
        type: integer
",
        )
        .unwrap();
        let root = dir.path().join("api.yaml");
        fs::write(
            &root,
            r#"
openapi: "3.0.0"
info:
  title: t
  version: "1"
paths:
  /items:
    get:
      parameters:
        - $ref: "./common.yaml#/components/parameters/Limit"
"#,
        )
        .unwrap();

        let source = root.display().to_string();
        let catalog = OperationCatalog::load(&source, &Client::new()).await.unwrap();
        let op = catalog.get_operation("getItems").unwrap();
        assert_eq!(op.parameters[0].name, "limit");
        assert_eq!(op.parameters[0].location, ParamLocation::Query);
        assert_eq!(catalog.source(), Some(source.as_str()));
    }
}
