//! MCP tool surface: one tool per operation, calls routed through [`OpenApiClient::invoke`].

use crate::catalog::{HttpMethod, Operation, OperationCatalog};
use crate::client::OpenApiClient;
use crate::dispatch::ApiResponse;
use crate::error::Result;
use base64::Engine as _;
use mime::Mime;
use rmcp::model::{CallToolResult, Content, JsonObject, Tool, ToolAnnotations};
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// Build the MCP tool descriptor for one operation.
#[must_use]
pub fn tool_for_operation(operation: &Operation) -> Tool {
    let schema = input_schema(operation);
    let schema_obj = schema.as_object().cloned().unwrap_or_else(JsonObject::new);

    let mut tool = Tool::new(
        operation.operation_id.clone(),
        tool_description(operation),
        Arc::new(schema_obj),
    );
    tool.annotations = Some(annotations_for_method(operation.method));
    tool
}

/// Tools for every operation, in catalog order.
#[must_use]
pub fn list_tools(catalog: &OperationCatalog) -> Vec<Tool> {
    catalog
        .list_operations()
        .iter()
        .map(tool_for_operation)
        .collect()
}

/// Invoke the operation named `name` and render the response as tool output.
///
/// Non-object `arguments` are treated as no arguments. Non-2xx responses are returned with
/// `is_error` set rather than as `Err`.
///
/// # Errors
///
/// Any error from [`OpenApiClient::invoke`].
pub async fn call_tool(
    client: &OpenApiClient,
    name: &str,
    arguments: Value,
) -> Result<CallToolResult> {
    let args = match arguments {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let resp = client.invoke(name, &args).await?;
    Ok(render_response(&resp))
}

fn render_response(resp: &ApiResponse) -> CallToolResult {
    let is_error = !resp.is_success();

    let content = if let Some(mime_type) = image_mime(resp) {
        let b64 = base64::engine::general_purpose::STANDARD.encode(&resp.body);
        Content::image(b64, mime_type)
    } else if let Some(body) = resp.json() {
        let text = match &body {
            Value::String(s) => s.clone(),
            other => serde_json::to_string(other).unwrap_or_else(|_| other.to_string()),
        };
        Content::text(text)
    } else {
        Content::text(resp.text())
    };

    if is_error {
        CallToolResult::error(vec![content])
    } else {
        CallToolResult::success(vec![content])
    }
}

fn image_mime(resp: &ApiResponse) -> Option<String> {
    let m = resp.content_type()?.parse::<Mime>().ok()?;
    (m.type_() == mime::IMAGE).then(|| m.essence_str().to_string())
}

fn schema_type_label(schema: &Value) -> String {
    if schema.get("enum").is_some() {
        return "enum".to_string();
    }
    match schema.get("type") {
        Some(Value::String(t)) => t.clone(),
        // 3.1 allows a list of types.
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" | "),
        _ => "string".to_string(),
    }
}

fn tool_description(operation: &Operation) -> String {
    let summary = operation.summary.as_deref().map(str::trim).unwrap_or_default();
    let description = operation
        .description
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();

    let base = match (summary.is_empty(), description.is_empty()) {
        (false, false) => format!("{summary} - {description}"),
        (false, true) => summary.to_string(),
        (true, false) => description.to_string(),
        (true, true) => "No description available.".to_string(),
    };

    let mut lines = Vec::new();
    for p in &operation.parameters {
        lines.push(param_line(&p.name, &p.schema, p.required));
    }
    if let Some(body) = &operation.request_body {
        for name in &body.properties {
            let schema = body.property_schema(name).cloned().unwrap_or(Value::Null);
            lines.push(param_line(name, &schema, body.required_properties.contains(name)));
        }
    }

    format!("{base}\n\n**Parameters:**\n{}", lines.join("\n"))
}

fn param_line(name: &str, schema: &Value, required: bool) -> String {
    let mut line = format!("- `{name}` ({})", schema_type_label(schema));
    if !required {
        line.push_str(" (Optional)");
    }
    line
}

fn input_schema(operation: &Operation) -> Value {
    let mut properties = Map::new();
    let mut required: Vec<String> = Vec::new();

    for p in &operation.parameters {
        let mut prop = p.schema.clone();
        if let (Some(desc), Some(obj)) = (&p.description, prop.as_object_mut()) {
            obj.entry("description")
                .or_insert_with(|| Value::String(desc.clone()));
        }
        properties.insert(p.name.clone(), prop);
        if p.required {
            required.push(p.name.clone());
        }
    }

    if let Some(body) = &operation.request_body {
        for name in &body.properties {
            // A parameter of the same name wins.
            if properties.contains_key(name) {
                continue;
            }
            let prop = body
                .property_schema(name)
                .cloned()
                .unwrap_or_else(|| json!({}));
            properties.insert(name.clone(), prop);
            if body.required_properties.contains(name) {
                required.push(name.clone());
            }
        }
    }

    let mut schema = json!({
        "type": "object",
        "properties": properties,
    });
    if !required.is_empty() {
        schema["required"] = json!(required);
    }
    schema
}

/// MCP tool hints derived from HTTP method semantics.
fn annotations_for_method(method: HttpMethod) -> ToolAnnotations {
    let (read_only, destructive, idempotent) = match method {
        HttpMethod::Get | HttpMethod::Head | HttpMethod::Options | HttpMethod::Trace => {
            (Some(true), Some(false), Some(true))
        }
        HttpMethod::Post => (Some(false), Some(false), Some(false)),
        HttpMethod::Put | HttpMethod::Delete => (Some(false), Some(true), Some(true)),
        // PATCH may or may not be idempotent.
        HttpMethod::Patch => (Some(false), Some(true), None),
    };

    ToolAnnotations {
        title: None,
        read_only_hint: read_only,
        destructive_hint: destructive,
        idempotent_hint: idempotent,
        open_world_hint: Some(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use axum::Router;
    use axum::http::{StatusCode, header};
    use axum::routing::get;
    use mcp_openapi_test_support::MockServer;

    fn first_content(result: &CallToolResult) -> Value {
        let v = serde_json::to_value(result).expect("CallToolResult serializes");
        v.get("content")
            .and_then(Value::as_array)
            .and_then(|a| a.first())
            .cloned()
            .expect("content[0]")
    }

    fn catalog() -> OperationCatalog {
        OperationCatalog::from_value(json!({
            "openapi": "3.0.0",
            "info": { "title": "t", "version": "1" },
            "servers": [ { "url": "http://unused.invalid" } ],
            "paths": {
                "/users/{id}": {
                    "put": {
                        "operationId": "updateUser",
                        "summary": "Update a user",
                        "description": "Replaces the user record.",
                        "parameters": [
                            { "name": "id", "in": "path", "required": true, "schema": { "type": "integer" } },
                            { "name": "dryRun", "in": "query", "schema": { "type": "boolean" } }
                        ],
                        "requestBody": { "content": { "application/json": { "schema": {
                            "type": "object",
                            "required": ["name"],
                            "properties": {
                                "name": { "type": "string" },
                                "role": { "enum": ["admin", "member"] }
                            }
                        } } } }
                    }
                },
                "/health": { "get": {} },
                "/logo": { "get": { "operationId": "logo", "description": "Logo image" } },
                "/fail": { "get": { "operationId": "fail" } }
            }
        }))
        .unwrap()
    }

    #[test]
    fn description_lists_parameters_and_body_properties() {
        let catalog = catalog();
        let tool = tool_for_operation(catalog.get_operation("updateUser").unwrap());

        assert_eq!(tool.name, "updateUser");
        assert_eq!(
            tool.description.as_deref(),
            Some(
                "Update a user - Replaces the user record.\n\n**Parameters:**\n\
                 - `id` (integer)\n\
                 - `dryRun` (boolean) (Optional)\n\
                 - `name` (string)\n\
                 - `role` (enum) (Optional)"
            )
        );
    }

    #[test]
    fn description_falls_back_when_operation_has_no_text() {
        let catalog = catalog();
        let tool = tool_for_operation(catalog.get_operation("getHealth").unwrap());
        assert_eq!(
            tool.description.as_deref(),
            Some("No description available.\n\n**Parameters:**\n")
        );
    }

    #[test]
    fn input_schema_covers_parameters_and_body() {
        let catalog = catalog();
        let tool = tool_for_operation(catalog.get_operation("updateUser").unwrap());
        let schema = Value::Object((*tool.input_schema).clone());

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["id"], json!({ "type": "integer" }));
        assert_eq!(schema["properties"]["role"], json!({ "enum": ["admin", "member"] }));
        assert_eq!(schema["required"], json!(["id", "name"]));

        let annotations = tool.annotations.unwrap();
        assert_eq!(annotations.destructive_hint, Some(true));
        assert_eq!(annotations.idempotent_hint, Some(true));
    }

    #[test]
    fn list_tools_follows_catalog_order() {
        let names: Vec<String> = list_tools(&catalog())
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        assert_eq!(names, vec!["updateUser", "getHealth", "logo", "fail"]);
    }

    #[tokio::test]
    async fn call_tool_renders_json_image_and_errors() {
        let app = Router::new()
            .route("/health", get(|| async { axum::Json(json!({ "ok": true })) }))
            .route(
                "/logo",
                get(|| async { ([(header::CONTENT_TYPE, "image/png")], vec![0u8, 1, 2, 3]) }),
            )
            .route(
                "/fail",
                get(|| async { (StatusCode::NOT_FOUND, "no such thing") }),
            );
        let server = MockServer::start(app).await.unwrap();

        let config = ClientConfig {
            base_url: Some(server.base_url()),
            ..ClientConfig::new("unused")
        };
        let client = OpenApiClient::new(catalog(), &config).unwrap();

        let ok = call_tool(&client, "getHealth", Value::Null).await.unwrap();
        assert_eq!(ok.is_error, Some(false));
        assert_eq!(first_content(&ok)["text"], r#"{"ok":true}"#);

        let img = call_tool(&client, "logo", json!({})).await.unwrap();
        let first = first_content(&img);
        assert_eq!(first["type"], "image");
        assert_eq!(first["mimeType"], "image/png");
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(first["data"].as_str().expect("content[0].data"))
            .expect("base64");
        assert_eq!(decoded, vec![0x00, 0x01, 0x02, 0x03]);

        let failed = call_tool(&client, "fail", json!({})).await.unwrap();
        assert_eq!(failed.is_error, Some(true));
        assert_eq!(first_content(&failed)["text"], "no such thing");

        assert!(call_tool(&client, "missing", json!({})).await.is_err());
        server.shutdown().await.unwrap();
    }
}
