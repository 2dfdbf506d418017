use anyhow::Context as _;
use axum::Router;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::routing::{any, get};
use mcp_openapi_test_support::MockServer;
use serde_json::{Value, json};
use std::path::Path;
use std::process::{Command, Output};

fn write_spec(dir: &Path, server_url: &str) -> String {
    let spec = json!({
        "openapi": "3.0.3",
        "info": { "title": "Widgets", "version": "1" },
        "servers": [ { "url": server_url } ],
        "paths": {
            "/widgets": {
                "get": { "operationId": "listWidgets", "summary": "List widgets" }
            },
            "/widgets/{id}": {
                "get": {
                    "parameters": [ { "name": "id", "in": "path", "required": true } ]
                }
            },
            "/broken": { "get": { "operationId": "broken" } }
        }
    });
    let path = dir.join("openapi.json");
    std::fs::write(&path, spec.to_string()).unwrap();
    path.display().to_string()
}

async fn run_cli(args: Vec<String>) -> anyhow::Result<Output> {
    let bin = env!("CARGO_BIN_EXE_mcp-openapi");
    tokio::task::spawn_blocking(move || {
        Command::new(bin)
            .args(&args)
            .env_remove("OPENAPI_SPEC")
            .env_remove("RUST_LOG")
            .output()
            .context("run mcp-openapi")
    })
    .await?
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

#[tokio::test]
async fn list_prints_one_line_per_operation() {
    let dir = tempfile::tempdir().unwrap();
    let spec = write_spec(dir.path(), "http://127.0.0.1:9");

    let out = run_cli(vec!["--openapi".into(), spec, "list".into()])
        .await
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let text = stdout(&out);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("listWidgets"));
    assert!(lines[0].contains("GET"));
    assert!(lines[0].ends_with("/widgets  List widgets"));
    assert!(lines[1].starts_with("getWidgetsId"));
}

#[tokio::test]
async fn list_and_tools_work_without_servers() {
    let dir = tempfile::tempdir().unwrap();
    let spec = write_spec(dir.path(), "unused");
    let mut doc: Value = serde_json::from_str(&std::fs::read_to_string(&spec).unwrap()).unwrap();
    doc.as_object_mut().unwrap().remove("servers");
    std::fs::write(&spec, doc.to_string()).unwrap();

    let out = run_cli(vec!["--openapi".into(), spec.clone(), "list".into()])
        .await
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(stdout(&out).lines().count(), 3);

    let out = run_cli(vec!["--openapi".into(), spec.clone(), "tools".into()])
        .await
        .unwrap();
    assert!(out.status.success());

    let out = run_cli(vec!["--openapi".into(), spec, "call".into(), "listWidgets".into()])
        .await
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("base URL override"));
}

#[tokio::test]
async fn tools_prints_descriptors_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let spec = write_spec(dir.path(), "http://127.0.0.1:9");

    let out = run_cli(vec!["--openapi".into(), spec, "tools".into()])
        .await
        .unwrap();
    assert!(out.status.success());

    let tools: Value = serde_json::from_slice(&out.stdout).unwrap();
    let names: Vec<&str> = tools
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["name"].as_str())
        .collect();
    assert_eq!(names, vec!["listWidgets", "getWidgetsId", "broken"]);
}

#[tokio::test]
async fn call_prints_body_and_reflects_status() {
    async fn widget(uri: Uri, headers: HeaderMap) -> axum::Json<Value> {
        axum::Json(json!({
            "path": uri.path(),
            "key": headers.get("x-api-key").and_then(|v| v.to_str().ok()),
        }))
    }

    let app = Router::new()
        .route("/widgets/{id}", get(widget))
        .route("/broken", any(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }));
    let server = MockServer::start(app).await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let spec = write_spec(dir.path(), &server.base_url());

    let out = run_cli(vec![
        "--openapi".into(),
        spec.clone(),
        "--headers".into(),
        r#"{"X-Api-Key": "k"}"#.into(),
        "call".into(),
        "getWidgetsId".into(),
        "--args".into(),
        r#"{"id": 9}"#.into(),
    ])
    .await
    .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let body: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(body, json!({ "path": "/widgets/9", "key": "k" }));

    let out = run_cli(vec!["--openapi".into(), spec, "call".into(), "broken".into()])
        .await
        .unwrap();
    assert!(!out.status.success());
    assert_eq!(stdout(&out), "upstream down");
    assert!(String::from_utf8_lossy(&out.stderr).contains("502"));
}

#[tokio::test]
async fn unknown_operation_fails() {
    let dir = tempfile::tempdir().unwrap();
    let spec = write_spec(dir.path(), "http://127.0.0.1:9");

    let out = run_cli(vec!["--openapi".into(), spec, "call".into(), "nope".into()])
        .await
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("nope"));
}

#[tokio::test]
async fn missing_spec_is_reported() {
    let out = run_cli(vec!["list".into()]).await.unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("--openapi"));
}
