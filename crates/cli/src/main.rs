mod config;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use config::{Overrides, apply_overrides, load_config_file};
use mcp_openapi_client::tools::list_tools;
use mcp_openapi_client::{ClientConfig, OpenApiClient, OperationCatalog};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "mcp-openapi",
    version,
    about = "Invoke operations of an OpenAPI-described HTTP API by operationId"
)]
struct Cli {
    /// `OpenAPI` spec location (file path or URL).
    #[arg(long, env = "OPENAPI_SPEC", global = true)]
    openapi: Option<String>,

    /// Client config file (JSON, or YAML with a `.yaml`/`.yml` extension).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Static headers as a JSON object, e.g. '{"X-Api-Key": "abc"}'.
    #[arg(long, env = "OPENAPI_HEADERS", global = true)]
    headers: Option<String>,

    #[arg(long, env = "OAUTH2_CLIENT_ID", global = true)]
    oauth2_client_id: Option<String>,

    #[arg(long, env = "OAUTH2_CLIENT_SECRET", global = true, hide_env_values = true)]
    oauth2_client_secret: Option<String>,

    #[arg(long, env = "OAUTH2_TOKEN_URL", global = true)]
    oauth2_token_url: Option<String>,

    /// Space-delimited OAuth2 scopes.
    #[arg(long, env = "OAUTH2_SCOPES", global = true)]
    oauth2_scopes: Option<String>,

    /// Override the base URL taken from the spec's first server.
    #[arg(long, env = "OPENAPI_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Outbound request timeout in seconds.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Fail locally when a required parameter is missing.
    #[arg(long, global = true)]
    strict_required: bool,

    /// Log filter (e.g. `debug`, `mcp_openapi_client=trace`). Defaults to `RUST_LOG`, then `warn`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List operations: id, method, route, summary.
    List,
    /// Print the MCP tool descriptors as JSON.
    Tools,
    /// Invoke one operation and print the response body.
    Call {
        operation_id: String,
        /// Arguments as a JSON object.
        #[arg(long, default_value = "{}")]
        args: String,
    },
}

fn init_tracing(level: Option<&str>, format: LogFormat) -> anyhow::Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).context("invalid --log-level")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

fn client_config(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let base = match &cli.config {
        Some(path) => load_config_file(path)?,
        None => ClientConfig::new(""),
    };
    apply_overrides(
        base,
        Overrides {
            spec: cli.openapi.clone(),
            headers: cli.headers.clone(),
            oauth2_client_id: cli.oauth2_client_id.clone(),
            oauth2_client_secret: cli.oauth2_client_secret.clone(),
            oauth2_token_url: cli.oauth2_token_url.clone(),
            oauth2_scopes: cli.oauth2_scopes.clone(),
            base_url: cli.base_url.clone(),
            timeout_secs: cli.timeout_secs,
            strict_required: cli.strict_required,
        },
    )
}

fn print_operations(catalog: &OperationCatalog) {
    let width = catalog
        .list_operations()
        .iter()
        .map(|op| op.operation_id.len())
        .max()
        .unwrap_or(0);

    for op in catalog.list_operations() {
        let line = format!(
            "{:<width$}  {:<7}  {}  {}",
            op.operation_id,
            op.method.to_string(),
            op.path,
            op.summary.as_deref().unwrap_or_default()
        );
        println!("{}", line.trim_end());
    }
}

fn parse_args(text: &str) -> anyhow::Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(text).context("--args must be valid JSON")? {
        Value::Object(map) => Ok(map),
        _ => anyhow::bail!("--args must be a JSON object"),
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let cfg = client_config(&cli)?;

    match cli.command {
        Command::List => {
            let catalog = OpenApiClient::load_catalog(&cfg).await?;
            print_operations(&catalog);
        }
        Command::Tools => {
            let catalog = OpenApiClient::load_catalog(&cfg).await?;
            let tools = list_tools(&catalog);
            println!(
                "{}",
                serde_json::to_string_pretty(&tools).context("serialize tools")?
            );
        }
        Command::Call { operation_id, args } => {
            let args = parse_args(&args)?;
            let client = OpenApiClient::connect(&cfg).await?;
            let resp = client
                .invoke(&operation_id, &args)
                .await
                .with_context(|| format!("invoke {operation_id}"))?;

            eprintln!("{}", resp.status);
            match resp.json() {
                Some(body) => println!(
                    "{}",
                    serde_json::to_string_pretty(&body).context("serialize response")?
                ),
                None => print!("{}", resp.text()),
            }

            if !resp.is_success() {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref(), cli.log_format)?;
    run(cli).await
}
