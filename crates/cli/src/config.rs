use anyhow::Context as _;
use mcp_openapi_client::config::parse_headers_json;
use mcp_openapi_client::{ClientConfig, OAuth2Config};
use std::path::Path;

/// Values given on the command line (or via env). `None` leaves the config file value alone.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub spec: Option<String>,
    pub headers: Option<String>,
    pub oauth2_client_id: Option<String>,
    pub oauth2_client_secret: Option<String>,
    pub oauth2_token_url: Option<String>,
    pub oauth2_scopes: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub strict_required: bool,
}

/// Read a client config file. `.yaml`/`.yml` files are parsed as YAML, everything else as JSON.
pub fn load_config_file(path: &Path) -> anyhow::Result<ClientConfig> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;

    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

    let cfg = if is_yaml {
        serde_yaml::from_str(&text).with_context(|| format!("parse {}", path.display()))?
    } else {
        serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))?
    };
    Ok(cfg)
}

/// Apply command-line values on top of `cfg`.
pub fn apply_overrides(mut cfg: ClientConfig, o: Overrides) -> anyhow::Result<ClientConfig> {
    if let Some(spec) = o.spec {
        cfg.spec = spec;
    }
    if let Some(headers) = o.headers {
        // Flags extend file headers; same names are replaced.
        cfg.headers.extend(parse_headers_json(&headers)?);
    }
    if let Some(base_url) = o.base_url {
        cfg.base_url = Some(base_url);
    }
    if let Some(secs) = o.timeout_secs {
        cfg.timeout_secs = secs;
    }
    cfg.strict_required |= o.strict_required;

    let oauth2_given = o.oauth2_client_id.is_some()
        || o.oauth2_client_secret.is_some()
        || o.oauth2_token_url.is_some()
        || o.oauth2_scopes.is_some();
    if oauth2_given {
        let oauth2 = cfg.oauth2.get_or_insert_with(OAuth2Config::default);
        if o.oauth2_client_id.is_some() {
            oauth2.client_id = o.oauth2_client_id;
        }
        if o.oauth2_client_secret.is_some() {
            oauth2.client_secret = o.oauth2_client_secret;
        }
        if o.oauth2_token_url.is_some() {
            oauth2.token_url = o.oauth2_token_url;
        }
        if o.oauth2_scopes.is_some() {
            oauth2.scopes = o.oauth2_scopes;
        }
    }

    if cfg.spec.trim().is_empty() {
        anyhow::bail!("no OpenAPI spec given (use --openapi, OPENAPI_SPEC, or `spec` in --config)");
    }
    Ok(cfg)
}
