use crate::routes::RouteNode;
use directories::BaseDirs;
use reqwest::StatusCode;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const DEFAULT_CHAT_PATH: &str = "/api/v1/assistant/chat/streaming";
const DEFAULT_MULTIPART_PATH: &str = "/api/v1/assistant/chat/streaming/mp";
const DEFAULT_DIRECTORY_PATH: &str = "/api/v1/assistants";
const DEFAULT_SESSION_EXPIRED_STATUS: u16 = 499;
const DEFAULT_REDIRECT_KEY: &str = "nav";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Resolved client settings with every endpoint parsed.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub backend_url: Url,
    pub auth_url: Url,
    pub directory_url: Url,
    pub chat_url: Url,
    pub multipart_url: Url,
    pub session_expired_status: StatusCode,
    pub redirect_key: String,
    pub request_timeout: Duration,
    pub routes: Vec<RouteNode>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Courier not configured: create courier.yaml with backend and auth URLs.")]
    Missing,
    #[error("Courier configuration invalid: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Missing => {
                "Courier not configured: create courier.yaml with backend and auth URLs.".to_string()
            }
            Self::Invalid(detail) => format!("Courier not configured: {detail}. Update courier.yaml."),
        }
    }
}

impl ClientSettings {
    /// Settings for a backend and auth entry point with every other value defaulted.
    pub fn new(backend_url: &str, auth_url: &str) -> Result<Self, ConfigError> {
        resolve_client_section(ClientSection {
            backend_url: backend_url.to_string(),
            auth_url: auth_url.to_string(),
            ..ClientSection::default()
        })
    }

    /// Load `courier.yaml` from the first candidate location, then apply
    /// `COURIER_*` environment overrides (a `.env` file is honoured).
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let path = locate_config_file().ok_or(ConfigError::Missing)?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            ConfigError::Invalid(format!("failed to read {}: {err}", path.display()))
        })?;
        let mut section = parse_client_section(&contents)?;
        apply_env_overrides(&mut section, |key| std::env::var(key).ok());
        resolve_client_section(section)
    }

    pub fn with_routes(mut self, routes: Vec<RouteNode>) -> Self {
        self.routes = routes;
        self
    }
}

fn parse_client_section(contents: &str) -> Result<ClientSection, ConfigError> {
    let config: CourierConfig = serde_yaml::from_str(contents)
        .map_err(|err| ConfigError::Invalid(format!("invalid courier.yaml: {err}")))?;
    config
        .client
        .ok_or_else(|| ConfigError::Invalid("missing `client` section".to_string()))
}

fn apply_env_overrides(section: &mut ClientSection, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(value) = lookup("COURIER_BACKEND_URL") {
        section.backend_url = value;
    }
    if let Some(value) = lookup("COURIER_AUTH_URL") {
        section.auth_url = value;
    }
    if let Some(value) = lookup("COURIER_DIRECTORY_URL") {
        section.directory_url = Some(value);
    }
}

fn resolve_client_section(section: ClientSection) -> Result<ClientSettings, ConfigError> {
    let backend_url = parse_url("backend_url", &section.backend_url)?;
    let auth_url = parse_url("auth_url", &section.auth_url)?;
    let directory_url = match section.directory_url.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => parse_url("directory_url", value)?,
        _ => join_url(&backend_url, DEFAULT_DIRECTORY_PATH)?,
    };
    let chat_url = join_url(
        &backend_url,
        section.chat_path.as_deref().unwrap_or(DEFAULT_CHAT_PATH),
    )?;
    let multipart_url = join_url(
        &backend_url,
        section
            .multipart_path
            .as_deref()
            .unwrap_or(DEFAULT_MULTIPART_PATH),
    )?;

    let raw_status = section
        .session_expired_status
        .unwrap_or(DEFAULT_SESSION_EXPIRED_STATUS);
    let session_expired_status = StatusCode::from_u16(raw_status)
        .ok()
        .filter(|status| status.is_client_error() || status.is_server_error())
        .ok_or_else(|| {
            ConfigError::Invalid(format!(
                "session_expired_status {raw_status} is not an HTTP error status"
            ))
        })?;

    let redirect_key = section
        .redirect_key
        .map(|key| key.trim().to_string())
        .unwrap_or_else(|| DEFAULT_REDIRECT_KEY.to_string());
    if redirect_key.is_empty() || redirect_key.contains(&['=', ';'][..]) {
        return Err(ConfigError::Invalid(format!(
            "redirect_key `{redirect_key}` must be a non-empty cookie name"
        )));
    }

    Ok(ClientSettings {
        backend_url,
        auth_url,
        directory_url,
        chat_url,
        multipart_url,
        session_expired_status,
        redirect_key,
        request_timeout: Duration::from_secs(
            section.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        ),
        routes: section.routes,
    })
}

fn parse_url(field: &str, value: &str) -> Result<Url, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("missing {field} in courier.yaml")));
    }
    Url::parse(trimmed).map_err(|err| ConfigError::Invalid(format!("{field} `{trimmed}`: {err}")))
}

// Endpoint paths are always relative to the backend's own path prefix.
fn join_url(base: &Url, path: &str) -> Result<Url, ConfigError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let prefixed = format!("{}/", base.path());
        base.set_path(&prefixed);
    }
    base.join(path.trim_start_matches('/'))
        .map_err(|err| ConfigError::Invalid(format!("cannot join `{path}` onto {base}: {err}")))
}

fn locate_config_file() -> Option<PathBuf> {
    courier_yaml_candidates()
        .into_iter()
        .find(|path| path.exists())
}

fn courier_yaml_candidates() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(base) = BaseDirs::new() {
        let config_dir = base.config_dir().join("courier");
        paths.push(config_dir.join("courier.yaml"));
        paths.push(config_dir.join("courier.yml"));
        let home_dir = base.home_dir();
        paths.push(home_dir.join(".courier").join("courier.yaml"));
        paths.push(home_dir.join(".courier").join("courier.yml"));
    }
    paths.push(PathBuf::from("courier.yaml"));
    paths.push(PathBuf::from("courier.yml"));
    paths
}

#[derive(Debug, Deserialize)]
struct CourierConfig {
    client: Option<ClientSection>,
}

#[derive(Debug, Default, Deserialize)]
struct ClientSection {
    #[serde(default)]
    backend_url: String,
    #[serde(default)]
    auth_url: String,
    directory_url: Option<String>,
    chat_path: Option<String>,
    multipart_path: Option<String>,
    session_expired_status: Option<u16>,
    redirect_key: Option<String>,
    request_timeout_secs: Option<u64>,
    #[serde(default)]
    routes: Vec<RouteNode>,
}
