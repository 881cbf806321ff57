use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::NodeError;

const ENV_URL: &str = "BUSINESSMAP_URL";
const ENV_API_KEY: &str = "BUSINESSMAP_API_KEY";
const DEFAULT_BIND: &str = "127.0.0.1:8787";

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    pub credentials: Option<CredentialConfig>,
    pub webhook: Option<WebhookConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct CredentialConfig {
    #[serde(default)]
    pub subdomain: String,
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebhookConfig {
    /// Public address Businessmap should deliver events to.
    pub public_url: String,
    pub board_id: u64,
    #[serde(default = "default_true")]
    pub authenticate: bool,
    #[serde(default = "default_events")]
    pub events: Vec<String>,
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_true() -> bool {
    true
}

fn default_events() -> Vec<String> {
    vec!["All".to_string()]
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Account URL and API key used for every outgoing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub subdomain: String,
    pub api_key: String,
}

impl Credential {
    pub fn new(subdomain: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            subdomain: subdomain.into(),
            api_key: api_key.into(),
        }
    }

    /// Account URL without a trailing slash.
    pub fn origin(&self) -> &str {
        self.subdomain.trim_end_matches('/')
    }

    pub fn api_base(&self) -> String {
        format!("{}/api/v2", self.origin())
    }

    /// The file upload endpoint lives outside the versioned API.
    pub fn upload_url(&self) -> String {
        format!("{}/files", self.origin())
    }
}

impl AppConfig {
    pub fn credential(&self) -> Result<Credential, NodeError> {
        let creds = self.credentials.clone().unwrap_or_default();
        if creds.subdomain.trim().is_empty() {
            return Err(NodeError::Config(format!(
                "Businessmap URL is not configured. Set credentials.subdomain or {ENV_URL}."
            )));
        }
        if creds.api_key.trim().is_empty() {
            return Err(NodeError::Config(format!(
                "Businessmap API key is not configured. Set credentials.api_key or {ENV_API_KEY}."
            )));
        }
        Ok(Credential::new(creds.subdomain.trim(), creds.api_key.trim()))
    }

    pub fn apply_overrides(&mut self, url: Option<String>, api_key: Option<String>) {
        let url = url.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let api_key = api_key
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        if url.is_none() && api_key.is_none() {
            return;
        }
        let creds = self.credentials.get_or_insert_with(CredentialConfig::default);
        if let Some(url) = url {
            creds.subdomain = url;
        }
        if let Some(api_key) = api_key {
            creds.api_key = api_key;
        }
    }
}

pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".businessmap")
}

fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}

pub fn load_config() -> Result<AppConfig> {
    let mut config = load_config_from(&config_path())?;
    config.apply_overrides(std::env::var(ENV_URL).ok(), std::env::var(ENV_API_KEY).ok());
    Ok(config)
}

pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: AppConfig =
        toml::from_str(&contents).with_context(|| "Failed to parse config.toml")?;
    Ok(config)
}
