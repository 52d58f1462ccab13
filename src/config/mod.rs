pub mod authorize;
pub use authorize::{AuthorizeConfig, ProviderConfig};

use crate::endpoints::RawEndpoints;
use anyhow::{Context, Result};
use serde::Deserialize;

/// Environment variable overriding the externally visible origin
/// (scheme + host) used to build the OAuth `redirect_uri`.
pub const ORIGIN_ENV: &str = "ORIGIN";

pub const DEFAULT_PATH_PREFIX: &str = "/auth/salesforce";
pub const DEFAULT_API_VERSION: &str = "25.0";
pub const DEFAULT_MYDOMAIN_SUFFIX: &str = ".my.salesforce.com";

/// Complete web-flow configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WebFlowConfig {
    /// Tenant identifier -> client credential pair, in file order
    #[serde(default)]
    pub endpoints: RawEndpoints,
    /// Key for session encryption (at least 16 bytes)
    #[serde(default)]
    pub token_encryption_key: String,
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,
    /// Stamped onto every credential loaded from the session
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Emit per-phase flow details at DEBUG
    #[serde(default)]
    pub debugging: bool,
    /// Canonical suffix appended to `mydomain` hints
    #[serde(default = "default_mydomain_suffix")]
    pub mydomain_suffix: String,
    /// External origin; the `ORIGIN` env var is consulted when unset
    #[serde(default)]
    pub origin: Option<String>,
    /// Listen address for the demo server
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub authorize: AuthorizeConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
}

fn default_path_prefix() -> String {
    DEFAULT_PATH_PREFIX.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_mydomain_suffix() -> String {
    DEFAULT_MYDOMAIN_SUFFIX.to_string()
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

impl Default for WebFlowConfig {
    fn default() -> Self {
        Self {
            endpoints: RawEndpoints::default(),
            token_encryption_key: String::new(),
            path_prefix: default_path_prefix(),
            api_version: default_api_version(),
            debugging: false,
            mydomain_suffix: default_mydomain_suffix(),
            origin: None,
            bind: default_bind(),
            authorize: AuthorizeConfig::default(),
            provider: ProviderConfig::default(),
        }
    }
}

impl WebFlowConfig {
    /// Path prefix with blank values replaced by the default and any
    /// trailing slash removed.
    pub fn normalized_path_prefix(&self) -> String {
        let trimmed = self.path_prefix.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return default_path_prefix();
        }
        if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{}", trimmed)
        }
    }

    /// Configured origin, falling back to the `ORIGIN` env var.
    pub fn resolved_origin(&self) -> Option<String> {
        self.origin
            .clone()
            .or_else(|| std::env::var(ORIGIN_ENV).ok())
            .map(|origin| origin.trim().trim_end_matches('/').to_string())
            .filter(|origin| !origin.is_empty())
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<WebFlowConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path))?;
    let config: WebFlowConfig =
        toml::from_str(&contents).with_context(|| format!("Failed to parse config file {}", path))?;
    Ok(config)
}
