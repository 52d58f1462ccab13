use serde::Deserialize;

/// Static authorize-request parameters and their per-request override switches.
///
/// When an override switch is on, a same-named query parameter on the
/// authorize request replaces the static value. `prompt` and `scope` overrides
/// take the space-joined union of every repeated occurrence.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizeConfig {
    #[serde(default)]
    pub display: Option<String>,
    #[serde(default)]
    pub immediate: Option<bool>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub display_override: bool,
    #[serde(default)]
    pub immediate_override: bool,
    #[serde(default)]
    pub prompt_override: bool,
    #[serde(default)]
    pub scope_override: bool,
}

/// Identity provider URL layout used by the HTTP token client.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Scheme used to reach the tenant site
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default = "default_authorize_path")]
    pub authorize_path: String,
    #[serde(default = "default_token_path")]
    pub token_path: String,
    /// Token exchange request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_authorize_path() -> String {
    "/services/oauth2/authorize".to_string()
}

fn default_token_path() -> String {
    "/services/oauth2/token".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            authorize_path: default_authorize_path(),
            token_path: default_token_path(),
            timeout_secs: default_timeout_secs(),
        }
    }
}
