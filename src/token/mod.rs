//! Token-exchange collaborator.
//!
//! Builds the identity provider's authorization URL and exchanges an
//! authorization code for an access token. The flow controller only talks to
//! the [`TokenClient`] trait; [`HttpTokenClient`] is the reqwest-backed
//! implementation.

mod http;

pub use http::HttpTokenClient;

use crate::endpoints::ClientCredentials;
use crate::error::FlowError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// Ordered authorize-request parameters (`redirect_uri`, `state`, and the
/// optional `display` / `immediate` / `prompt` / `scope`).
pub type AuthorizeParams = Vec<(&'static str, String)>;

/// Result of a successful code-for-token exchange.
#[derive(Clone, Debug)]
pub struct AccessToken {
    pub token: String,
    pub refresh_token: Option<String>,
    /// Every other field of the token response (`instance_url`, `issued_at`, ...)
    pub params: HashMap<String, Value>,
    /// Identity URL (`.../id/{org_id}/{user_id}`)
    pub id_url: String,
}

impl AccessToken {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }

    pub fn instance_url(&self) -> Option<&str> {
        self.param("instance_url")
    }
}

/// OAuth2 client for one identity site.
///
/// `site` is a bare host (e.g. `login.salesforce.com`); credentials are those
/// of the resolved tenant.
#[async_trait]
pub trait TokenClient: Send + Sync {
    /// Authorization URL the browser is redirected to.
    fn authorize_url(
        &self,
        site: &str,
        credentials: &ClientCredentials,
        params: &AuthorizeParams,
    ) -> Result<String, FlowError>;

    /// Exchange an authorization code for a token.
    async fn exchange(
        &self,
        site: &str,
        credentials: &ClientCredentials,
        code: &str,
        redirect_uri: &str,
    ) -> Result<AccessToken, FlowError>;
}
