//! reqwest-backed OAuth2 client.

use super::{AccessToken, AuthorizeParams, TokenClient};
use crate::config::ProviderConfig;
use crate::endpoints::ClientCredentials;
use crate::error::FlowError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;
use url::Url;

/// OAuth2 web-server flow client talking to `{scheme}://{site}{path}`.
#[derive(Clone, Debug)]
pub struct HttpTokenClient {
    http: reqwest::Client,
    scheme: String,
    authorize_path: String,
    token_path: String,
}

impl HttpTokenClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, FlowError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs.min(5).max(1)))
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| FlowError::Config(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            http,
            scheme: config.scheme.clone(),
            authorize_path: config.authorize_path.clone(),
            token_path: config.token_path.clone(),
        })
    }

    fn endpoint_url(&self, site: &str, path: &str) -> Result<Url, FlowError> {
        Ok(Url::parse(&format!("{}://{}{}", self.scheme, site, path))?)
    }
}

#[async_trait]
impl TokenClient for HttpTokenClient {
    fn authorize_url(
        &self,
        site: &str,
        credentials: &ClientCredentials,
        params: &AuthorizeParams,
    ) -> Result<String, FlowError> {
        let mut url = self.endpoint_url(site, &self.authorize_path)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &credentials.client_id);
            for (name, value) in params {
                query.append_pair(name, value);
            }
        }
        Ok(url.to_string())
    }

    async fn exchange(
        &self,
        site: &str,
        credentials: &ClientCredentials,
        code: &str,
        redirect_uri: &str,
    ) -> Result<AccessToken, FlowError> {
        let token_url = self.endpoint_url(site, &self.token_path)?;
        tracing::debug!(token_url = %token_url, "Exchanging authorization code for token");

        let response = self
            .http
            .post(token_url)
            .header("Accept", "application/json")
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(FlowError::Exchange(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let body: Map<String, Value> = response
            .json()
            .await
            .map_err(|e| FlowError::Exchange(format!("malformed token response: {}", e)))?;

        parse_token_response(body)
    }
}

fn parse_token_response(mut body: Map<String, Value>) -> Result<AccessToken, FlowError> {
    let token = match body.remove("access_token") {
        Some(Value::String(token)) if !token.is_empty() => token,
        _ => {
            return Err(FlowError::Exchange(
                "token response missing access_token".to_string(),
            ))
        }
    };
    let refresh_token = match body.remove("refresh_token") {
        Some(Value::String(refresh)) if !refresh.is_empty() => Some(refresh),
        _ => None,
    };
    let id_url = body
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    tracing::debug!(
        has_refresh_token = refresh_token.is_some(),
        has_identity_url = !id_url.is_empty(),
        "Token exchange successful"
    );

    Ok(AccessToken {
        token,
        refresh_token,
        params: body.into_iter().collect(),
        id_url,
    })
}
