//! `GET {prefix}`: redirect the browser to the identity provider.

use super::{redirect, FlowRequest, WebFlow};
use crate::config::AuthorizeConfig;
use crate::error::FlowError;
use crate::token::AuthorizeParams;
use crate::urls::{canonicalize_tenant_hint, encode_state, repeated_param, sanitize_host};
use axum::response::Response;
use tracing::{debug, info};

pub(super) fn handle(flow: &WebFlow, req: &FlowRequest) -> Result<Response, FlowError> {
    let debugging = flow.settings.debugging;
    if debugging {
        debug!(url = %req.url, "Authorize phase");
    }

    let endpoint = flow.registry.resolve(req.query.get_nonblank("endpoint"));
    let mydomain = req
        .query
        .get_nonblank("mydomain")
        .and_then(|hint| canonicalize_tenant_hint(hint, &flow.settings.mydomain_suffix));

    let site = match mydomain.clone() {
        Some(site) => site,
        None => sanitize_host(endpoint.tenant.as_str())
            .ok_or_else(|| FlowError::UnresolvedTenant(endpoint.tenant.to_string()))?,
    };

    let destination = req.query.get_nonblank("state").unwrap_or("/");
    let state = encode_state(destination, &endpoint.tenant);

    let mut params: AuthorizeParams = vec![
        ("redirect_uri", flow.settings.redirect_uri(req)),
        ("state", state.clone()),
    ];
    params.extend(optional_params(&flow.settings.authorize, req));

    let location = flow
        .token_client
        .authorize_url(&site, &endpoint.credentials, &params)?;

    if debugging {
        debug!(
            endpoint = %endpoint.tenant,
            mydomain = ?mydomain,
            state = %state,
            location = %location,
            "Redirecting to authorize endpoint"
        );
    }
    info!(endpoint = %endpoint.tenant, site = %site, "Starting OAuth authorization");

    redirect(&location)
}

/// `display`, `immediate`, `prompt` and `scope`: static values, replaced by
/// request values where the matching override switch is on.
fn optional_params(config: &AuthorizeConfig, req: &FlowRequest) -> AuthorizeParams {
    let display = single_override(config.display_override, req, "display")
        .or_else(|| config.display.clone());
    let immediate = single_override(config.immediate_override, req, "immediate")
        .or_else(|| config.immediate.map(|immediate| immediate.to_string()));
    let prompt = repeated_override(config.prompt_override, req, "prompt")
        .or_else(|| config.prompt.clone());
    let scope = repeated_override(config.scope_override, req, "scope")
        .or_else(|| config.scope.clone().filter(|scope| !scope.trim().is_empty()));

    [
        ("display", display),
        ("immediate", immediate),
        ("prompt", prompt),
        ("scope", scope),
    ]
    .into_iter()
    .filter_map(|(name, value)| value.map(|value| (name, value)))
    .collect()
}

fn single_override(enabled: bool, req: &FlowRequest, name: &str) -> Option<String> {
    if !enabled {
        return None;
    }
    req.param(name).map(str::to_string)
}

/// Union of every occurrence, space-joined. Blank results do not override.
fn repeated_override(enabled: bool, req: &FlowRequest, name: &str) -> Option<String> {
    if !enabled {
        return None;
    }
    let joined = repeated_param(&req.url, name)?.join(" ");
    if joined.trim().is_empty() {
        None
    } else {
        Some(joined)
    }
}
