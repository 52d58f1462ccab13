//! `GET {prefix}/callback`: exchange the authorization code and store the
//! resulting credential in the session.

use super::{redirect, FlowRequest, WebFlow};
use crate::credential::CredentialRecord;
use crate::error::FlowError;
use crate::session::Session;
use crate::urls::{decode_state, sanitize_host};
use axum::response::Response;
use tracing::{debug, info, warn};
use url::Url;

pub(super) async fn handle(
    flow: &WebFlow,
    req: &FlowRequest,
    session: &Session,
) -> Result<Response, FlowError> {
    let debugging = flow.settings.debugging;
    if debugging {
        debug!(url = %req.url, "Callback phase");
    }

    if let Some(error) = req.query.get_nonblank("error") {
        return Err(FlowError::Provider {
            error: error.to_string(),
            description: req.param("error_description").unwrap_or_default().to_string(),
        });
    }

    let state = decode_state(req.query.get_nonblank("state").unwrap_or("/"));
    let tenant = state
        .tenant
        .as_ref()
        .ok_or_else(|| FlowError::UnresolvedTenant("state carries no endpoint".to_string()))?;
    let endpoint = flow
        .registry
        .lookup(tenant.as_str())
        .ok_or_else(|| FlowError::UnresolvedTenant(tenant.to_string()))?;
    let site = sanitize_host(endpoint.tenant.as_str())
        .ok_or_else(|| FlowError::UnresolvedTenant(endpoint.tenant.to_string()))?;

    let code = req
        .query
        .get_nonblank("code")
        .ok_or_else(|| FlowError::Exchange("callback carries no authorization code".to_string()))?;

    if debugging {
        debug!(
            endpoint = %endpoint.tenant,
            destination = %state.destination,
            "Retrieving token"
        );
    }

    let redirect_uri = flow.settings.redirect_uri(req);
    let token = flow
        .token_client
        .exchange(&site, &endpoint.credentials, code, &redirect_uri)
        .await?;

    let record = CredentialRecord::from_token(&token, endpoint.tenant.clone());
    info!(
        endpoint = %endpoint.tenant,
        org_id = ?record.org_id,
        user_id = ?record.user_id,
        "OAuth login completed"
    );
    flow.save(session, record);

    redirect(&safe_destination(&state.destination, &req.host))
}

/// Keep the destination when it resolves to this site, `/` otherwise.
///
/// The destination is resolved against the external host the way a browser
/// would, so backslashes and embedded tabs cannot smuggle in another host.
fn safe_destination(destination: &str, external_host: &str) -> String {
    let Ok(base) = Url::parse(external_host) else {
        warn!(host = %external_host, "Unparsable external host, redirecting to /");
        return "/".to_string();
    };

    let same_site = base.join(destination).ok().filter(|resolved| {
        matches!(resolved.scheme(), "http" | "https")
            && resolved.host_str().is_some()
            && resolved.host_str() == base.host_str()
    });

    if same_site.is_some() {
        destination.to_string()
    } else {
        warn!(destination = %destination, "Refusing off-site post-login destination");
        "/".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_destinations_are_kept() {
        let host = "https://app.example.com";
        assert_eq!(safe_destination("/dashboard?a=1#x", host), "/dashboard?a=1#x");
        assert_eq!(safe_destination("/", host), "/");
        assert_eq!(safe_destination("reports", host), "reports");
    }

    #[test]
    fn test_same_site_absolute_destination_is_kept() {
        assert_eq!(
            safe_destination("https://APP.example.com/home", "https://app.example.com"),
            "https://APP.example.com/home"
        );
    }

    #[test]
    fn test_off_site_destinations_are_refused() {
        let host = "https://app.example.com";
        assert_eq!(safe_destination("https://evil.test/phish", host), "/");
        assert_eq!(safe_destination("//evil.test/phish", host), "/");
        assert_eq!(safe_destination("javascript:alert(1)", host), "/");
        assert_eq!(safe_destination("\\\\evil.test/phish", host), "/");
        assert_eq!(safe_destination("\\/evil.test/phish", host), "/");
        assert_eq!(safe_destination("/\t/evil.test/phish", host), "/");
        assert_eq!(safe_destination("/\\evil.test/phish", host), "/");
    }

    #[test]
    fn test_unparsable_host_falls_back_to_root() {
        assert_eq!(safe_destination("/dashboard", "not a host"), "/");
    }
}
