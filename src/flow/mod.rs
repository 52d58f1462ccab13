//! Flow controller.
//!
//! One axum middleware dispatches every request:
//! - `GET {prefix}` starts the authorization code flow ([`authorize`])
//! - `GET {prefix}/callback` exchanges the code and stores the credential ([`callback`])
//! - everything else passes through with the session credential decoded into a
//!   [`CredentialSlot`] and re-encoded after the downstream handler returns
//!
//! Errors raised on the authorize and callback paths are logged and handed to
//! the failure handler ([`failure`]).

mod authorize;
mod callback;
mod context;
mod failure;

pub use context::FlowRequest;
pub use failure::FailureHandler;

use crate::config::{AuthorizeConfig, WebFlowConfig};
use crate::credential::{CredentialRecord, CredentialSlot};
use crate::endpoints::EndpointRegistry;
use crate::error::FlowError;
use crate::session::{Session, SessionCodec, SESSION_KEY};
use crate::token::{HttpTokenClient, TokenClient};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Operational settings derived once from [`WebFlowConfig`].
#[derive(Debug, Clone)]
struct FlowSettings {
    path_prefix: String,
    authorize_path: String,
    callback_path: String,
    failure_path: String,
    api_version: String,
    debugging: bool,
    mydomain_suffix: String,
    origin: Option<String>,
    authorize: AuthorizeConfig,
}

impl FlowSettings {
    fn from_config(config: &WebFlowConfig) -> Self {
        let path_prefix = config.normalized_path_prefix();
        Self {
            authorize_path: path_prefix.to_ascii_lowercase(),
            callback_path: format!("{}/callback", path_prefix).to_ascii_lowercase(),
            failure_path: format!("{}/failure", path_prefix),
            path_prefix,
            api_version: config.api_version.clone(),
            debugging: config.debugging,
            mydomain_suffix: config.mydomain_suffix.clone(),
            origin: config.resolved_origin(),
            authorize: config.authorize.clone(),
        }
    }

    fn redirect_uri(&self, req: &FlowRequest) -> String {
        format!("{}{}/callback", req.host, self.path_prefix)
    }
}

enum Route {
    Authorize,
    Callback,
    PassThrough,
}

/// Shared, immutable middleware state.
pub struct WebFlow {
    settings: FlowSettings,
    registry: EndpointRegistry,
    codec: SessionCodec,
    token_client: Arc<dyn TokenClient>,
    on_failure: Option<FailureHandler>,
}

impl WebFlow {
    /// Validate configuration and build the middleware state.
    ///
    /// Fails when no endpoint survives validation or the encryption key is
    /// too short.
    pub fn new(config: &WebFlowConfig, token_client: Arc<dyn TokenClient>) -> Result<Self, FlowError> {
        let registry = EndpointRegistry::normalize(&config.endpoints)?;
        let codec = SessionCodec::new(&config.token_encryption_key)?;
        let settings = FlowSettings::from_config(config);

        info!(
            endpoints = registry.len(),
            default_endpoint = %registry.default_endpoint().tenant,
            path_prefix = %settings.path_prefix,
            "OAuth web flow configured"
        );

        Ok(Self {
            settings,
            registry,
            codec,
            token_client,
            on_failure: None,
        })
    }

    /// Build with the reqwest-backed token client described by `config.provider`.
    pub fn from_config(config: &WebFlowConfig) -> Result<Self, FlowError> {
        let client = HttpTokenClient::new(&config.provider)?;
        Self::new(config, Arc::new(client))
    }

    /// Replace the default failure redirect.
    pub fn with_failure_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&FlowRequest, &FlowError) -> Response + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(handler));
        self
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    pub fn path_prefix(&self) -> &str {
        &self.settings.path_prefix
    }

    /// Wrap every route of `router` with the flow middleware.
    ///
    /// Layer a session middleware outside of this one so the [`Session`]
    /// extension is in place when the flow runs.
    pub fn attach<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(middleware::from_fn_with_state(Arc::new(self), webflow_middleware))
    }

    fn route(&self, req: &FlowRequest) -> Route {
        let path = req.normalized_path();
        if path == self.settings.authorize_path {
            Route::Authorize
        } else if path == self.settings.callback_path {
            Route::Callback
        } else {
            Route::PassThrough
        }
    }

    /// Decode the session credential, run downstream, write back the result.
    async fn pass_through(&self, session: Session, mut req: Request, next: Next) -> Response {
        let stored = session.get(SESSION_KEY);
        let record = stored.as_deref().and_then(|blob| {
            self.codec.decode(
                blob,
                &self.registry,
                &self.settings.api_version,
                self.settings.debugging,
            )
        });
        let discard_stored = stored.is_some() && record.is_none();

        if self.settings.debugging {
            debug!(
                path = %req.uri().path(),
                has_session_value = stored.is_some(),
                credential = ?record,
                "Session credential loaded"
            );
        }

        let slot = CredentialSlot::new(record);
        req.extensions_mut().insert(slot.clone());

        let response = next.run(req).await;

        match slot.take() {
            Some(record) => self.save(&session, record),
            None if discard_stored => {
                session.remove(SESSION_KEY);
            }
            None => {}
        }

        response
    }

    fn save(&self, session: &Session, record: CredentialRecord) {
        if self.settings.debugging {
            debug!(credential = ?record, "Saving session credential");
        }

        match self.codec.encode(record) {
            Ok(Some(blob)) => session.insert(SESSION_KEY, blob),
            Ok(None) => {
                session.remove(SESSION_KEY);
                info!("Credential logged out, session value removed");
            }
            Err(e) => {
                error!(error = %e, "Failed to encode session credential");
                session.remove(SESSION_KEY);
            }
        }
    }

    fn fail(&self, req: &FlowRequest, err: FlowError) -> Response {
        error!(
            path = %req.path,
            kind = ?err.kind(),
            error = %err,
            "OAuth web flow failed"
        );

        match &self.on_failure {
            Some(handler) => handler(req, &err),
            None => failure::default_failure(&self.settings.failure_path, req, &err),
        }
    }
}

/// Axum middleware entry point. Install with [`WebFlow::attach`].
pub async fn webflow_middleware(
    State(flow): State<Arc<WebFlow>>,
    req: Request,
    next: Next,
) -> Response {
    let ctx = FlowRequest::from_request(&req, flow.settings.origin.as_deref());
    let session = req.extensions().get::<Session>().cloned().unwrap_or_default();

    let outcome = match flow.route(&ctx) {
        Route::Authorize => authorize::handle(&flow, &ctx),
        Route::Callback => callback::handle(&flow, &ctx, &session).await,
        Route::PassThrough => return flow.pass_through(session, req, next).await,
    };

    outcome.unwrap_or_else(|err| flow.fail(&ctx, err))
}

/// 302 to `location`.
fn redirect(location: &str) -> Result<Response, FlowError> {
    let location = HeaderValue::from_str(location)
        .map_err(|e| FlowError::InvalidUrl(format!("{}: {}", location, e)))?;
    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}
