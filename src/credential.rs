//! The credential produced by a completed login, and the request-scoped slot
//! through which downstream handlers see (and may log out) that credential.

use crate::endpoints::{ClientCredentials, TenantId};
use crate::token::AccessToken;
use crate::urls::sanitize_host;
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{DateTime, Utc};
use std::convert::Infallible;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// A completed login.
///
/// `client_id`, `client_secret` and `debug_enabled` are populated in memory
/// from current configuration and are never written to the session.
#[derive(Clone)]
pub struct CredentialRecord {
    pub org_id: Option<String>,
    pub user_id: Option<String>,
    pub instance_url: Option<String>,
    pub host: Option<String>,
    pub oauth_token: String,
    pub refresh_token: Option<String>,
    pub tenant_id: TenantId,
    pub api_version: String,
    pub last_seen: DateTime<Utc>,
    pub logout_flag: bool,

    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub debug_enabled: bool,
}

impl CredentialRecord {
    /// Build a credential from a token response.
    ///
    /// `org_id` / `user_id` come from the identity URL's trailing
    /// `/id/{org_id}/{user_id}` path segments.
    pub fn from_token(token: &AccessToken, tenant_id: TenantId) -> Self {
        let (org_id, user_id) = match parse_identity_url(&token.id_url) {
            Some((org, user)) => (Some(org), Some(user)),
            None => (None, None),
        };
        let instance_url = token.instance_url().map(str::to_string);
        let host = instance_url.as_deref().and_then(sanitize_host);

        Self {
            org_id,
            user_id,
            instance_url,
            host,
            oauth_token: token.token.clone(),
            refresh_token: token.refresh_token.clone(),
            tenant_id,
            api_version: String::new(),
            last_seen: Utc::now(),
            logout_flag: false,
            client_id: None,
            client_secret: None,
            debug_enabled: false,
        }
    }

    /// Flag this credential for removal from the session when the current
    /// request completes.
    pub fn logout(&mut self) {
        self.logout_flag = true;
    }

    pub(crate) fn attach_client(&mut self, credentials: &ClientCredentials) {
        self.client_id = Some(credentials.client_id.clone());
        self.client_secret = Some(credentials.client_secret.clone());
    }

    pub(crate) fn strip_client(&mut self) {
        self.client_id = None;
        self.client_secret = None;
        self.debug_enabled = false;
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("org_id", &self.org_id)
            .field("user_id", &self.user_id)
            .field("host", &self.host)
            .field("tenant_id", &self.tenant_id)
            .field("api_version", &self.api_version)
            .field("last_seen", &self.last_seen)
            .field("logout_flag", &self.logout_flag)
            .field("client_id", &self.client_id)
            .field("debug_enabled", &self.debug_enabled)
            .finish_non_exhaustive()
    }
}

/// Extract `(org_id, user_id)` from `.../id/{org_id}/{user_id}`.
pub fn parse_identity_url(id_url: &str) -> Option<(String, String)> {
    let path = id_url.split(['?', '#']).next().unwrap_or_default();
    let mut segments = path.rsplit('/');
    let user = segments.next()?;
    let org = segments.next()?;
    let marker = segments.next()?;
    if marker != "id" || org.is_empty() || user.is_empty() {
        return None;
    }
    Some((org.to_string(), user.to_string()))
}

/// Request-scoped credential shared between the flow middleware and the
/// downstream handler.
///
/// The middleware fills the slot before calling downstream and reads it back
/// afterwards, so changes made by the handler (including `logout()`) are
/// persisted.
#[derive(Clone, Default)]
pub struct CredentialSlot {
    inner: Arc<Mutex<Option<CredentialRecord>>>,
}

impl CredentialSlot {
    pub fn new(record: Option<CredentialRecord>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(record)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<CredentialRecord>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of the current credential.
    pub fn get(&self) -> Option<CredentialRecord> {
        self.lock().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().is_some()
    }

    /// Replace the credential.
    pub fn set(&self, record: Option<CredentialRecord>) {
        *self.lock() = record;
    }

    /// Mutate the credential in place, if present.
    pub fn update<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut CredentialRecord) -> R,
    {
        self.lock().as_mut().map(f)
    }

    /// Log out the current credential, if any.
    pub fn logout(&self) {
        self.update(CredentialRecord::logout);
    }

    pub(crate) fn take(&self) -> Option<CredentialRecord> {
        self.lock().take()
    }
}

impl fmt::Debug for CredentialSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CredentialSlot").field(&*self.lock()).finish()
    }
}

/// Handlers behind the flow middleware can take `CredentialSlot` as an
/// extractor. Outside the middleware the slot is empty.
#[async_trait]
impl<S> FromRequestParts<S> for CredentialSlot
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CredentialSlot>()
            .cloned()
            .unwrap_or_default())
    }
}
