//! Mapping-like session object and a cookie-keyed in-memory backend.
//!
//! The flow middleware only needs a [`Session`] in the request extensions.
//! Production deployments insert one from their own session layer; the
//! in-memory store here backs the demo server and tests. Sessions in it
//! never expire and do not survive restarts.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

/// Cookie carrying the in-memory session id.
pub const SESSION_COOKIE: &str = "oauth_webflow.sid";

/// Shared handle to one browser session's key/value map.
#[derive(Clone, Debug, Default)]
pub struct Session {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: String) {
        self.lock().insert(key.to_string(), value);
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.lock().remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// In-memory session store keyed by the [`SESSION_COOKIE`] value.
#[derive(Clone)]
pub struct MemorySessionStore {
    sessions: Arc<DashMap<String, Session>>,
    secure_cookie: bool,
}

impl MemorySessionStore {
    pub fn new(secure_cookie: bool) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            secure_cookie,
        }
    }

    /// Existing session for the request's cookie, or a fresh one.
    fn load(&self, headers: &HeaderMap) -> (String, Session, bool) {
        if let Some(id) = cookie_value(headers, SESSION_COOKIE) {
            if let Some(session) = self.sessions.get(id) {
                return (id.to_string(), session.clone(), false);
            }
        }

        let id = Uuid::new_v4().to_string();
        let session = Session::new();
        self.sessions.insert(id.clone(), session.clone());
        (id, session, true)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Attaches a [`Session`] to every request and issues the session cookie
/// once the session holds data. Sessions that end a request empty are
/// dropped from the store.
pub async fn memory_session_middleware(
    State(store): State<MemorySessionStore>,
    mut req: Request,
    next: Next,
) -> Response {
    let (id, session, is_new) = store.load(req.headers());
    req.extensions_mut().insert(session.clone());

    let mut response = next.run(req).await;

    if session.is_empty() {
        if store.sessions.remove(&id).is_some() && !is_new {
            debug!("Dropped emptied session");
        }
    } else if is_new {
        let cookie = build_set_cookie(SESSION_COOKIE, &id, store.secure_cookie);
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
                debug!("Issued new session cookie");
            }
            Err(e) => warn!(error = %e, "Failed to build session cookie header"),
        }
    }

    response
}

fn cookie_value<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|part| {
            let (name, value) = part.trim().split_once('=')?;
            if name == cookie_name {
                Some(value)
            } else {
                None
            }
        })
}

fn build_set_cookie(name: &str, value: &str, secure: bool) -> String {
    let mut out = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax");
    if secure {
        out.push_str("; Secure");
    }
    out
}
