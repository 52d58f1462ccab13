//! Error taxonomy for the authorization flow.
//!
//! Only provider, exchange and unresolved-tenant errors raised while handling
//! the authorize or callback paths ever reach a failure handler. Session
//! decode problems are absorbed into "no credential" by the session codec.

use thiserror::Error;

/// Coarse error classification used by the flow controller and by custom
/// failure handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowErrorKind {
    Configuration,
    Provider,
    Exchange,
    UnresolvedTenant,
    SessionDecode,
    InvalidUrl,
}

#[derive(Debug, Error)]
pub enum FlowError {
    /// Invalid endpoints or encryption key. Fatal at construction.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The identity provider reported an error on the callback.
    #[error("{error} {description}")]
    Provider { error: String, description: String },

    /// The code-for-token exchange failed (network, status, or payload).
    #[error("token exchange failed: {0}")]
    Exchange(String),

    /// A tenant identifier no longer resolves against the endpoint registry.
    #[error("unknown endpoint: {0}")]
    UnresolvedTenant(String),

    /// The stored session value could not be decrypted or deserialized.
    #[error("session decode failed: {0}")]
    SessionDecode(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl FlowError {
    pub fn kind(&self) -> FlowErrorKind {
        match self {
            FlowError::Config(_) => FlowErrorKind::Configuration,
            FlowError::Provider { .. } => FlowErrorKind::Provider,
            FlowError::Exchange(_) => FlowErrorKind::Exchange,
            FlowError::UnresolvedTenant(_) => FlowErrorKind::UnresolvedTenant,
            FlowError::SessionDecode(_) => FlowErrorKind::SessionDecode,
            FlowError::InvalidUrl(_) => FlowErrorKind::InvalidUrl,
        }
    }
}

impl From<reqwest::Error> for FlowError {
    fn from(err: reqwest::Error) -> Self {
        FlowError::Exchange(err.to_string())
    }
}

impl From<url::ParseError> for FlowError {
    fn from(err: url::ParseError) -> Self {
        FlowError::InvalidUrl(err.to_string())
    }
}
