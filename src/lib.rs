// Configuration file model and loading
pub mod config;

// Tenant registry
pub mod endpoints;

// Error taxonomy
pub mod error;

// Hostname, OAuth state and query helpers
pub mod urls;

// Credential record and request-scoped slot
pub mod credential;

// Encrypted session persistence
pub mod session;

// Token-exchange collaborator
pub mod token;

// Authorize / callback / pass-through middleware
pub mod flow;

pub use config::{load_config, WebFlowConfig};
pub use credential::{CredentialRecord, CredentialSlot};
pub use endpoints::{Endpoint, EndpointRegistry, TenantId};
pub use error::{FlowError, FlowErrorKind};
pub use flow::{webflow_middleware, FailureHandler, FlowRequest, WebFlow};
pub use session::{memory_session_middleware, MemorySessionStore, Session};
pub use token::{AccessToken, HttpTokenClient, TokenClient};
