//! Session persistence for the credential record.
//!
//! The credential lives under one fixed key of a mapping-like [`Session`]
//! as an opaque, AES-256-GCM encrypted string. Client id and secret are
//! stripped before encryption and repopulated from the endpoint registry on
//! load.
//!
//! ```text
//!  CredentialRecord ──strip secrets──> versioned JSON ──AES-256-GCM──> "v1.<base64url>"
//!         ↑                                                              │
//!   registry lookup <──────── decrypt / deserialize (failure = none) ────┘
//! ```

mod codec;
mod store;

pub use codec::{SessionCodec, SESSION_KEY};
pub use store::{memory_session_middleware, MemorySessionStore, Session, SESSION_COOKIE};
