//! Endpoint registry: the validated, insertion-ordered map of tenant
//! identifiers to OAuth client credential pairs.
//!
//! Built once at construction and shared read-only across requests.
//! Exactly one entry is the default; it answers authorize requests that carry
//! no (or an unknown) tenant hint. Callback and session lookups never fall
//! back to the default.

use crate::error::FlowError;
use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use tracing::{debug, warn};

#[cfg(test)]
mod tests;

/// Identifier of one configured tenant (a login domain or a logical name).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// OAuth client id and secret for one tenant.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// One validated registry entry.
#[derive(Clone, Debug)]
pub struct Endpoint {
    pub tenant: TenantId,
    pub credentials: ClientCredentials,
}

/// Unvalidated endpoint entry as it appears in configuration.
///
/// `key` / `secret` are accepted as legacy names.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawEndpoint {
    #[serde(default, alias = "key")]
    pub client_id: Option<String>,
    #[serde(default, alias = "secret")]
    pub client_secret: Option<String>,
    /// Marks this entry as the default tenant
    #[serde(default)]
    pub default: bool,
}

impl RawEndpoint {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            client_secret: Some(client_secret.into()),
            default: false,
        }
    }
}

/// Configured endpoints in their original order.
#[derive(Clone, Debug, Default)]
pub struct RawEndpoints(Vec<(String, RawEndpoint)>);

impl RawEndpoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry (builder style).
    pub fn with(mut self, tenant: impl Into<String>, endpoint: RawEndpoint) -> Self {
        self.0.push((tenant.into(), endpoint));
        self
    }

    pub fn push(&mut self, tenant: impl Into<String>, endpoint: RawEndpoint) {
        self.0.push((tenant.into(), endpoint));
    }

    pub fn entries(&self) -> &[(String, RawEndpoint)] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, RawEndpoint)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Table values are endpoint entries; anything else is kept as an empty
/// entry so validation can drop it.
#[derive(Deserialize)]
#[serde(untagged)]
enum MaybeEndpoint {
    Entry(RawEndpoint),
    Other(IgnoredAny),
}

impl<'de> Deserialize<'de> for RawEndpoints {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = RawEndpoints;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of tenant identifiers to client credentials")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, MaybeEndpoint>()? {
                    let endpoint = match value {
                        MaybeEndpoint::Entry(endpoint) => endpoint,
                        MaybeEndpoint::Other(_) => RawEndpoint::default(),
                    };
                    entries.push((key, endpoint));
                }
                Ok(RawEndpoints(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

/// Validated endpoint registry.
#[derive(Clone, Debug)]
pub struct EndpointRegistry {
    entries: Vec<Endpoint>,
    default_index: usize,
}

impl EndpointRegistry {
    /// Validate raw configuration.
    ///
    /// Entries with a missing or empty `client_id` / `client_secret` are
    /// dropped. The first entry marked `default` becomes the default; if none
    /// is marked, the first surviving entry does. Fails when nothing survives.
    pub fn normalize(raw: &RawEndpoints) -> Result<Self, FlowError> {
        let mut entries = Vec::with_capacity(raw.len());
        let mut default_index = None;

        for (name, endpoint) in raw.iter() {
            let tenant = name.trim();
            let client_id = endpoint.client_id.as_deref().unwrap_or_default();
            let client_secret = endpoint.client_secret.as_deref().unwrap_or_default();

            if tenant.is_empty() || client_id.is_empty() || client_secret.is_empty() {
                warn!(tenant = %name, "Dropping endpoint with missing client_id or client_secret");
                continue;
            }

            if entries.iter().any(|e: &Endpoint| e.tenant.as_str() == tenant) {
                warn!(tenant = %tenant, "Dropping duplicate endpoint");
                continue;
            }

            if endpoint.default {
                if default_index.is_none() {
                    default_index = Some(entries.len());
                } else {
                    warn!(tenant = %tenant, "Endpoint marked default but a default is already set");
                }
            }

            entries.push(Endpoint {
                tenant: TenantId::new(tenant),
                credentials: ClientCredentials {
                    client_id: client_id.to_string(),
                    client_secret: client_secret.to_string(),
                },
            });
        }

        if entries.is_empty() {
            return Err(FlowError::Config(
                "endpoints must contain at least one entry with a non-empty client_id and client_secret"
                    .to_string(),
            ));
        }

        let default_index = default_index.unwrap_or(0);
        debug!(
            endpoints = entries.len(),
            default = %entries[default_index].tenant,
            "Endpoint registry validated"
        );

        Ok(Self {
            entries,
            default_index,
        })
    }

    /// Strict lookup by tenant identifier.
    pub fn lookup(&self, tenant: &str) -> Option<&Endpoint> {
        let tenant = tenant.trim();
        self.entries.iter().find(|e| e.tenant.as_str() == tenant)
    }

    /// Lookup that falls back to the default entry when the hint is absent
    /// or unknown.
    pub fn resolve(&self, hint: Option<&str>) -> &Endpoint {
        hint.and_then(|h| self.lookup(h))
            .unwrap_or_else(|| self.default_endpoint())
    }

    pub fn default_endpoint(&self) -> &Endpoint {
        &self.entries[self.default_index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Endpoint> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
