//! Credential <-> encrypted session value.

use crate::credential::CredentialRecord;
use crate::endpoints::{EndpointRegistry, TenantId};
use crate::error::FlowError;
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Session key holding the encrypted credential.
pub const SESSION_KEY: &str = "oauth_webflow.credential";

/// Minimum length of the configured encryption key, in bytes.
pub const MIN_KEY_LEN: usize = 16;

const BLOB_PREFIX: &str = "v1.";
const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;

/// Versioned session payload. Unknown versions fail to deserialize and are
/// treated as "no credential".
#[derive(Serialize, Deserialize)]
#[serde(tag = "v")]
enum SessionPayload {
    #[serde(rename = "1")]
    V1(StoredCredential),
}

/// Fields persisted in the session. Client id/secret and the debug switch
/// are deliberately absent.
#[derive(Serialize, Deserialize)]
struct StoredCredential {
    #[serde(default)]
    org_id: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    instance_url: Option<String>,
    #[serde(default)]
    host: Option<String>,
    oauth_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    tenant_id: TenantId,
    #[serde(default)]
    api_version: String,
    last_seen: DateTime<Utc>,
}

/// Encrypts and decrypts credential records against a server-held key.
pub struct SessionCodec {
    cipher: Aes256Gcm,
}

impl SessionCodec {
    /// The key may be any string of at least 16 bytes; it is stretched to a
    /// 256-bit AES key with SHA-256.
    pub fn new(key: &str) -> Result<Self, FlowError> {
        if key.len() < MIN_KEY_LEN {
            return Err(FlowError::Config(format!(
                "token_encryption_key must be at least {} bytes, got {}",
                MIN_KEY_LEN,
                key.len()
            )));
        }

        let digest = Sha256::digest(key.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(digest.as_slice())
            .map_err(|e| FlowError::Config(format!("failed to create cipher: {}", e)))?;

        Ok(Self { cipher })
    }

    /// Encrypt a credential for storage.
    ///
    /// Returns `None` when the record is flagged for logout, meaning the
    /// session entry must be removed.
    pub fn encode(&self, mut record: CredentialRecord) -> Result<Option<String>, FlowError> {
        if record.logout_flag {
            return Ok(None);
        }

        record.strip_client();
        record.last_seen = Utc::now();

        let payload = serde_json::to_vec(&Self::payload(record))
            .map_err(|e| FlowError::Config(format!("failed to serialize credential: {}", e)))?;

        Ok(Some(self.seal(&payload)?))
    }

    /// Decrypt a stored credential.
    ///
    /// Any failure (wrong key, corruption, unknown schema) and any tenant that
    /// no longer resolves yields `None`. Client credentials, `api_version` and
    /// `debug_enabled` always come from current configuration.
    pub fn decode(
        &self,
        blob: &str,
        registry: &EndpointRegistry,
        api_version: &str,
        debug_enabled: bool,
    ) -> Option<CredentialRecord> {
        let mut record = match self.open(blob) {
            Ok(record) => record,
            Err(err) => {
                warn!(error = %err, "Discarding undecodable session credential");
                return None;
            }
        };

        let Some(endpoint) = registry.lookup(record.tenant_id.as_str()) else {
            warn!(tenant = %record.tenant_id, "Discarding session credential for unknown endpoint");
            return None;
        };

        record.attach_client(&endpoint.credentials);
        record.api_version = api_version.to_string();
        record.debug_enabled = debug_enabled;
        Some(record)
    }

    fn payload(record: CredentialRecord) -> SessionPayload {
        SessionPayload::V1(StoredCredential {
            org_id: record.org_id,
            user_id: record.user_id,
            instance_url: record.instance_url,
            host: record.host,
            oauth_token: record.oauth_token,
            refresh_token: record.refresh_token,
            tenant_id: record.tenant_id,
            api_version: record.api_version,
            last_seen: record.last_seen,
        })
    }

    fn seal(&self, plaintext: &[u8]) -> Result<String, FlowError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| FlowError::Config(format!("session encryption failed: {}", e)))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);

        Ok(format!("{BLOB_PREFIX}{}", URL_SAFE_NO_PAD.encode(out)))
    }

    fn open(&self, blob: &str) -> Result<CredentialRecord, FlowError> {
        let encoded = blob
            .strip_prefix(BLOB_PREFIX)
            .ok_or_else(|| FlowError::SessionDecode("unknown envelope".to_string()))?;
        let raw = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| FlowError::SessionDecode(format!("invalid base64: {}", e)))?;

        if raw.len() < NONCE_SIZE + TAG_SIZE {
            return Err(FlowError::SessionDecode("value too short".to_string()));
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| {
                FlowError::SessionDecode("decryption failed (wrong key or corrupted data)".to_string())
            })?;

        let payload: SessionPayload = serde_json::from_slice(&plaintext)
            .map_err(|e| FlowError::SessionDecode(format!("invalid payload: {}", e)))?;

        let SessionPayload::V1(stored) = payload;
        debug!(tenant = %stored.tenant_id, "Session credential decrypted");

        Ok(CredentialRecord {
            org_id: stored.org_id,
            user_id: stored.user_id,
            instance_url: stored.instance_url,
            host: stored.host,
            oauth_token: stored.oauth_token,
            refresh_token: stored.refresh_token,
            tenant_id: stored.tenant_id,
            api_version: stored.api_version,
            last_seen: stored.last_seen,
            logout_flag: false,
            client_id: None,
            client_secret: None,
            debug_enabled: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoints::{RawEndpoint, RawEndpoints};
    use chrono::Duration;

    const KEY: &str = "0123456789abcdef-session-key";

    fn registry() -> EndpointRegistry {
        EndpointRegistry::normalize(
            &RawEndpoints::new()
                .with("login.example.com", RawEndpoint::new("id-login", "secret-login"))
                .with("test.example.com", RawEndpoint::new("id-test", "secret-test")),
        )
        .unwrap()
    }

    fn record(tenant: &str) -> CredentialRecord {
        CredentialRecord {
            org_id: Some("00Dorg".to_string()),
            user_id: Some("005user".to_string()),
            instance_url: Some("https://na1.example.com".to_string()),
            host: Some("na1.example.com".to_string()),
            oauth_token: "tok".to_string(),
            refresh_token: Some("ref".to_string()),
            tenant_id: TenantId::new(tenant),
            api_version: "25.0".to_string(),
            last_seen: Utc::now() - Duration::hours(1),
            logout_flag: false,
            client_id: Some("id-test".to_string()),
            client_secret: Some("secret-test".to_string()),
            debug_enabled: true,
        }
    }

    #[test]
    fn test_short_key_rejected() {
        let err = SessionCodec::new("too-short").err().unwrap();
        assert!(matches!(err, FlowError::Config(_)));
        assert!(SessionCodec::new("exactly-16-bytes").is_ok());
    }

    #[test]
    fn test_roundtrip_repopulates_client_from_registry() {
        let codec = SessionCodec::new(KEY).unwrap();
        let mut original = record("test.example.com");
        original.client_id = Some("stale-id".to_string());

        let blob = codec.encode(original).unwrap().unwrap();
        assert!(blob.starts_with("v1."));

        let decoded = codec.decode(&blob, &registry(), "58.0", false).unwrap();
        assert_eq!(decoded.client_id.as_deref(), Some("id-test"));
        assert_eq!(decoded.client_secret.as_deref(), Some("secret-test"));
        assert_eq!(decoded.api_version, "58.0");
        assert!(!decoded.debug_enabled);
        assert_eq!(decoded.org_id.as_deref(), Some("00Dorg"));
        assert_eq!(decoded.user_id.as_deref(), Some("005user"));
        assert_eq!(decoded.oauth_token, "tok");
        assert_eq!(decoded.refresh_token.as_deref(), Some("ref"));
        assert_eq!(decoded.tenant_id.as_str(), "test.example.com");
    }

    #[test]
    fn test_encode_stamps_last_seen() {
        let codec = SessionCodec::new(KEY).unwrap();
        let before = Utc::now();
        let blob = codec.encode(record("login.example.com")).unwrap().unwrap();
        let decoded = codec.decode(&blob, &registry(), "25.0", false).unwrap();
        assert!(decoded.last_seen >= before);
    }

    #[test]
    fn test_payload_never_contains_client_secret() {
        let payload = SessionCodec::payload({
            let mut r = record("test.example.com");
            r.strip_client();
            r
        });
        let json = serde_json::to_string(&payload).unwrap();
        assert!(!json.contains("secret-test"));
        assert!(!json.contains("id-test"));
        assert!(json.contains("\"v\":\"1\""));

        let codec = SessionCodec::new(KEY).unwrap();
        let blob = codec.encode(record("test.example.com")).unwrap().unwrap();
        assert!(!blob.contains("secret-test"));
    }

    #[test]
    fn test_logout_produces_no_value() {
        let codec = SessionCodec::new(KEY).unwrap();
        let mut r = record("login.example.com");
        r.logout();
        assert!(codec.encode(r).unwrap().is_none());
    }

    #[test]
    fn test_wrong_key_yields_none() {
        let codec = SessionCodec::new(KEY).unwrap();
        let other = SessionCodec::new("another-sixteen-byte-key").unwrap();
        let blob = codec.encode(record("login.example.com")).unwrap().unwrap();
        assert!(other.decode(&blob, &registry(), "25.0", false).is_none());
    }

    #[test]
    fn test_truncated_or_garbage_yields_none() {
        let codec = SessionCodec::new(KEY).unwrap();
        let blob = codec.encode(record("login.example.com")).unwrap().unwrap();

        let truncated = &blob[..blob.len() - 4];
        assert!(codec.decode(truncated, &registry(), "25.0", false).is_none());
        assert!(codec.decode("v1.", &registry(), "25.0", false).is_none());
        assert!(codec.decode("v1.!!!!", &registry(), "25.0", false).is_none());
        assert!(codec.decode("garbage", &registry(), "25.0", false).is_none());
        assert!(codec.decode("", &registry(), "25.0", false).is_none());
    }

    #[test]
    fn test_removed_tenant_yields_none() {
        let codec = SessionCodec::new(KEY).unwrap();
        let blob = codec.encode(record("test.example.com")).unwrap().unwrap();

        let shrunk = EndpointRegistry::normalize(
            &RawEndpoints::new().with("login.example.com", RawEndpoint::new("id", "secret")),
        )
        .unwrap();
        assert!(codec.decode(&blob, &shrunk, "25.0", false).is_none());
    }

    #[test]
    fn test_unknown_payload_version_yields_none() {
        let codec = SessionCodec::new(KEY).unwrap();
        let blob = codec
            .seal(br#"{"v":"2","oauth_token":"t","tenant_id":"login.example.com","last_seen":"2026-01-01T00:00:00Z"}"#)
            .unwrap();
        assert!(codec.decode(&blob, &registry(), "25.0", false).is_none());
    }

    #[test]
    fn test_missing_optional_fields_still_decode() {
        let codec = SessionCodec::new(KEY).unwrap();
        let blob = codec
            .seal(br#"{"v":"1","oauth_token":"t","tenant_id":"login.example.com","last_seen":"2026-01-01T00:00:00Z"}"#)
            .unwrap();
        let decoded = codec.decode(&blob, &registry(), "25.0", true).unwrap();
        assert_eq!(decoded.oauth_token, "t");
        assert!(decoded.org_id.is_none());
        assert!(decoded.debug_enabled);
        assert_eq!(decoded.client_id.as_deref(), Some("id-login"));
    }
}
