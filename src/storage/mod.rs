// Object storage for issued certificates. The filesystem store mirrors a
// bucket: objects live under a root directory and are retrieved through
// HMAC-signed URLs served by the /files route, so the tree is never
// exposed for anonymous enumeration.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("object storage failure: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn save(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), StorageError>;
    async fn signed_url(&self, key: &str, expires: DateTime<Utc>) -> Result<String, StorageError>;
}

/// Storage key for a certificate; the same (student, course) pair always
/// maps to the same object, so re-issuance overwrites in place.
pub fn certificate_object_key(student_id: &str, course_id: Uuid) -> String {
    format!("certificates/{}/{}_certificate.pdf", student_id, course_id)
}

/// Expiry used for certificate links. Effectively unlimited.
pub fn far_future_expiry() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2500, 3, 1, 0, 0, 0).single().unwrap_or_else(Utc::now)
}

fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|part| part.is_empty() || part == "." || part == "..")
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

fn sign(secret: &str, key: &str, expires: i64) -> String {
    // HMAC-SHA256 accepts keys of any length.
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac key length");
    mac.update(key.as_bytes());
    mac.update(b":");
    mac.update(expires.to_string().as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Checks a /files request signature against the signing secret.
pub fn verify_signature(secret: &str, key: &str, expires: i64, sig: &str) -> bool {
    let Ok(raw) = hex::decode(sig) else {
        return false;
    };
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac key length");
    mac.update(key.as_bytes());
    mac.update(b":");
    mac.update(expires.to_string().as_bytes());
    mac.verify_slice(&raw).is_ok()
}

pub struct FsObjectStore {
    root: PathBuf,
    base_url: String,
    secret: String,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
            secret: secret.into(),
        }
    }

    pub fn ensure_root(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }

    /// Maps a validated key to its path under the storage root.
    pub fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn save(&self, key: &str, bytes: &[u8], _content_type: &str) -> Result<(), StorageError> {
        // Content type is reconstructed from the key extension on the read
        // path; the parameter stays in the trait for non-filesystem stores.
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }

    async fn signed_url(&self, key: &str, expires: DateTime<Utc>) -> Result<String, StorageError> {
        validate_key(key)?;
        let ts = expires.timestamp();
        let sig = sign(&self.secret, key, ts);
        Ok(format!(
            "{}/files/{}?expires={}&sig={}",
            self.base_url.trim_end_matches('/'),
            key,
            ts,
            sig
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &std::path::Path) -> FsObjectStore {
        FsObjectStore::new(dir, "http://localhost:5001", "test-secret")
    }

    #[test]
    fn certificate_key_is_deterministic() {
        let course = Uuid::nil();
        let first = certificate_object_key("uid-1", course);
        let second = certificate_object_key("uid-1", course);
        assert_eq!(first, second);
        assert_eq!(
            first,
            "certificates/uid-1/00000000-0000-0000-0000-000000000000_certificate.pdf"
        );
    }

    #[tokio::test]
    async fn save_writes_and_overwrites_the_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let key = certificate_object_key("uid-1", Uuid::nil());

        store.save(&key, b"first", "application/pdf").await.unwrap();
        store.save(&key, b"second", "application/pdf").await.unwrap();

        let path = store.resolve(&key).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"second");
    }

    #[tokio::test]
    async fn signed_url_carries_a_verifiable_signature() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let expires = far_future_expiry();

        let url = store.signed_url("certificates/u/c_certificate.pdf", expires).await.unwrap();
        assert!(url.starts_with("http://localhost:5001/files/certificates/u/c_certificate.pdf?"));

        let sig = url.split("sig=").nth(1).unwrap();
        assert!(verify_signature(
            "test-secret",
            "certificates/u/c_certificate.pdf",
            expires.timestamp(),
            sig
        ));
        // Tampering with the key invalidates the signature.
        assert!(!verify_signature(
            "test-secret",
            "certificates/u/other_certificate.pdf",
            expires.timestamp(),
            sig
        ));
        assert!(!verify_signature("test-secret", "certificates/u/c_certificate.pdf", 0, sig));
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        for key in ["../escape.pdf", "a/../../b", "/absolute", "", "a//b"] {
            assert!(
                matches!(
                    store.save(key, b"x", "application/pdf").await,
                    Err(StorageError::InvalidKey(_))
                ),
                "key {:?} should be rejected",
                key
            );
        }
    }
}
