//! Persistent storage for the auth token.
//!
//! The marketplace keeps the bearer token in a small key/value store under a
//! fixed key, the way a browser would use `localStorage`. The file-backed
//! store is the durable variant; the in-memory store serves tests and
//! throwaway sessions.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // User ID
    pub exp: i64,     // Expiration time
    #[serde(default)]
    pub iat: i64,     // Issued at
}

impl Claims {
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Read the claims of a token without verifying its signature.
///
/// The client cannot verify server-issued tokens; this is only used to skip
/// restoring a session whose token has visibly expired.
pub fn peek_claims(token: &str) -> Option<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .ok()
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load(&self) -> Result<Option<String>, AppError>;
    async fn store(&self, token: &str) -> Result<(), AppError>;
    async fn clear(&self) -> Result<(), AppError>;
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<String>, AppError> {
        Ok(self.token.read().await.clone())
    }

    async fn store(&self, token: &str) -> Result<(), AppError> {
        *self.token.write().await = Some(token.to_string());
        Ok(())
    }

    async fn clear(&self) -> Result<(), AppError> {
        self.token.write().await.take();
        Ok(())
    }
}

/// JSON key/value file; other keys in the file are preserved.
pub struct FileTokenStore {
    path: PathBuf,
    key: String,
    lock: RwLock<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
            lock: RwLock::new(()),
        }
    }

    async fn read_entries(&self) -> Result<HashMap<String, String>, AppError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(entries) => Ok(entries),
                Err(e) => {
                    warn!("Ignoring unreadable token storage {}: {}", self.path.display(), e);
                    Ok(HashMap::new())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_entries(&self, entries: &HashMap<String, String>) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let bytes = serde_json::to_vec_pretty(entries)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<Option<String>, AppError> {
        let _guard = self.lock.read().await;
        Ok(self.read_entries().await?.remove(&self.key))
    }

    async fn store(&self, token: &str) -> Result<(), AppError> {
        let _guard = self.lock.write().await;
        let mut entries = self.read_entries().await?;
        entries.insert(self.key.clone(), token.to_string());
        self.write_entries(&entries).await?;
        debug!("Stored auth token under '{}'", self.key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), AppError> {
        let _guard = self.lock.write().await;
        let mut entries = self.read_entries().await?;
        if entries.remove(&self.key).is_some() {
            self.write_entries(&entries).await?;
            debug!("Cleared auth token '{}'", self.key);
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn token_for_test(sub: &str, expires_in: chrono::Duration) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let now = Utc::now();
    let claims = Claims {
        sub: sub.to_string(),
        exp: (now + expires_in).timestamp(),
        iat: now.timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"server_secret"),
    )
    .expect("token encodes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_peek_claims() {
        let token = token_for_test("user-42", Duration::hours(1));
        let claims = peek_claims(&token).expect("claims readable");
        assert_eq!(claims.sub, "user-42");
        assert!(!claims.is_expired());

        let expired = token_for_test("user-42", Duration::hours(-1));
        assert!(peek_claims(&expired).unwrap().is_expired());

        assert!(peek_claims("not-a-jwt").is_none());
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.load().await.unwrap(), None);
        store.store("abc").await.unwrap();
        assert_eq!(store.load().await.unwrap().as_deref(), Some("abc"));
        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_persists_and_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let theme = FileTokenStore::new(&path, "theme");
        theme.store("dark").await.unwrap();

        let store = FileTokenStore::new(&path, "jwt");
        store.store("abc").await.unwrap();

        // a fresh handle sees the persisted value
        let reopened = FileTokenStore::new(&path, "jwt");
        assert_eq!(reopened.load().await.unwrap().as_deref(), Some("abc"));

        reopened.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
        assert_eq!(theme.load().await.unwrap().as_deref(), Some("dark"));
    }

    #[tokio::test]
    async fn test_file_store_tolerates_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let store = FileTokenStore::new(&path, "jwt");
        assert_eq!(store.load().await.unwrap(), None);
        store.store("abc").await.unwrap();
        assert_eq!(store.load().await.unwrap().as_deref(), Some("abc"));
    }
}
