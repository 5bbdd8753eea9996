use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use salvo::async_trait;
use sha2::{Digest, Sha256};
use tokio::time::Instant;

use super::backend::{AuthBackend, AuthResult};
use super::identity::Identity;

#[derive(Debug, Clone)]
struct CacheEntry {
    /// Serialized [`Identity`].
    value: String,
    expires_at: Instant,
}

/// ## Summary
/// Caches successful logins of an inner backend for a fixed TTL.
///
/// Keys are derived from the account and a salted digest of the password, so
/// a changed password never hits a stale entry and the cache holds no
/// plaintext. Failures are never cached.
pub struct CredentialCache {
    inner: Arc<dyn AuthBackend>,
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    salt: String,
}

impl CredentialCache {
    #[must_use]
    pub fn new(inner: Arc<dyn AuthBackend>, ttl: Duration, salt: impl Into<String>) -> Self {
        Self {
            inner,
            entries: DashMap::new(),
            ttl,
            salt: salt.into(),
        }
    }

    fn key(&self, account: &str, password: &str) -> String {
        let secret = Sha256::new()
            .chain_update(password.as_bytes())
            .chain_update(self.salt.as_bytes())
            .finalize();

        let key = Sha256::new()
            .chain_update(account.as_bytes())
            .chain_update(b":")
            .chain_update(hex::encode(secret).as_bytes())
            .finalize();
        hex::encode(key)
    }

    /// Returns the cached identity if present, unexpired and decodable.
    fn lookup(&self, key: &str) -> Option<Identity> {
        let decoded = {
            let entry = self.entries.get(key)?;
            (entry.expires_at > Instant::now())
                .then(|| serde_json::from_str::<Identity>(&entry.value))
        };

        match decoded {
            Some(Ok(identity)) => Some(identity),
            Some(Err(err)) => {
                tracing::warn!(error = %err, "Discarding undecodable cache entry");
                self.entries.remove(key);
                None
            }
            None => {
                self.entries.remove(key);
                None
            }
        }
    }

    fn store(&self, key: String, identity: &Identity) {
        match serde_json::to_string(identity) {
            Ok(value) => {
                self.entries.insert(
                    key,
                    CacheEntry {
                        value,
                        expires_at: Instant::now() + self.ttl,
                    },
                );
            }
            Err(err) => tracing::warn!(error = %err, "Identity not cacheable"),
        }
    }

    /// Drops every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed, "Purged expired credentials");
        }
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl AuthBackend for CredentialCache {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    #[tracing::instrument(skip(self, password), fields(backend = self.inner.name()))]
    async fn login(&self, account: &str, password: &str) -> AuthResult<Identity> {
        let key = self.key(account, password);
        if let Some(identity) = self.lookup(&key) {
            tracing::trace!("Credential cache hit");
            return Ok(identity);
        }

        let identity = self.inner.login(account, password).await?;
        self.store(key, &identity);
        Ok(identity)
    }

    async fn get_user(&self, account: &str) -> AuthResult<Identity> {
        self.inner.get_user(account).await
    }

    async fn list_users(&self) -> AuthResult<Vec<Identity>> {
        self.inner.list_users().await
    }
}
