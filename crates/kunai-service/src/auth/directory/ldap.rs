use std::time::Duration;

use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry};
use salvo::async_trait;

use kunai_core::config::DirectoryConfig;

use super::{DirectoryConnector, DirectoryEntry, DirectorySession};
use crate::auth::backend::{AuthError, AuthResult};

/// `invalidCredentials` result code.
const RC_INVALID_CREDENTIALS: u32 = 49;

/// Connector over an LDAP server reached with `ldap3`.
pub struct LdapConnector {
    url: String,
    bind_dn: String,
    bind_password: String,
    timeout: Duration,
}

impl LdapConnector {
    #[must_use]
    pub fn new(config: &DirectoryConfig) -> Self {
        Self {
            url: config.url.clone(),
            bind_dn: config.bind_dn.clone(),
            bind_password: config.bind_password.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

impl std::fmt::Debug for LdapConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConnector")
            .field("url", &self.url)
            .field("bind_dn", &self.bind_dn)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn map_ldap_error(err: &LdapError) -> AuthError {
    match err {
        LdapError::LdapResult { result } if result.rc == RC_INVALID_CREDENTIALS => {
            AuthError::InvalidCredential
        }
        other => AuthError::BackendUnavailable(other.to_string()),
    }
}

/// Service-account binds are never a caller's fault.
fn unavailable(err: &LdapError) -> AuthError {
    AuthError::BackendUnavailable(err.to_string())
}

#[async_trait]
impl DirectoryConnector for LdapConnector {
    #[tracing::instrument(skip(self), fields(url = %self.url))]
    async fn open(&self) -> AuthResult<Box<dyn DirectorySession>> {
        let settings = LdapConnSettings::new().set_conn_timeout(self.timeout);
        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &self.url)
            .await
            .map_err(|e| unavailable(&e))?;

        tokio::spawn(async move {
            if let Err(err) = conn.drive().await {
                tracing::warn!(error = %err, "LDAP connection terminated");
            }
        });

        ldap.with_timeout(self.timeout)
            .simple_bind(&self.bind_dn, &self.bind_password)
            .await
            .and_then(ldap3::LdapResult::success)
            .map_err(|e| {
                tracing::error!(error = %e, "LDAP service account bind failed");
                unavailable(&e)
            })?;

        Ok(Box::new(LdapSession {
            ldap,
            timeout: self.timeout,
        }))
    }
}

struct LdapSession {
    ldap: Ldap,
    timeout: Duration,
}

#[async_trait]
impl DirectorySession for LdapSession {
    async fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attrs: &[String],
    ) -> AuthResult<Vec<DirectoryEntry>> {
        let (entries, _) = self
            .ldap
            .with_timeout(self.timeout)
            .search(base_dn, Scope::Subtree, filter, attrs.to_vec())
            .await
            .and_then(ldap3::SearchResult::success)
            .map_err(|e| unavailable(&e))?;

        Ok(entries
            .into_iter()
            .map(|raw| {
                let entry = SearchEntry::construct(raw);
                DirectoryEntry {
                    dn: entry.dn,
                    attrs: entry.attrs,
                    bin_attrs: entry.bin_attrs,
                }
            })
            .collect())
    }

    async fn bind(&mut self, dn: &str, password: &str) -> AuthResult<()> {
        self.ldap
            .with_timeout(self.timeout)
            .simple_bind(dn, password)
            .await
            .and_then(ldap3::LdapResult::success)
            .map(|_| ())
            .map_err(|e| map_ldap_error(&e))
    }

    async fn close(mut self: Box<Self>) {
        if let Err(err) = self.ldap.unbind().await {
            tracing::debug!(error = %err, "LDAP unbind failed");
        }
    }
}
