//! Authentication backends.
//!
//! Every backend implements [`AuthBackend`]. [`build_backend`] assembles the
//! configured one and wraps it in a [`CredentialCache`] so repeated requests
//! from the same client do not hit slow password hashes or the directory.

pub mod backend;
pub mod cache;
pub mod composite;
pub mod depot;
pub mod directory;
pub mod identity;
pub mod local;
pub mod none;
pub mod password;

use std::sync::Arc;
use std::time::Duration;

use kunai_core::config::{AuthMethod, Settings};

pub use backend::{AuthBackend, AuthError, AuthResult};
pub use cache::CredentialCache;
pub use composite::CompositeBackend;
pub use directory::{DirectoryBackend, ldap::LdapConnector};
pub use identity::{AccountStatus, Identity, IdentityKind};
pub use local::LocalBackend;
pub use none::NoneBackend;

use crate::error::ServiceResult;

/// ## Summary
/// Builds the uncached backend selected by `auth.method`.
///
/// ## Errors
/// Returns `InvalidConfiguration` if the local user list cannot be loaded.
pub fn build_raw_backend(settings: &Settings) -> ServiceResult<Arc<dyn AuthBackend>> {
    let directory = || -> Arc<dyn AuthBackend> {
        Arc::new(DirectoryBackend::new(
            Arc::new(LdapConnector::new(&settings.directory)),
            &settings.directory,
            &settings.users.directory,
        ))
    };

    let backend: Arc<dyn AuthBackend> = match settings.auth.method {
        AuthMethod::None => Arc::new(NoneBackend),
        AuthMethod::Local => Arc::new(LocalBackend::from_config(&settings.users.local)?),
        AuthMethod::Directory => directory(),
        AuthMethod::Composite => Arc::new(CompositeBackend::new(vec![
            Arc::new(LocalBackend::from_config(&settings.users.local)?),
            directory(),
        ])),
    };

    tracing::info!(backend = backend.name(), "Authentication backend ready");
    Ok(backend)
}

/// ## Summary
/// Builds the configured backend behind a [`CredentialCache`].
///
/// ## Errors
/// Returns `InvalidConfiguration` if the local user list cannot be loaded.
pub fn build_backend(settings: &Settings) -> ServiceResult<Arc<CredentialCache>> {
    let inner = build_raw_backend(settings)?;
    Ok(Arc::new(CredentialCache::new(
        inner,
        Duration::from_secs(settings.auth.cache_ttl_secs),
        settings.auth.cache_salt.clone(),
    )))
}
