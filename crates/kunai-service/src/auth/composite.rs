use std::sync::Arc;

use futures::future::join_all;
use salvo::async_trait;

use super::backend::{AuthBackend, AuthError, AuthResult};
use super::identity::Identity;

/// Older deployments tag directory accounts with `ldap:`.
const TAG_ALIASES: &[(&str, &str)] = &[("ldap", "directory")];

/// ## Summary
/// Chains several backends.
///
/// An account of the form `tag:name` is routed only to the backend with that
/// tag. Unprefixed accounts are tried against each backend in order and the
/// first success wins.
pub struct CompositeBackend {
    backends: Vec<(&'static str, Arc<dyn AuthBackend>)>,
}

impl CompositeBackend {
    /// Backends are tagged with their own [`AuthBackend::name`].
    #[must_use]
    pub fn new(backends: Vec<Arc<dyn AuthBackend>>) -> Self {
        Self {
            backends: backends.into_iter().map(|b| (b.name(), b)).collect(),
        }
    }

    /// Splits `tag:name` when `tag` names a member backend.
    fn route<'a>(&self, account: &'a str) -> Option<(&Arc<dyn AuthBackend>, &'a str)> {
        let (tag, name) = account.split_once(':')?;
        let tag = TAG_ALIASES
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case(tag))
            .map_or(tag, |(_, canonical)| canonical);

        self.backends
            .iter()
            .find(|(t, _)| t.eq_ignore_ascii_case(tag))
            .map(|(_, backend)| (backend, name))
    }
}

#[async_trait]
impl AuthBackend for CompositeBackend {
    fn name(&self) -> &'static str {
        "composite"
    }

    #[tracing::instrument(skip(self, password))]
    async fn login(&self, account: &str, password: &str) -> AuthResult<Identity> {
        if let Some((backend, name)) = self.route(account) {
            return backend.login(name, password).await;
        }

        let mut last_error = AuthError::NoSuchUser;
        for (tag, backend) in &self.backends {
            match backend.login(account, password).await {
                Ok(identity) => return Ok(identity),
                Err(err) => {
                    tracing::debug!(backend = tag, error = %err, "Backend rejected login");
                    last_error = err;
                }
            }
        }
        Err(last_error)
    }

    async fn get_user(&self, account: &str) -> AuthResult<Identity> {
        if let Some((backend, name)) = self.route(account) {
            return backend.get_user(name).await;
        }

        let mut last_error = AuthError::NoSuchUser;
        for (_, backend) in &self.backends {
            match backend.get_user(account).await {
                Ok(identity) => return Ok(identity),
                Err(err) => last_error = err,
            }
        }
        Err(last_error)
    }

    /// Concatenation of every member's list; failing members contribute nothing.
    async fn list_users(&self) -> AuthResult<Vec<Identity>> {
        let lists = join_all(self.backends.iter().map(|(_, b)| b.list_users())).await;

        Ok(self
            .backends
            .iter()
            .zip(lists)
            .flat_map(|((tag, _), result)| {
                result.unwrap_or_else(|err| {
                    tracing::warn!(backend = tag, error = %err, "Skipping backend in user listing");
                    Vec::new()
                })
            })
            .collect())
    }
}
