use std::collections::HashMap;

use salvo::async_trait;

use kunai_core::config::LocalUserConfig;

use super::backend::{AuthBackend, AuthError, AuthResult};
use super::identity::{AccountStatus, Identity, IdentityKind};
use super::password::StoredPassword;
use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone)]
struct LocalUser {
    identity: Identity,
    password: StoredPassword,
}

/// ## Summary
/// Backend over the statically configured `users.local` list.
#[derive(Debug, Default)]
pub struct LocalBackend {
    users: HashMap<String, LocalUser>,
}

impl LocalBackend {
    /// ## Summary
    /// Builds the user map, parsing every password up front.
    ///
    /// ## Errors
    /// Returns `InvalidConfiguration` for an unknown algorithm, an unparsable
    /// secret or a duplicated account.
    pub fn from_config(users: &[LocalUserConfig]) -> ServiceResult<Self> {
        let mut map = HashMap::with_capacity(users.len());

        for user in users {
            let password = StoredPassword::parse(user.algo.as_deref(), &user.password)
                .map_err(|e| {
                    ServiceError::InvalidConfiguration(format!("users.local[{}]: {e}", user.account))
                })?;

            let identity = Identity {
                kind: IdentityKind::Local,
                unique_id: local_unique_id(&user.account),
                display_name: user.name.clone().unwrap_or_else(|| user.account.clone()),
                account: user.account.clone(),
                groups: user.all_groups().into_iter().collect(),
                status: AccountStatus::Enabled,
            };

            if map
                .insert(user.account.clone(), LocalUser { identity, password })
                .is_some()
            {
                return Err(ServiceError::InvalidConfiguration(format!(
                    "users.local: duplicate account {}",
                    user.account
                )));
            }
        }

        tracing::debug!(user_count = map.len(), "Local users loaded");
        Ok(Self { users: map })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Stable per-account id, so local users keep it across restarts.
fn local_unique_id(account: &str) -> String {
    uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_URL, format!("kunai:local:{account}").as_bytes())
        .to_string()
}

#[async_trait]
impl AuthBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    #[tracing::instrument(skip(self, password))]
    async fn login(&self, account: &str, password: &str) -> AuthResult<Identity> {
        let user = self.users.get(account).ok_or(AuthError::NoSuchUser)?;

        let verified = if user.password.is_one_way() {
            let stored = user.password.clone();
            let candidate = password.to_string();
            tokio::task::spawn_blocking(move || stored.verify(&candidate))
                .await
                .map_err(|e| AuthError::BackendUnavailable(format!("password check aborted: {e}")))?
        } else {
            user.password.verify(password)
        };

        if verified {
            Ok(user.identity.clone())
        } else {
            tracing::debug!("Local password mismatch");
            Err(AuthError::InvalidCredential)
        }
    }

    async fn get_user(&self, account: &str) -> AuthResult<Identity> {
        self.users
            .get(account)
            .map(|user| user.identity.clone())
            .ok_or(AuthError::NoSuchUser)
    }

    async fn list_users(&self) -> AuthResult<Vec<Identity>> {
        let mut users: Vec<Identity> = self.users.values().map(|u| u.identity.clone()).collect();
        users.sort_by(|a, b| a.account.cmp(&b.account));
        Ok(users)
    }
}
