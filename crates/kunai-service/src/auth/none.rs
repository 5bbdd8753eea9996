use salvo::async_trait;

use super::backend::{AuthBackend, AuthResult};
use super::identity::Identity;

/// Backend used when authentication is disabled: every credential is accepted.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoneBackend;

#[async_trait]
impl AuthBackend for NoneBackend {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn login(&self, account: &str, _password: &str) -> AuthResult<Identity> {
        Ok(Identity::anonymous(account))
    }

    async fn get_user(&self, account: &str) -> AuthResult<Identity> {
        Ok(Identity::anonymous(account))
    }

    async fn list_users(&self) -> AuthResult<Vec<Identity>> {
        Ok(Vec::new())
    }
}
