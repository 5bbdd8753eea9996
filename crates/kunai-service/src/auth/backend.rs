use salvo::async_trait;
use thiserror::Error;

use super::identity::Identity;

/// Authentication failures.
///
/// The variants exist for logs only; the HTTP layer answers every one of them
/// with the same 401.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("user not found")]
    NoSuchUser,

    #[error("invalid credential")]
    InvalidCredential,

    #[error("authentication backend unavailable: {0}")]
    BackendUnavailable(String),
}

pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// ## Summary
/// A source of identities.
///
/// Implemented by the none, local, directory and composite backends and by
/// the credential cache that decorates them.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Short name used in logs and as the composite routing tag.
    fn name(&self) -> &'static str;

    /// ## Summary
    /// Verifies a credential pair and returns the caller's identity.
    ///
    /// ## Errors
    /// `NoSuchUser` for unknown accounts, `InvalidCredential` for a wrong
    /// password, `BackendUnavailable` when the identity source cannot be reached.
    async fn login(&self, account: &str, password: &str) -> AuthResult<Identity>;

    /// ## Summary
    /// Looks an account up without verifying a password.
    ///
    /// ## Errors
    /// `NoSuchUser` for unknown accounts, `BackendUnavailable` when the
    /// identity source cannot be reached.
    async fn get_user(&self, account: &str) -> AuthResult<Identity>;

    /// ## Summary
    /// Lists every identity this backend knows about.
    ///
    /// ## Errors
    /// `BackendUnavailable` when the identity source cannot be reached.
    async fn list_users(&self) -> AuthResult<Vec<Identity>>;
}
