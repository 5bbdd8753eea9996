use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::{ServiceError, ServiceResult};

/// Encoding of a configured password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PasswordAlgorithm {
    Plain,
    Base64,
    Bcrypt,
    Argon2,
}

impl PasswordAlgorithm {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Base64 => "base64",
            Self::Bcrypt => "bcrypt",
            Self::Argon2 => "argon2",
        }
    }

    /// One-way algorithms are slow by construction and verified off the runtime.
    #[must_use]
    pub const fn is_one_way(self) -> bool {
        matches!(self, Self::Bcrypt | Self::Argon2)
    }
}

impl std::str::FromStr for PasswordAlgorithm {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "plain" | "plaintext" => Ok(Self::Plain),
            "base64" => Ok(Self::Base64),
            "bcrypt" => Ok(Self::Bcrypt),
            "argon2" | "argon2id" => Ok(Self::Argon2),
            other => Err(ServiceError::InvalidConfiguration(format!(
                "unknown password algorithm: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for PasswordAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ## Summary
/// A configured password, validated at load time.
///
/// Reversible encodings are decoded once here; one-way hashes are kept as
/// their encoded form and only ever checked with the hash library's verifier.
#[derive(Clone)]
pub enum StoredPassword {
    Plain(String),
    Bcrypt(String),
    Argon2(String),
}

impl StoredPassword {
    /// ## Summary
    /// Parses a configured secret according to its algorithm.
    ///
    /// ## Errors
    /// Returns `InvalidConfiguration` for unknown algorithms, undecodable
    /// base64 secrets and malformed hashes.
    pub fn parse(algorithm: Option<&str>, secret: &str) -> ServiceResult<Self> {
        let algorithm: PasswordAlgorithm = algorithm.unwrap_or_default().parse()?;

        match algorithm {
            PasswordAlgorithm::Plain => Ok(Self::Plain(secret.to_string())),
            PasswordAlgorithm::Base64 => {
                let decoded = STANDARD.decode(secret).map_err(|e| {
                    ServiceError::InvalidConfiguration(format!("invalid base64 password: {e}"))
                })?;
                let decoded = String::from_utf8(decoded).map_err(|e| {
                    ServiceError::InvalidConfiguration(format!("base64 password is not UTF-8: {e}"))
                })?;
                Ok(Self::Plain(decoded))
            }
            PasswordAlgorithm::Bcrypt => {
                if !secret.starts_with("$2") {
                    return Err(ServiceError::InvalidConfiguration(
                        "bcrypt password must be a $2 hash".to_string(),
                    ));
                }
                Ok(Self::Bcrypt(secret.to_string()))
            }
            PasswordAlgorithm::Argon2 => {
                PasswordHash::new(secret).map_err(|e| {
                    ServiceError::InvalidConfiguration(format!("Invalid password hash: {e}"))
                })?;
                Ok(Self::Argon2(secret.to_string()))
            }
        }
    }

    #[must_use]
    pub const fn is_one_way(&self) -> bool {
        matches!(self, Self::Bcrypt(_) | Self::Argon2(_))
    }

    /// ## Summary
    /// Checks a candidate password against this secret.
    #[must_use]
    pub fn verify(&self, candidate: &str) -> bool {
        match self {
            Self::Plain(expected) => expected == candidate,
            Self::Bcrypt(hash) => bcrypt::verify(candidate, hash).unwrap_or_else(|err| {
                tracing::warn!(error = %err, "bcrypt verification failed");
                false
            }),
            Self::Argon2(hash) => verify_argon2(candidate, hash).is_ok(),
        }
    }
}

impl std::fmt::Debug for StoredPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let algorithm = match self {
            Self::Plain(_) => "plain",
            Self::Bcrypt(_) => "bcrypt",
            Self::Argon2(_) => "argon2",
        };
        f.debug_tuple("StoredPassword").field(&algorithm).finish()
    }
}

/// ## Summary
/// Hashes a password with the given one-way algorithm and a random salt.
///
/// ## Errors
/// Returns an error if hashing fails or the algorithm is reversible.
pub fn hash_password(password: &str, algorithm: PasswordAlgorithm) -> ServiceResult<String> {
    match algorithm {
        PasswordAlgorithm::Argon2 => {
            let salt = SaltString::generate(&mut OsRng);
            Argon2::default()
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| {
                    ServiceError::InvalidConfiguration(format!("Failed to hash password: {e}"))
                })
        }
        PasswordAlgorithm::Bcrypt => bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|e| {
            ServiceError::InvalidConfiguration(format!("Failed to hash password: {e}"))
        }),
        PasswordAlgorithm::Plain | PasswordAlgorithm::Base64 => {
            Err(ServiceError::InvalidConfiguration(format!(
                "{algorithm} is not a one-way hash"
            )))
        }
    }
}

fn verify_argon2(password: &str, password_hash: &str) -> ServiceResult<()> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| ServiceError::InvalidConfiguration(format!("Invalid password hash: {e}")))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|err| {
            tracing::trace!("Password verification failed: {}", err);
            ServiceError::AuthError(super::AuthError::InvalidCredential)
        })
}
