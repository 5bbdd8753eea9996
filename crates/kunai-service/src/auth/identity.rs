//! The authenticated-user value produced by every authentication backend.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Which kind of backend produced an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    None,
    Local,
    Directory,
}

impl IdentityKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Local => "local",
            Self::Directory => "directory",
        }
    }
}

impl std::fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum AccountStatus {
    Disabled = 0,
    #[default]
    Enabled = 1,
}

/// ## Summary
/// An authenticated user.
///
/// Identities are plain values: backends build them fresh and the credential
/// cache rebuilds them from JSON, so nothing here is shared or mutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub kind: IdentityKind,
    pub unique_id: String,
    pub display_name: String,
    pub account: String,
    pub groups: BTreeSet<String>,
    pub status: AccountStatus,
}

impl Identity {
    /// Identity for an account when authentication is disabled.
    #[must_use]
    pub fn anonymous(account: &str) -> Self {
        Self {
            kind: IdentityKind::None,
            unique_id: String::new(),
            display_name: String::new(),
            account: account.to_string(),
            groups: BTreeSet::new(),
            status: AccountStatus::Enabled,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.status == AccountStatus::Enabled
    }

    #[must_use]
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }
}
