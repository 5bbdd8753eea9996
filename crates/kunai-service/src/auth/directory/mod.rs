//! Directory (LDAP-style) authentication.
//!
//! Credentials are never compared locally: the account is resolved to an
//! entry with a service-account session, then the directory itself is asked
//! to bind as that entry with the caller's password.
//!
//! The wire client sits behind [`DirectoryConnector`] so the lookup and
//! group-merging logic can be exercised without a server; [`ldap`] provides
//! the production connector.

pub mod ldap;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use salvo::async_trait;

use kunai_core::config::{DirectoryConfig, DirectoryUserConfig};

use super::backend::{AuthBackend, AuthError, AuthResult};
use super::identity::{AccountStatus, Identity, IdentityKind};

/// `userAccountControl` value of a disabled account (512 is a normal one).
pub const ACCOUNT_DISABLED: &str = "514";

const ACCOUNT_CONTROL_ATTR: &str = "userAccountControl";
const MEMBER_OF_ATTR: &str = "memberOf";
const OBJECT_GUID_ATTR: &str = "objectGUID";

/// One search result.
#[derive(Debug, Clone, Default)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attrs: HashMap<String, Vec<String>>,
    pub bin_attrs: HashMap<String, Vec<Vec<u8>>>,
}

impl DirectoryEntry {
    /// Attribute names are case-insensitive on the wire.
    #[must_use]
    pub fn values(&self, name: &str) -> &[String] {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map_or(&[], |(_, v)| v.as_slice())
    }

    #[must_use]
    pub fn first(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(String::as_str)
    }

    #[must_use]
    pub fn raw_first(&self, name: &str) -> Option<&[u8]> {
        self.bin_attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| v.first())
            .map(Vec::as_slice)
            .or_else(|| self.first(name).map(str::as_bytes))
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.first(ACCOUNT_CONTROL_ATTR) == Some(ACCOUNT_DISABLED)
    }
}

/// A directory session already bound as the service account.
#[async_trait]
pub trait DirectorySession: Send {
    /// ## Summary
    /// Subtree search under `base_dn`.
    ///
    /// ## Errors
    /// `BackendUnavailable` if the search cannot be performed.
    async fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attrs: &[String],
    ) -> AuthResult<Vec<DirectoryEntry>>;

    /// ## Summary
    /// Re-binds the session as `dn`.
    ///
    /// ## Errors
    /// `InvalidCredential` if the directory rejects the credential,
    /// `BackendUnavailable` for any other failure.
    async fn bind(&mut self, dn: &str, password: &str) -> AuthResult<()>;

    /// Releases the session; failures are only logged.
    async fn close(self: Box<Self>);
}

/// Opens service-account sessions.
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    /// ## Summary
    /// Connects and binds with the service account.
    ///
    /// ## Errors
    /// `BackendUnavailable` if the directory cannot be reached or rejects the
    /// service account.
    async fn open(&self) -> AuthResult<Box<dyn DirectorySession>>;
}

/// ## Summary
/// Backend verifying credentials against an external directory.
pub struct DirectoryBackend {
    connector: Arc<dyn DirectoryConnector>,
    base_dn: String,
    uid_attr: String,
    display_name_attr: String,
    member_group: String,
    extra_groups: HashMap<String, Vec<String>>,
}

impl DirectoryBackend {
    #[must_use]
    pub fn new(
        connector: Arc<dyn DirectoryConnector>,
        config: &DirectoryConfig,
        users: &[DirectoryUserConfig],
    ) -> Self {
        let extra_groups = users
            .iter()
            .map(|u| (u.account.to_ascii_lowercase(), u.all_groups()))
            .collect();

        Self {
            connector,
            base_dn: config.base_dn.clone(),
            uid_attr: config.uid_attr.clone(),
            display_name_attr: config.display_name_attr.clone(),
            member_group: config.member_group.clone(),
            extra_groups,
        }
    }

    fn attributes(&self) -> Vec<String> {
        vec![
            OBJECT_GUID_ATTR.to_string(),
            self.uid_attr.clone(),
            self.display_name_attr.clone(),
            ACCOUNT_CONTROL_ATTR.to_string(),
            MEMBER_OF_ATTR.to_string(),
        ]
    }

    fn account_filter(&self, account: &str) -> String {
        format!(
            "(&(objectClass=organizationalPerson)({}={}))",
            self.uid_attr,
            ::ldap3::ldap_escape(account)
        )
    }

    fn members_filter(&self) -> String {
        format!(
            "(&(objectClass=organizationalPerson)(memberOf={}))",
            ::ldap3::ldap_escape(&self.member_group)
        )
    }

    /// Finds the single enabled entry for an account.
    async fn find_entry(
        &self,
        session: &mut dyn DirectorySession,
        account: &str,
    ) -> AuthResult<DirectoryEntry> {
        let mut entries = session
            .search(&self.base_dn, &self.account_filter(account), &self.attributes())
            .await?;

        if entries.len() != 1 {
            tracing::debug!(matches = entries.len(), "Directory lookup did not find exactly one entry");
            return Err(AuthError::NoSuchUser);
        }
        let entry = entries.remove(0);

        if entry.is_disabled() {
            tracing::debug!(dn = %entry.dn, "Directory account is disabled");
            return Err(AuthError::NoSuchUser);
        }

        Ok(entry)
    }

    fn identity_from_entry(&self, entry: &DirectoryEntry) -> Identity {
        let mut groups: BTreeSet<String> = entry.values(MEMBER_OF_ATTR).iter().cloned().collect();

        let uid = entry.first(&self.uid_attr).unwrap_or_default();
        for key in [entry.dn.as_str(), uid] {
            if let Some(extra) = self.extra_groups.get(&key.to_ascii_lowercase()) {
                groups.extend(extra.iter().cloned());
            }
        }

        let unique_id = entry
            .raw_first(OBJECT_GUID_ATTR)
            .and_then(|raw| uuid::Uuid::from_slice(raw).ok())
            .map_or_else(|| entry.dn.clone(), |guid| guid.to_string());

        Identity {
            kind: IdentityKind::Directory,
            unique_id,
            display_name: entry
                .first(&self.display_name_attr)
                .unwrap_or_default()
                .to_string(),
            account: entry.dn.clone(),
            groups,
            status: if entry.is_disabled() {
                AccountStatus::Disabled
            } else {
                AccountStatus::Enabled
            },
        }
    }
}

#[async_trait]
impl AuthBackend for DirectoryBackend {
    fn name(&self) -> &'static str {
        "directory"
    }

    #[tracing::instrument(skip(self, password))]
    async fn login(&self, account: &str, password: &str) -> AuthResult<Identity> {
        // An empty password would be an anonymous bind, which most servers accept.
        if password.is_empty() {
            return Err(AuthError::InvalidCredential);
        }

        let mut session = self.connector.open().await?;
        let result = async {
            let entry = self.find_entry(session.as_mut(), account).await?;
            session.bind(&entry.dn, password).await?;
            Ok(self.identity_from_entry(&entry))
        }
        .await;
        session.close().await;

        if let Ok(identity) = &result {
            tracing::debug!(dn = %identity.account, "Directory login succeeded");
        }
        result
    }

    #[tracing::instrument(skip(self))]
    async fn get_user(&self, account: &str) -> AuthResult<Identity> {
        let mut session = self.connector.open().await?;
        let result = self
            .find_entry(session.as_mut(), account)
            .await
            .map(|entry| self.identity_from_entry(&entry));
        session.close().await;
        result
    }

    #[tracing::instrument(skip(self))]
    async fn list_users(&self) -> AuthResult<Vec<Identity>> {
        let mut session = self.connector.open().await?;
        let result = session
            .search(&self.base_dn, &self.members_filter(), &self.attributes())
            .await;
        session.close().await;

        Ok(result?
            .iter()
            .filter(|entry| !entry.is_disabled())
            .map(|entry| self.identity_from_entry(entry))
            .collect())
    }
}
