use anyhow::Result;
use config::Config;
use serde::Deserialize;

use crate::constants::{CONFIG_PATH_ENV, ENV_PREFIX};
use crate::error::{CoreError, CoreResult};
use crate::types::{AccessMode, MatchKind, RulePrecedence, ServerPolicy};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub users: UsersConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Root directory of the served file tree.
    pub scope: String,
    /// URL prefix under which the file tree is mounted.
    #[serde(default)]
    pub prefix: String,
    pub access_mode: ServerPolicy,
    pub realm: String,
    /// Trusted forwarding header carrying the real client address.
    pub client_ip_header: Option<String>,
    pub shutdown_grace_secs: u64,
}

impl ServerConfig {
    /// ## Summary
    /// Returns the bind address in the format "host:port".
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    Local,
    #[serde(alias = "ldap")]
    Directory,
    #[serde(alias = "misc")]
    Composite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    pub cache_ttl_secs: u64,
    pub cache_salt: String,
    pub cache_purge_secs: u64,
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub url: String,
    pub base_dn: String,
    pub bind_dn: String,
    pub bind_password: String,
    pub uid_attr: String,
    pub display_name_attr: String,
    /// Group DN whose members are returned when listing users.
    pub member_group: String,
    pub timeout_secs: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            url: "ldap://127.0.0.1:389".to_string(),
            base_dn: String::new(),
            bind_dn: String::new(),
            bind_password: String::new(),
            uid_attr: "sAMAccountName".to_string(),
            display_name_attr: "displayName".to_string(),
            member_group: "CN=all-staff,CN=Users,DC=example,DC=com".to_string(),
            timeout_secs: 5,
        }
    }
}

// Hand-written so the bind password never reaches the logs.
impl std::fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("url", &self.url)
            .field("base_dn", &self.base_dn)
            .field("bind_dn", &self.bind_dn)
            .field("uid_attr", &self.uid_attr)
            .field("display_name_attr", &self.display_name_attr)
            .field("member_group", &self.member_group)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsersConfig {
    #[serde(default)]
    pub local: Vec<LocalUserConfig>,
    #[serde(default)]
    pub directory: Vec<DirectoryUserConfig>,
}

#[derive(Clone, Deserialize)]
pub struct LocalUserConfig {
    pub account: String,
    #[serde(default)]
    pub name: Option<String>,
    pub password: String,
    /// Password algorithm: `plain` (default), `base64`, `bcrypt` or `argon2`.
    #[serde(default)]
    pub algo: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl LocalUserConfig {
    /// ## Summary
    /// Returns the distinct groups of this user, `group` merged into `groups`.
    #[must_use]
    pub fn all_groups(&self) -> Vec<String> {
        merge_groups(&self.groups, self.group.as_deref())
    }
}

impl std::fmt::Debug for LocalUserConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalUserConfig")
            .field("account", &self.account)
            .field("name", &self.name)
            .field("algo", &self.algo)
            .field("group", &self.group)
            .field("groups", &self.groups)
            .finish_non_exhaustive()
    }
}

/// Extra groups granted to a directory account on top of its `memberOf`.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryUserConfig {
    pub account: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl DirectoryUserConfig {
    #[must_use]
    pub fn all_groups(&self) -> Vec<String> {
        merge_groups(&self.groups, self.group.as_deref())
    }
}

fn merge_groups(groups: &[String], group: Option<&str>) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(groups.len() + 1);
    for g in groups.iter().map(String::as_str).chain(group) {
        if !g.is_empty() && !merged.iter().any(|m| m == g) {
            merged.push(g.to_string());
        }
    }
    merged
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RulesConfig {
    #[serde(default)]
    pub precedence: RulePrecedence,
    #[serde(default)]
    pub list: Vec<RuleConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleConfig {
    pub path: String,
    #[serde(default, rename = "match")]
    pub match_kind: MatchKind,
    #[serde(default)]
    pub access_mode: AccessMode,
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Settings {
    /// ## Summary
    /// Loads configuration from an optional file and `KUNAI__*` environment variables.
    /// Environment variables take precedence over file values.
    ///
    /// When `path` is `None`, the `KUNAI_CONFIG` variable is consulted, then a
    /// `kunai.{toml,yaml,json}` file in the working directory, if any.
    ///
    /// ## Errors
    /// Returns an error if building, deserializing or validating the configuration fails.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let file = match path.map(str::to_string).or_else(|| std::env::var(CONFIG_PATH_ENV).ok()) {
            Some(explicit) => config::File::with_name(&explicit).required(true),
            None => config::File::with_name("kunai").required(false),
        };

        let settings = Self::builder()?
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Settings>()?;

        settings.validate()?;
        Ok(settings)
    }

    /// ## Summary
    /// Parses settings from an in-memory YAML document, applying the same
    /// defaults and validation as [`Settings::load`].
    ///
    /// ## Errors
    /// Returns an error if the document is malformed or fails validation.
    pub fn from_yaml(document: &str) -> CoreResult<Self> {
        let settings = Self::builder()?
            .add_source(config::File::from_str(document, config::FileFormat::Yaml))
            .build()?
            .try_deserialize::<Settings>()?;

        settings.validate()?;
        Ok(settings)
    }

    fn builder() -> CoreResult<config::ConfigBuilder<config::builder::DefaultState>> {
        Ok(Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.scope", ".")?
            .set_default("server.prefix", "")?
            .set_default("server.access_mode", "read")?
            .set_default("server.realm", "Restricted")?
            .set_default("server.shutdown_grace_secs", 10)?
            .set_default("auth.method", "composite")?
            .set_default("auth.cache_ttl_secs", 900)?
            .set_default("auth.cache_salt", "kunai.server")?
            .set_default("auth.cache_purge_secs", 60)?
            .set_default("logging.level", "info")?)
    }

    /// ## Summary
    /// Checks cross-field constraints that serde cannot express.
    ///
    /// ## Errors
    /// Returns `InvalidConfiguration` describing the first violated constraint.
    pub fn validate(&self) -> CoreResult<()> {
        if matches!(self.auth.method, AuthMethod::Directory | AuthMethod::Composite)
            && self.directory.base_dn.is_empty()
        {
            return Err(CoreError::InvalidConfiguration(
                "directory.base_dn is required for directory or composite auth".to_string(),
            ));
        }

        if self.auth.cache_salt.is_empty() {
            return Err(CoreError::InvalidConfiguration(
                "auth.cache_salt must not be empty".to_string(),
            ));
        }

        for (i, user) in self.users.local.iter().enumerate() {
            if user.account.is_empty() {
                return Err(CoreError::InvalidConfiguration(format!(
                    "users.local[{i}].account must not be empty"
                )));
            }
        }

        for (i, rule) in self.rules.list.iter().enumerate() {
            if rule.path.is_empty() {
                return Err(CoreError::InvalidConfiguration(format!(
                    "rules.list[{i}].path must not be empty"
                )));
            }
            if rule.users.is_empty() && rule.groups.is_empty() {
                tracing::warn!(index = i, path = %rule.path, "Rule names no users or groups and will never apply");
            }
        }

        Ok(())
    }
}

/// ## Summary
/// Loads configuration from environment variables, `.env` and the config file.
///
/// ## Errors
/// Returns an error if loading or deserializing the configuration fails.
pub fn load_config(path: Option<&str>) -> Result<Settings> {
    dotenvy::dotenv().ok();

    Settings::load(path)
}
