use kunai_core::config::Settings;
use kunai_core::types::{RulePrecedence, ServerPolicy};

use super::index::RuleIndex;
use crate::auth::Identity;
use crate::error::{ServiceError, ServiceResult};

/// Methods that never modify the tree.
const READ_ONLY_METHODS: &[&str] = &["GET", "HEAD", "OPTIONS", "PROPFIND"];

#[must_use]
pub fn is_read_only(method: &str) -> bool {
    READ_ONLY_METHODS
        .iter()
        .any(|m| m.eq_ignore_ascii_case(method))
}

/// ## Summary
/// Decides whether `identity` may perform `method` on `path`.
///
/// The server policy is a floor: `write` allows everything and `read` allows
/// every read-only method. Otherwise the identity's own rules are scanned in
/// declaration order, then its groups' rules, and the first rule that matches
/// the path *and* grants enough access allows the request. A matching rule
/// that only grants read does not stop the scan for a write request.
#[must_use]
pub fn is_allowed(
    policy: ServerPolicy,
    index: &RuleIndex,
    identity: &Identity,
    method: &str,
    path: &str,
) -> bool {
    let read_only = is_read_only(method);

    if policy_allows(policy, read_only) {
        return true;
    }

    index
        .account_rules(&identity.account)
        .chain(index.group_rules(&identity.groups))
        .any(|rule| rule.grants(path, read_only))
}

/// ## Summary
/// Alternative precedence: applicable rules are scanned newest first and the
/// first one whose path matches decides, whether it grants or not.
#[must_use]
pub fn is_allowed_last_match(
    policy: ServerPolicy,
    index: &RuleIndex,
    identity: &Identity,
    method: &str,
    path: &str,
) -> bool {
    let read_only = is_read_only(method);

    if policy_allows(policy, read_only) {
        return true;
    }

    index
        .applicable_positions(&identity.account, &identity.groups)
        .into_iter()
        .rev()
        .filter_map(|position| index.rule(position))
        .find(|rule| rule.matcher.matches(path))
        .is_some_and(|rule| rule.access.permits(read_only))
}

const fn policy_allows(policy: ServerPolicy, read_only: bool) -> bool {
    match policy {
        ServerPolicy::Write => true,
        ServerPolicy::Read => read_only,
        ServerPolicy::None => false,
    }
}

/// ## Summary
/// Server policy, rule precedence and rule index bundled for the request path.
#[derive(Debug, Clone)]
pub struct PrivilegeEvaluator {
    policy: ServerPolicy,
    precedence: RulePrecedence,
    index: RuleIndex,
}

impl PrivilegeEvaluator {
    #[must_use]
    pub const fn new(policy: ServerPolicy, precedence: RulePrecedence, index: RuleIndex) -> Self {
        Self {
            policy,
            precedence,
            index,
        }
    }

    /// ## Summary
    /// Builds the evaluator from `server.access_mode` and the `rules` section.
    ///
    /// ## Errors
    /// Returns `InvalidConfiguration` if a rule pattern does not compile.
    pub fn from_settings(settings: &Settings) -> ServiceResult<Self> {
        let index = RuleIndex::build(&settings.rules.list)?;
        tracing::info!(
            policy = %settings.server.access_mode,
            rules = index.len(),
            "Authorization rules loaded"
        );
        Ok(Self::new(
            settings.server.access_mode,
            settings.rules.precedence,
            index,
        ))
    }

    #[must_use]
    pub const fn policy(&self) -> ServerPolicy {
        self.policy
    }

    #[must_use]
    pub fn is_allowed(&self, identity: &Identity, method: &str, path: &str) -> bool {
        let allowed = match self.precedence {
            RulePrecedence::FirstGrant => {
                is_allowed(self.policy, &self.index, identity, method, path)
            }
            RulePrecedence::LastMatch => {
                is_allowed_last_match(self.policy, &self.index, identity, method, path)
            }
        };

        if !allowed {
            tracing::debug!(account = %identity.account, method, path, "No rule grants access");
        }
        allowed
    }

    /// ## Summary
    /// [`Self::is_allowed`] as a result, for callers that propagate denials.
    ///
    /// ## Errors
    /// Returns `AccessDenied` naming the method and path when no rule grants access.
    pub fn authorize(&self, identity: &Identity, method: &str, path: &str) -> ServiceResult<()> {
        if self.is_allowed(identity, method, path) {
            Ok(())
        } else {
            Err(ServiceError::AccessDenied(format!("{method} {path}")))
        }
    }
}
