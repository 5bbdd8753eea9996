use std::collections::{BTreeSet, HashMap};

use kunai_core::config::RuleConfig;

use super::rule::AccessRule;
use crate::error::ServiceResult;

/// ## Summary
/// Account and group lookup tables over the configured rules.
///
/// Rules live once in `rules` in declaration order; the maps hold indices into
/// it. Built at startup and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct RuleIndex {
    rules: Vec<AccessRule>,
    by_account: HashMap<String, Vec<usize>>,
    by_group: HashMap<String, Vec<usize>>,
}

impl RuleIndex {
    /// ## Summary
    /// Compiles every rule and registers it under each account and group it names.
    ///
    /// ## Errors
    /// Returns `InvalidConfiguration` for the first rule that fails to compile.
    pub fn build(configs: &[RuleConfig]) -> ServiceResult<Self> {
        let mut index = Self::default();

        for (position, config) in configs.iter().enumerate() {
            index.rules.push(AccessRule::compile(config)?);

            for account in &config.users {
                register(&mut index.by_account, account, position);
            }
            for group in &config.groups {
                register(&mut index.by_group, group, position);
            }
        }

        tracing::debug!(
            rules = index.rules.len(),
            accounts = index.by_account.len(),
            groups = index.by_group.len(),
            "Rule index built"
        );
        Ok(index)
    }

    /// Rules naming `account`, in declaration order.
    pub fn account_rules(&self, account: &str) -> impl Iterator<Item = &AccessRule> {
        self.by_account
            .get(account)
            .into_iter()
            .flatten()
            .map(|&i| &self.rules[i])
    }

    /// Union of the rules of every group in `groups`, in declaration order,
    /// each rule at most once.
    pub fn group_rules<'a, I>(&self, groups: I) -> impl Iterator<Item = &AccessRule>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let positions: BTreeSet<usize> = groups
            .into_iter()
            .filter_map(|g| self.by_group.get(g))
            .flatten()
            .copied()
            .collect();
        positions.into_iter().map(|i| &self.rules[i])
    }

    /// Every rule that applies to the account or any of its groups, as
    /// declaration positions in ascending order.
    pub(crate) fn applicable_positions<'a, I>(&self, account: &str, groups: I) -> BTreeSet<usize>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut positions: BTreeSet<usize> = self
            .by_account
            .get(account)
            .into_iter()
            .flatten()
            .copied()
            .collect();
        positions.extend(
            groups
                .into_iter()
                .filter_map(|g| self.by_group.get(g))
                .flatten()
                .copied(),
        );
        positions
    }

    pub(crate) fn rule(&self, position: usize) -> Option<&AccessRule> {
        self.rules.get(position)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn register(map: &mut HashMap<String, Vec<usize>>, key: &str, position: usize) {
    let list = map.entry(key.to_string()).or_default();
    // A rule naming the same account twice is registered once.
    if list.last() != Some(&position) {
        list.push(position);
    }
}
