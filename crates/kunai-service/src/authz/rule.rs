use regex::Regex;

use kunai_core::config::RuleConfig;
use kunai_core::types::{AccessMode, MatchKind};

use crate::error::{ServiceError, ServiceResult};

/// Path predicate of a compiled rule.
#[derive(Debug, Clone)]
pub enum PathMatcher {
    Prefix(String),
    Regex(Regex),
}

impl PathMatcher {
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Prefix(prefix) => path.starts_with(prefix.as_str()),
            Self::Regex(re) => re.is_match(path),
        }
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        match self {
            Self::Prefix(prefix) => prefix,
            Self::Regex(re) => re.as_str(),
        }
    }
}

/// ## Summary
/// A rule ready for evaluation: path predicate plus the access it grants.
#[derive(Debug, Clone)]
pub struct AccessRule {
    pub matcher: PathMatcher,
    pub access: AccessMode,
}

impl AccessRule {
    /// ## Summary
    /// Compiles a configured rule.
    ///
    /// ## Errors
    /// Returns `InvalidConfiguration` if a regex rule does not compile.
    pub fn compile(config: &RuleConfig) -> ServiceResult<Self> {
        let matcher = match config.match_kind {
            MatchKind::Prefix => PathMatcher::Prefix(config.path.clone()),
            MatchKind::Regex => PathMatcher::Regex(Regex::new(&config.path).map_err(|e| {
                ServiceError::InvalidConfiguration(format!(
                    "invalid rule pattern {:?}: {e}",
                    config.path
                ))
            })?),
        };

        Ok(Self {
            matcher,
            access: config.access_mode,
        })
    }

    /// Whether this rule decides `path` in favour of a request of the given kind.
    #[must_use]
    pub fn grants(&self, path: &str, read_only: bool) -> bool {
        self.matcher.matches(path) && self.access.permits(read_only)
    }
}
