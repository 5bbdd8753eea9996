use serde::{Deserialize, Serialize};

/// Default authorization posture of the server when no rule grants access.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerPolicy {
    None,
    #[default]
    Read,
    Write,
}

impl ServerPolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl std::fmt::Display for ServerPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access granted by a single rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    #[default]
    Read,
    Write,
}

impl AccessMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }

    /// Whether this mode is enough for a request of the given kind.
    #[must_use]
    pub const fn permits(self, read_only: bool) -> bool {
        match self {
            Self::Write => true,
            Self::Read => read_only,
        }
    }
}

impl std::fmt::Display for AccessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a rule's path pattern is compared against the request path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    #[default]
    Prefix,
    Regex,
}

/// Which rule decides when several match the same path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RulePrecedence {
    /// The first rule, in declaration order, that matches and grants wins.
    /// Matching rules with an insufficient mode are skipped.
    #[default]
    FirstGrant,
    /// Rules are scanned newest first and the first path match is decisive.
    LastMatch,
}
