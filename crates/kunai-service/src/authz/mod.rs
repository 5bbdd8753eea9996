//! Path-based authorization.
//!
//! Rules from configuration are compiled once into a [`RuleIndex`];
//! [`PrivilegeEvaluator`] combines it with the server policy to decide each
//! request.

pub mod evaluator;
pub mod index;
pub mod rule;

pub use evaluator::{PrivilegeEvaluator, is_allowed, is_allowed_last_match, is_read_only};
pub use index::RuleIndex;
pub use rule::{AccessRule, PathMatcher};
