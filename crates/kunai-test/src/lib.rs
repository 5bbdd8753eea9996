//! Kunai WebDAV gate - integration test support.
//!
//! This crate re-exports the workspace crates so integration tests can use
//! `kunai_test::` paths.

pub mod component {
    pub use kunai_core::{config, constants, types};
    pub use kunai_service::{auth, authz};
}

// Re-export top-level modules for convenience
pub mod app {
    pub use kunai_app::*;
}
