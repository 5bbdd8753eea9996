pub mod app;
pub mod error;
pub mod files;
pub mod middleware;
pub mod state;
