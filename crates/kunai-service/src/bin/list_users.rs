use anyhow::Context;
use tracing_subscriber::EnvFilter;

use kunai_core::config::load_config;
use kunai_service::auth::{AuthBackend, build_raw_backend};

/// Prints every identity known to the configured backend, one JSON object per line.
///
/// Usage: `kunai-list-users [config-path]`
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let path = std::env::args().nth(1);
    let settings = load_config(path.as_deref())?;
    let backend = build_raw_backend(&settings)?;

    let users = backend
        .list_users()
        .await
        .with_context(|| format!("listing users from {} backend", backend.name()))?;

    for user in &users {
        println!("{}", serde_json::to_string(user)?);
    }
    tracing::info!(count = users.len(), "Listed users");

    Ok(())
}
