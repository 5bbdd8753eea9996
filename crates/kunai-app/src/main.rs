use std::sync::Arc;
use std::time::Duration;

use salvo::Listener;
use salvo::conn::TcpListener;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt};

use kunai_app::app::api::routes;
use kunai_app::files::LocalDavFiles;
use kunai_app::state::AppState;
use kunai_core::config::load_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (filter_layer, filter_handle) = reload::Layer::new(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();

    tracing::info!("Starting Kunai WebDAV server");

    let config = load_config(std::env::args().nth(1).as_deref())?;

    tracing::info!(config = ?config, "Configuration loaded");

    if let Ok(filter) = EnvFilter::try_new(config.logging.level.as_str()) {
        if let Err(e) = filter_handle.modify(|current| *current = filter) {
            tracing::warn!(error = %e, "Failed to update log filter from config");
        }
    } else {
        tracing::warn!(level = %config.logging.level, "Invalid log level in config, keeping debug");
    }

    let files = Arc::new(LocalDavFiles::new(
        &config.server.scope,
        &config.server.prefix,
    )?);
    let bind_addr = config.server.bind_addr();
    let grace = Duration::from_secs(config.server.shutdown_grace_secs);
    let purge_every = Duration::from_secs(config.auth.cache_purge_secs.max(1));

    let state = Arc::new(AppState::from_settings(config, files)?);

    let backend = state.backend.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(purge_every);
        loop {
            ticker.tick().await;
            backend.purge_expired();
        }
    });

    let acceptor = TcpListener::new(bind_addr.clone()).bind().await;
    let server = salvo::Server::new(acceptor);
    let handle = server.handle();

    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!(grace_secs = grace.as_secs(), "Shutting down, draining in-flight requests");
        handle.stop_graceful(grace);
    });

    tracing::info!("Server listening on {bind_addr}");

    server.serve(routes(state)).await;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on ctrl-c, or on SIGTERM where available.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
