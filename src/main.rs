//! linekv server entry point.
//!
//! Reads the configuration, binds the listener and runs the accept loop
//! until Ctrl+C or SIGTERM.

use anyhow::Context;
use linekv::commands::CommandHandler;
use linekv::config::{Action, Config, USAGE};
use linekv::connection::ConnectionStats;
use linekv::storage::{StorageEngine, NUM_BUCKETS};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn print_banner(config: &Config) {
    println!(
        r#"
linekv v{} - In-Memory Key-Value Store
──────────────────────────────────────────
Server started on {}
Ready to accept connections.

Use Ctrl+C to shutdown gracefully.
"#,
        linekv::VERSION,
        config.bind_address()
    );
}

/// Resolves once Ctrl+C or, on Unix, SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match Config::load() {
        Ok(Action::Run(config)) => config,
        Ok(Action::Help) => {
            println!("{}", USAGE);
            return Ok(());
        }
        Ok(Action::Version) => {
            println!("linekv version {}", linekv::VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("{}", USAGE);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let storage = Arc::new(StorageEngine::new());
    info!(buckets = NUM_BUCKETS, "Storage engine initialized");

    let handler = CommandHandler::new(Arc::clone(&storage));
    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;

    print_banner(&config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = tokio::spawn(linekv::server::serve(
        listener,
        handler,
        Arc::clone(&stats),
        shutdown_rx,
    ));

    shutdown_signal().await;
    info!("Shutdown signal received, stopping server...");
    if shutdown_tx.send(true).is_err() {
        warn!("Accept loop already stopped");
    }
    server.await.context("accept loop panicked")?;

    info!(
        keys = storage.count_keys(),
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        commands = stats.commands_processed.load(Ordering::Relaxed),
        "Server shutdown complete"
    );
    Ok(())
}
