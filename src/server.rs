//! TCP Accept Loop
//!
//! Accepts clients and spawns one connection task per client. The loop runs
//! until the shutdown channel flips to `true`; the listener is then dropped
//! so no new clients get in, while connection tasks that are already running
//! keep going until their clients leave.

use crate::commands::CommandHandler;
use crate::connection::{handle_connection, ConnectionStats};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Pause after a failed `accept`, e.g. when the process is out of file
/// descriptors
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts connections until a shutdown is signalled.
pub async fn serve(
    listener: TcpListener,
    handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    mut shutdown: watch::Receiver<bool>,
) {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "Accepting connections");
    }

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    debug!(client = %addr, "Accepted connection");
                    tokio::spawn(handle_connection(
                        stream,
                        addr,
                        handler.clone(),
                        Arc::clone(&stats),
                    ));
                }
                Err(e) => accept_failed(&e).await,
            },
            result = shutdown.changed() => {
                if result.is_err() || *shutdown.borrow() {
                    info!("Shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }
    }

    info!(
        active = stats
            .active_connections
            .load(std::sync::atomic::Ordering::Relaxed),
        "Accept loop stopped"
    );
}

/// Logs a failed `accept` and waits before the next attempt.
async fn accept_failed(e: &std::io::Error) {
    error!(error = %e, "Failed to accept connection");
    tokio::time::sleep(ACCEPT_BACKOFF).await;
}
