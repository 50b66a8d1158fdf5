//! Process signals that stop the server

use tracing::{info, warn};

/// Resolves on the first of SIGINT and SIGTERM
///
/// A handler that cannot be installed never fires; the other still can.
pub async fn shutdown_signal() {
    let signal = tokio::select! {
        _ = interrupt() => "SIGINT",
        _ = terminate() => "SIGTERM",
    };
    info!(signal, "Shutting down");
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for SIGINT");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!(error = %e, "Cannot listen for SIGTERM");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
