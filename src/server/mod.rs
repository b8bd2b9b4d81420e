//! Connection supervision.
//!
//! [`Server`] owns the listening socket and runs the accept loop; each
//! accepted connection is handed to a worker task tracked in a registry so
//! shutdown can wait for (or abort) every one of them.

pub mod listener;

pub use listener::{Server, run};

use tracing::error;

/// Resolves on the first SIGINT (Ctrl-C) or, on Unix, SIGTERM.
///
/// A signal whose handler cannot be installed is reported and never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
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
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = sigterm => {}
    }
}
