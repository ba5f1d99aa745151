//! Process-level glue: serve until a stop signal, then shut down gracefully.
//!
//! # Graceful shutdown and Kubernetes
//!
//! When Kubernetes terminates a pod it sends **SIGTERM** and waits
//! `terminationGracePeriodSeconds` (default 30 s) before sending SIGKILL.
//! Keep `APP_SHUTDOWN_TIMEOUT_SECS` below that so in-flight requests get a
//! chance to finish before the kill.

use std::future::Future;

use tracing::{error, info};

use crate::config::ServerConfig;
use crate::error::Error;
use crate::server::Server;

/// Serves `server` as described by `config` until `signal` resolves, then
/// shuts down within the configured timeout.
///
/// A normal stop, including one initiated elsewhere through
/// [`Server::shutdown`] or [`Server::close`], returns `Ok(())`. Transport
/// errors from the listen call are returned as is; a failed shutdown is
/// logged and the listen outcome is still returned.
pub async fn run(
    server: &Server,
    config: &ServerConfig,
    signal: impl Future<Output = ()>,
) -> Result<(), Error> {
    let addr = config.listen_addr();
    info!(%addr, tls = config.tls().is_some(), "server listen");

    let serve = async {
        match config.tls() {
            Some((cert, key)) => server.listen_tls(addr, cert, key).await,
            None => server.listen(addr).await,
        }
    };
    tokio::pin!(serve);

    let err = tokio::select! {
        err = &mut serve => err,
        () = signal => {
            let deadline = tokio::time::sleep(config.shutdown_timeout());
            let (shutdown, err) = tokio::join!(server.shutdown(deadline), &mut serve);
            if let Err(e) = shutdown {
                error!("server shutdown: {e}");
            }
            err
        }
    };

    if err.is_server_closed() {
        Ok(())
    } else {
        error!("server listen: {err}");
        Err(err)
    }
}

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** (sent by `kubectl` and the
/// Kubernetes control plane) and **SIGINT** (Ctrl-C, for local dev).
/// On Windows only Ctrl-C is available. If a handler cannot be installed
/// the corresponding arm never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    // `pending()` never resolves: the SIGTERM arm is disabled off Unix.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => info!("received Ctrl-C"),
        () = sigterm => info!("received SIGTERM"),
    }
}
