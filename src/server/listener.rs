use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::Config;
use crate::http::connection::{ServeContext, handle_connection};
use crate::metrics::AccessLog;
use crate::server::shutdown_signal;

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// The accept loop and everything it owns: the listening socket, the access
/// log, the admission gate and the registry of running workers.
pub struct Server {
    listener: TcpListener,
    ctx: Arc<ServeContext>,
    access_log: Arc<AccessLog>,
    gate: Arc<Semaphore>,
    drain_timeout: Duration,
    next_id: u64,
}

impl Server {
    /// Binds the listening socket and opens the access log.
    ///
    /// Every error here is fatal: the server never starts half-configured.
    pub async fn bind(cfg: &Config) -> anyhow::Result<Self> {
        let addr = tokio::net::lookup_host(&cfg.server.listen_addr)
            .await
            .with_context(|| format!("resolving {}", cfg.server.listen_addr))?
            .next()
            .with_context(|| format!("no address for {}", cfg.server.listen_addr))?;

        let listener = listen(addr, cfg.server.backlog)
            .with_context(|| format!("binding {addr}"))?;

        let access_log = Arc::new(
            AccessLog::open(&cfg.log.path)
                .await
                .with_context(|| format!("opening access log {}", cfg.log.path.display()))?,
        );

        let ctx = ServeContext::new(cfg, Arc::clone(&access_log)).with_context(|| {
            format!("resolving server root {}", cfg.static_files.root.display())
        })?;

        info!(
            addr = %listener.local_addr()?,
            root = %ctx.root().display(),
            log = %access_log.path().display(),
            max_workers = cfg.server.max_workers,
            "Listening"
        );

        Ok(Self {
            listener,
            ctx: Arc::new(ctx),
            access_log,
            gate: Arc::new(Semaphore::new(cfg.server.max_workers)),
            drain_timeout: cfg.server.drain_timeout(),
            next_id: 0,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until `shutdown` resolves, then drains.
    ///
    /// Each connection gets its own worker task once a permit from the
    /// admission gate is available; connections beyond the limit wait in the
    /// kernel backlog. On shutdown the listening socket is closed first, then
    /// in-flight workers get `drain_timeout` to finish before being aborted,
    /// and finally the access log is flushed and closed.
    pub async fn serve<F>(mut self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut workers = JoinSet::new();
        let mut permit = None;

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!(in_flight = workers.len(), "Shutdown signal received");
                    break;
                }

                Some(res) = workers.join_next(), if !workers.is_empty() => reap(res),

                acquired = Arc::clone(&self.gate).acquire_owned(), if permit.is_none() => {
                    match acquired {
                        Ok(p) => permit = Some(p),
                        // Only happens if the gate is closed, which nothing does.
                        Err(_) => break,
                    }
                }

                res = self.listener.accept(), if permit.is_some() => {
                    let (stream, peer) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            // Errors like EMFILE persist until something
                            // frees a descriptor; don't spin on them.
                            error!(error = %e, "Failed to accept connection");
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                            continue;
                        }
                    };

                    let id = self.next_id;
                    self.next_id += 1;

                    let held = permit.take();
                    let ctx = Arc::clone(&self.ctx);
                    let span = info_span!("conn", id, client = %peer);

                    workers.spawn(
                        async move {
                            let _permit = held;
                            debug!("Accepted connection");
                            handle_connection(stream, peer, ctx).await;
                        }
                        .instrument(span),
                    );
                }
            }
        }

        drop(self.listener);

        let drain = async {
            while let Some(res) = workers.join_next().await {
                reap(res);
            }
        };
        if tokio::time::timeout(self.drain_timeout, drain).await.is_err() {
            warn!(remaining = workers.len(), "Drain timeout elapsed, aborting workers");
            workers.shutdown().await;
        }

        self.access_log
            .close()
            .await
            .context("closing access log")?;

        info!("Server stopped");
        Ok(())
    }
}

/// Binds the configured address and serves until SIGINT or SIGTERM.
pub async fn run(cfg: &Config) -> anyhow::Result<()> {
    Server::bind(cfg).await?.serve(shutdown_signal()).await
}

fn listen(addr: SocketAddr, backlog: u32) -> std::io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };

    #[cfg(unix)]
    socket.set_reuseaddr(true)?;

    socket.bind(addr)?;
    socket.listen(backlog)
}

fn reap(res: Result<(), JoinError>) {
    match res {
        Ok(()) => {}
        Err(e) if e.is_panic() => error!(error = %e, "Connection worker panicked"),
        Err(e) => debug!(error = %e, "Connection worker cancelled"),
    }
}
