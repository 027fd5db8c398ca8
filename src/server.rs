use crate::config::log_config;
use crate::constants::{ACCEPT_ERROR_BACKOFF_MS, SHUTDOWN_GRACE_SECS};
use crate::core_error::FtpError;
use crate::core_network::network::listen_on;
use crate::core_network::{ControlChannel, DataChannelInitiator, FixedPortInitiator};
use crate::session::Session;
use crate::workdir::WorkingDir;
use crate::Config;
use anyhow::Result;
use log::{debug, error, info, warn};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;

/// The listening side: accepts control connections and runs one supervised
/// session task per connection.
pub struct Server {
    listener: TcpListener,
    config: Arc<Config>,
    initiator: Arc<dyn DataChannelInitiator>,
    workdir: WorkingDir,
}

impl Server {
    /// Validates the root directory and starts listening. Nothing is
    /// accepted until [`run`](Self::run) or [`run_until`](Self::run_until).
    pub async fn bind(config: Config) -> Result<Self, FtpError> {
        let workdir =
            WorkingDir::new(&config.server.root_dir).map_err(|source| FtpError::InvalidRoot {
                path: config.server.root_dir.clone(),
                source,
            })?;
        let listener = listen_on(
            &config.server.listen_address,
            config.server.listen_port,
            config.server.backlog,
        )
        .await?;
        let initiator = Arc::new(FixedPortInitiator::from_config(&config));

        Ok(Self {
            listener,
            config: Arc::new(config),
            initiator,
            workdir,
        })
    }

    /// Replaces the default fixed-port data channel initiator.
    pub fn with_initiator(mut self, initiator: Arc<dyn DataChannelInitiator>) -> Self {
        self.initiator = initiator;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves until Ctrl-C.
    pub async fn run(self) {
        self.run_until(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Ctrl-C received"),
                Err(e) => {
                    error!("Unable to listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        })
        .await
    }

    /// Accepts connections until `shutdown` resolves, then signals every
    /// session and gives them a grace period before aborting the rest.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let (notify, watcher) = watch::channel(false);
        let mut sessions: JoinSet<Result<(), FtpError>> = JoinSet::new();
        let max_line = self.config.transfer.max_line_length;
        let mut next_id: u64 = 0;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => {
                    let (stream, addr) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            back_off_after_accept_error(&e).await;
                            continue;
                        }
                    };
                    let control = match ControlChannel::new(stream, max_line) {
                        Ok(control) => control,
                        Err(e) => {
                            warn!("Dropping connection from {}: {}", addr, e);
                            continue;
                        }
                    };
                    next_id += 1;
                    info!("Accepted connection from: {} (session {})", addr, next_id);
                    let session = Session::new(
                        next_id,
                        control,
                        self.workdir.clone(),
                        Arc::clone(&self.config),
                        Arc::clone(&self.initiator),
                    );
                    sessions.spawn(session.run(watcher.clone()));
                }
                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = joined {
                        error!("Session task failed: {}", e);
                    }
                }
            }
        }

        drop(self.listener);
        info!("Shutting down, {} session(s) still open", sessions.len());
        if notify.send(true).is_err() {
            debug!("No session is listening for shutdown");
        }

        let grace = Duration::from_secs(SHUTDOWN_GRACE_SECS);
        let drained = tokio::time::timeout(grace, async {
            while sessions.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                "Aborting {} session(s) still running after {:?}",
                sessions.len(),
                grace
            );
            sessions.shutdown().await;
        }
        info!("Server stopped.");
    }
}

/// Logs a failed accept and pauses before the next one.
async fn back_off_after_accept_error(e: &io::Error) {
    error!("Failed to accept connection: {}", e);
    tokio::time::sleep(Duration::from_millis(ACCEPT_ERROR_BACKOFF_MS)).await;
}

/// Runs the FTP server with the provided configuration until Ctrl-C.
///
/// Startup failures (invalid root, port in use) are returned; everything
/// after that is logged.
pub async fn run(config: Config) -> Result<()> {
    info!("Starting server with config:");
    log_config(&config);

    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to start server: {}", e);
            return Err(e.into());
        }
    };
    info!("Server listening on {}", server.local_addr()?);

    server.run().await;
    Ok(())
}
