use crate::core_error::FtpError;
use crate::core_ftpcommand::ftpcommand::Command;
use crate::core_ftpcommand::handlers::{dispatch, Flow};
use crate::core_ftpcommand::reply::{Reply, ReplyCode};
use crate::core_network::{ControlChannel, DataChannelInitiator};
use crate::core_transfer::TransferEngine;
use crate::workdir::WorkingDir;
use crate::Config;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::watch;

const GREETING: &str = "ferroftp service ready.";

/// Server-side state of one client connection.
///
/// Everything a command can touch lives here: the control channel, the
/// working directory and the means to open a data channel. Sessions share
/// nothing mutable with each other.
pub struct Session {
    pub id: u64,
    pub control: ControlChannel,
    pub workdir: WorkingDir,
    pub config: Arc<Config>,
    pub engine: TransferEngine,
    data: Arc<dyn DataChannelInitiator>,
}

impl Session {
    pub fn new(
        id: u64,
        control: ControlChannel,
        workdir: WorkingDir,
        config: Arc<Config>,
        data: Arc<dyn DataChannelInitiator>,
    ) -> Self {
        let engine = TransferEngine::from_config(&config);
        Self {
            id,
            control,
            workdir,
            config,
            engine,
            data,
        }
    }

    pub async fn reply(&mut self, code: ReplyCode, text: impl Into<String>) -> Result<(), FtpError> {
        self.control.reply(code, text).await
    }

    pub async fn send_reply(&mut self, reply: &Reply) -> Result<(), FtpError> {
        self.control.send_reply(reply).await
    }

    /// Opens the data channel for one transfer towards this session's peer.
    pub async fn open_data_channel(&self) -> Result<TcpStream, FtpError> {
        self.data.open(self.control.peer_addr()).await
    }

    /// Serves the connection until QUIT, peer disconnect, a control channel
    /// error or the shutdown signal.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), FtpError> {
        let peer = self.control.peer_addr();
        info!("Session {} opened for {}", self.id, peer);

        let result = tokio::select! {
            result = self.serve() => result,
            _ = wait_for_shutdown(&mut shutdown) => {
                info!("Session {}: server is shutting down", self.id);
                Ok(())
            }
        };

        if let Err(e) = self.control.shutdown().await {
            debug!("Session {}: control shutdown: {}", self.id, e);
        }

        match &result {
            Ok(()) => info!("Session {} closed for {}", self.id, peer),
            Err(e) => warn!("Session {} for {} ended with error: {}", self.id, peer, e),
        }
        result
    }

    async fn serve(&mut self) -> Result<(), FtpError> {
        self.reply(ReplyCode::ServiceReady, GREETING).await?;

        let idle = self.config.timeouts.idle();
        loop {
            let line = match self.control.read_line_timeout(idle).await? {
                Some(line) => line,
                None => {
                    debug!("Session {}: peer closed the control channel", self.id);
                    return Ok(());
                }
            };

            let command = Command::parse(&line);
            debug!("Session {}: {:?}", self.id, command);
            if dispatch(self, command).await? == Flow::Quit {
                return Ok(());
            }
        }
    }
}

/// Resolves once the flag turns true. A dropped sender never resolves.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
