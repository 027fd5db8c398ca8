use super::network::{connect_to, listen_on};
use crate::core_error::FtpError;
use crate::Config;
use async_trait::async_trait;
use log::debug;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

/// Server side of data channel establishment: produces the outbound
/// connection for one transfer.
#[async_trait]
pub trait DataChannelInitiator: Send + Sync {
    /// `peer` is the control channel peer the transfer belongs to.
    async fn open(&self, peer: SocketAddr) -> Result<TcpStream, FtpError>;
}

/// Client side of data channel establishment: prepares to receive the
/// server's connection before the transfer command is sent.
#[async_trait]
pub trait DataChannelAcceptor: Send + Sync {
    async fn listen(&self) -> Result<PendingDataChannel, FtpError>;
}

/// A bound listener waiting for exactly one data connection.
#[derive(Debug)]
pub struct PendingDataChannel {
    listener: TcpListener,
}

impl PendingDataChannel {
    pub fn new(listener: TcpListener) -> Self {
        Self { listener }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts the single data connection; the listener is closed afterwards.
    pub async fn accept(self, timeout: Option<Duration>) -> Result<TcpStream, FtpError> {
        let accepted = match timeout {
            Some(limit) => tokio::time::timeout(limit, self.listener.accept())
                .await
                .map_err(|_| FtpError::DataChannelTimeout(limit))?,
            None => self.listener.accept().await,
        };
        let (stream, addr) = accepted.map_err(FtpError::Accept)?;
        debug!("Accepted data connection from: {}", addr);
        Ok(stream)
    }
}

/// Connects to a fixed, pre-agreed data port. Without a configured host the
/// control channel peer's address is used.
#[derive(Debug, Clone)]
pub struct FixedPortInitiator {
    host: Option<String>,
    port: u16,
    connect_timeout: Option<Duration>,
}

impl FixedPortInitiator {
    pub fn new(host: Option<String>, port: u16, connect_timeout: Option<Duration>) -> Self {
        Self {
            host,
            port,
            connect_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.server.data_host.clone(),
            config.server.data_port,
            config.timeouts.connect(),
        )
    }
}

#[async_trait]
impl DataChannelInitiator for FixedPortInitiator {
    async fn open(&self, peer: SocketAddr) -> Result<TcpStream, FtpError> {
        let host = match &self.host {
            Some(host) => host.clone(),
            None => peer.ip().to_string(),
        };
        debug!("Opening data connection to {}:{}", host, self.port);
        connect_to(&host, self.port, self.connect_timeout).await
    }
}

/// Listens on a fixed, pre-agreed data port.
#[derive(Debug, Clone)]
pub struct FixedPortAcceptor {
    bind_address: String,
    port: u16,
}

impl FixedPortAcceptor {
    pub fn new(bind_address: impl Into<String>, port: u16) -> Self {
        Self {
            bind_address: bind_address.into(),
            port,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.client.data_bind_address.clone(),
            config.client.data_port,
        )
    }
}

#[async_trait]
impl DataChannelAcceptor for FixedPortAcceptor {
    async fn listen(&self) -> Result<PendingDataChannel, FtpError> {
        // One connection per transfer.
        let listener = listen_on(&self.bind_address, self.port, 1).await?;
        debug!(
            "Data listener ready on {}:{}",
            self.bind_address, self.port
        );
        Ok(PendingDataChannel::new(listener))
    }
}
