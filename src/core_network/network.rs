use crate::core_error::FtpError;
use log::{debug, trace};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{lookup_host, TcpListener, TcpSocket, TcpStream};

/// Resolves `host:port` into every address it maps to.
pub async fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>, FtpError> {
    let addr = format!("{}:{}", host, port);
    let addrs: Vec<SocketAddr> = lookup_host(addr.as_str())
        .await
        .map_err(|source| FtpError::Resolve {
            addr: addr.clone(),
            source,
        })?
        .collect();

    if addrs.is_empty() {
        return Err(FtpError::Resolve {
            addr,
            source: io::Error::new(io::ErrorKind::AddrNotAvailable, "no addresses found"),
        });
    }
    trace!("Resolved {}:{} to {:?}", host, port, addrs);
    Ok(addrs)
}

/// Connects to `host:port`, trying each resolved address in turn until one
/// succeeds. The whole attempt is bounded by `timeout` when one is given.
pub async fn connect_to(
    host: &str,
    port: u16,
    timeout: Option<Duration>,
) -> Result<TcpStream, FtpError> {
    let attempt = async {
        let mut last_err = None;
        for addr in resolve(host, port).await? {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    debug!("Connected to {}", addr);
                    return Ok(stream);
                }
                Err(e) => {
                    debug!("Connection to {} failed: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }
        Err(FtpError::Connect {
            addr: format!("{}:{}", host, port),
            source: last_err
                .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no address")),
        })
    };

    match timeout {
        Some(limit) => tokio::time::timeout(limit, attempt)
            .await
            .map_err(|_| FtpError::Connect {
                addr: format!("{}:{}", host, port),
                source: io::Error::new(io::ErrorKind::TimedOut, "connection timed out"),
            })?,
        None => attempt.await,
    }
}

/// Binds and listens on `host:port` with the given backlog.
pub async fn listen_on(host: &str, port: u16, backlog: u32) -> Result<TcpListener, FtpError> {
    let mut last_err = None;
    for addr in resolve(host, port).await? {
        match bind_listener(addr, backlog) {
            Ok(listener) => {
                debug!("Listening on {} (backlog {})", addr, backlog);
                return Ok(listener);
            }
            Err(e) => {
                debug!("Failed to listen on {}: {}", addr, e);
                last_err = Some(e);
            }
        }
    }
    Err(FtpError::Listen {
        addr: format!("{}:{}", host, port),
        source: last_err
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no address")),
    })
}

fn bind_listener(addr: SocketAddr, backlog: u32) -> io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(backlog)
}
