// Error types for sessions, handlers and the client driver
use crate::core_ftpcommand::reply::{Reply, ReplyCode};
use crate::core_transfer::TransferError;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FtpError {
    #[error("Control channel I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Control channel closed by peer")]
    ConnectionClosed,

    #[error("No command received within {0:?}")]
    IdleTimeout(Duration),

    #[error("Failed to resolve {addr}: {source}")]
    Resolve { addr: String, source: io::Error },

    #[error("Failed to connect to {addr}: {source}")]
    Connect { addr: String, source: io::Error },

    #[error("Failed to listen on {addr}: {source}")]
    Listen { addr: String, source: io::Error },

    #[error("Failed to accept connection: {0}")]
    Accept(io::Error),

    #[error("No data connection within {0:?}")]
    DataChannelTimeout(Duration),

    #[error("Malformed reply: {0:?}")]
    MalformedReply(String),

    #[error("Invalid root directory {path}: {source}")]
    InvalidRoot { path: String, source: io::Error },

    #[error("Transfer failed: {0}")]
    Transfer(#[from] TransferError),
}

impl FtpError {
    pub fn to_ftp_response(&self) -> Reply {
        match self {
            FtpError::Resolve { .. }
            | FtpError::Connect { .. }
            | FtpError::Listen { .. }
            | FtpError::Accept(_)
            | FtpError::DataChannelTimeout(_) => {
                Reply::standard(ReplyCode::CantOpenDataConnection)
            }
            _ => Reply::standard(ReplyCode::TransferFailed),
        }
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("550 Requested action not taken. Local file not found: {}", .0.display())]
    LocalFileNotFound(PathBuf),

    #[error("Invalid local file name: {0}")]
    InvalidLocalTarget(String),

    #[error("Local I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Ftp(#[from] FtpError),

    #[error("Transfer failed: {0}")]
    Transfer(#[from] TransferError),
}

impl ClientError {
    /// Errors after which the control channel can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClientError::Ftp(
                FtpError::Io(_)
                    | FtpError::ConnectionClosed
                    | FtpError::IdleTimeout(_)
                    | FtpError::MalformedReply(_)
            )
        )
    }
}
