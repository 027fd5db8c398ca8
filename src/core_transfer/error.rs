// Errors raised while moving a file over a data channel
use std::io;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Data channel I/O error: {0}")]
    Data(io::Error),

    #[error("Data channel idle for {0:?}")]
    Timeout(Duration),

    #[error("Data channel closed before the length header was complete")]
    MissingHeader,

    #[error("Data channel closed after {received} of {expected} bytes")]
    PrematureEof { expected: u64, received: u64 },

    #[error("Data channel accepted no bytes with {remaining} bytes left to send")]
    WriteZero { remaining: u64 },

    #[error("Source ended after {sent} of {expected} bytes")]
    SourceExhausted { expected: u64, sent: u64 },

    #[error("Failed to read local file: {0}")]
    Source(io::Error),

    #[error("Failed to write local file: {0}")]
    Sink(io::Error),
}
