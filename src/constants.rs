// src/constants.rs

pub const DEFAULT_CONTROL_PORT: u16 = 2121;
pub const DEFAULT_DATA_PORT: u16 = 2020;
pub const DEFAULT_BACKLOG: u32 = 1024;

/// Maximum length of one control line, terminator included.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 512;

pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Width of the data channel length prefix (big-endian u64).
pub const LENGTH_FIELD_WIDTH: usize = 8;

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_DATA_TIMEOUT_SECS: u64 = 30;
pub const SHUTDOWN_GRACE_SECS: u64 = 5;

/// Pause after a failed accept before listening again.
pub const ACCEPT_ERROR_BACKOFF_MS: u64 = 100;
