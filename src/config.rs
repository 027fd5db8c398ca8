use crate::constants::{
    DEFAULT_BACKLOG, DEFAULT_CHUNK_SIZE, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_CONTROL_PORT,
    DEFAULT_DATA_PORT, DEFAULT_DATA_TIMEOUT_SECS, DEFAULT_IDLE_TIMEOUT_SECS,
    DEFAULT_MAX_LINE_LENGTH,
};
use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_address: String,
    pub listen_port: u16,
    pub root_dir: String,
    /// Host the server connects to for data transfers. `None` means the
    /// control connection's peer address.
    pub data_host: Option<String>,
    pub data_port: u16,
    pub backlog: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_host: String,
    pub server_port: u16,
    pub data_bind_address: String,
    pub data_port: u16,
    pub download_dir: String,
    pub mirror_remote_cwd: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransferConfig {
    pub chunk_size: usize,
    pub max_line_length: usize,
}

/// Timeouts in seconds; `0` disables the corresponding deadline.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub data_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub client: ClientConfig,
    pub transfer: TransferConfig,
    pub timeouts: TimeoutConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: String::from("0.0.0.0"),
            listen_port: DEFAULT_CONTROL_PORT,
            root_dir: String::from("."),
            data_host: None,
            data_port: DEFAULT_DATA_PORT,
            backlog: DEFAULT_BACKLOG,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_host: String::from("127.0.0.1"),
            server_port: DEFAULT_CONTROL_PORT,
            data_bind_address: String::from("0.0.0.0"),
            data_port: DEFAULT_DATA_PORT,
            download_dir: String::from("."),
            mirror_remote_cwd: true,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            data_timeout_secs: DEFAULT_DATA_TIMEOUT_SECS,
        }
    }
}

fn secs(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_secs(value))
}

impl TimeoutConfig {
    pub fn connect(&self) -> Option<Duration> {
        secs(self.connect_timeout_secs)
    }

    pub fn idle(&self) -> Option<Duration> {
        secs(self.idle_timeout_secs)
    }

    pub fn data(&self) -> Option<Duration> {
        secs(self.data_timeout_secs)
    }
}

impl Config {
    /// Reads and parses a TOML configuration file. Missing sections and
    /// fields fall back to their defaults.
    pub fn load_from_file(path: &str) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path))?;
        let mut config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse configuration file: {}", path))?;

        if config.transfer.chunk_size == 0 {
            config.transfer.chunk_size = DEFAULT_CHUNK_SIZE;
        }
        if config.transfer.max_line_length == 0 {
            config.transfer.max_line_length = DEFAULT_MAX_LINE_LENGTH;
        }

        Ok(config)
    }
}

/// Where the binaries look for a configuration file when none is given.
pub fn default_config_path() -> &'static str {
    if cfg!(target_os = "windows") {
        "C:\\ferroftp\\etc\\ferroftp.toml"
    } else {
        "/etc/ferroftp.toml"
    }
}

/// Loads `path`, or the default location when `path` is empty. A missing
/// default file means built-in defaults; a missing explicit file is an error.
pub fn load_or_default(path: &str) -> Result<Config> {
    if !path.is_empty() {
        return Config::load_from_file(path);
    }
    let default_path = default_config_path();
    if std::path::Path::new(default_path).is_file() {
        Config::load_from_file(default_path)
    } else {
        info!("No configuration file at {}, using defaults", default_path);
        Ok(Config::default())
    }
}

// Helper function to log configuration options
pub fn log_config(config: &Config) {
    info!(
        "  Listen Address: {}:{}",
        config.server.listen_address, config.server.listen_port
    );
    info!("  Root Directory: {}", config.server.root_dir);
    info!(
        "  Data Endpoint: {}:{}",
        config.server.data_host.as_deref().unwrap_or("<control peer>"),
        config.server.data_port
    );
    info!("  Chunk Size: {} bytes", config.transfer.chunk_size);
    info!(
        "  Timeouts (connect/idle/data): {}s/{}s/{}s",
        config.timeouts.connect_timeout_secs,
        config.timeouts.idle_timeout_secs,
        config.timeouts.data_timeout_secs
    );
}
