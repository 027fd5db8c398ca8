use clap::Parser;

/// Command-line arguments of the server
#[derive(Parser, Debug)]
#[command(name = "ferroftpd", about = "A small FTP-style file server written in Rust.")]
pub struct ServerCli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "")]
    pub config: String,

    /// Control port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory served to clients
    #[arg(short, long)]
    pub root: Option<String>,

    /// Enable verbose mode
    #[arg(short, long)]
    pub verbose: bool,
}

/// Command-line arguments of the interactive client
#[derive(Parser, Debug)]
#[command(name = "ferroftp", about = "Interactive client for ferroftpd.")]
pub struct ClientCli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "")]
    pub config: String,

    /// Server host name or address
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Server control port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Local port the server connects to for transfers
    #[arg(short, long)]
    pub data_port: Option<u16>,

    /// Where downloads are stored and uploads are read from
    #[arg(long)]
    pub download_dir: Option<String>,

    /// Enable verbose mode
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definitions_are_valid() {
        ServerCli::command().debug_assert();
        ClientCli::command().debug_assert();
    }

    #[test]
    fn test_server_overrides() {
        let cli = ServerCli::parse_from(["ferroftpd", "--port", "2222", "-r", "/srv/ftp", "-v"]);
        assert_eq!(cli.port, Some(2222));
        assert_eq!(cli.root.as_deref(), Some("/srv/ftp"));
        assert!(cli.verbose);
        assert!(cli.config.is_empty());
    }

    #[test]
    fn test_client_overrides() {
        let cli = ClientCli::parse_from([
            "ferroftp",
            "-H",
            "files.local",
            "--data-port",
            "3030",
            "--download-dir",
            "downloads",
        ]);
        assert_eq!(cli.host.as_deref(), Some("files.local"));
        assert_eq!(cli.data_port, Some(3030));
        assert_eq!(cli.download_dir.as_deref(), Some("downloads"));
        assert_eq!(cli.port, None);
    }
}
