use anyhow::Result;
use clap::Parser;
use ferroftp::core_cli::ServerCli;
use ferroftp::core_log::init_logger;
use ferroftp::{config, server};
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = ServerCli::parse();

    init_logger(args.verbose);

    let mut config = config::load_or_default(&args.config)?;

    // Override configuration values from CLI if provided
    if let Some(port) = args.port {
        config.server.listen_port = port;
    }
    if let Some(root) = args.root {
        config.server.root_dir = root;
    }

    info!("ferroftpd {}", env!("CARGO_PKG_VERSION"));
    server::run(config).await
}
