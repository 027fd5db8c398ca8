use anyhow::{Context, Result};
use clap::Parser;
use ferroftp::client::Client;
use ferroftp::core_cli::ClientCli;
use ferroftp::core_log::init_logger;
use ferroftp::core_network::FixedPortAcceptor;
use ferroftp::config;
use std::sync::Arc;
use tokio::io::{self, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> Result<()> {
    let args = ClientCli::parse();

    init_logger(args.verbose);

    let mut config = config::load_or_default(&args.config)?;
    if let Some(host) = args.host {
        config.client.server_host = host;
    }
    if let Some(port) = args.port {
        config.client.server_port = port;
    }
    if let Some(data_port) = args.data_port {
        config.client.data_port = data_port;
    }
    if let Some(download_dir) = args.download_dir {
        config.client.download_dir = download_dir;
    }

    let server = format!(
        "{}:{}",
        config.client.server_host, config.client.server_port
    );
    let acceptor = Arc::new(FixedPortAcceptor::from_config(&config));
    let (mut client, greeting) = Client::connect(config, acceptor)
        .await
        .with_context(|| format!("Failed to connect to {}", server))?;

    let mut stdout = io::stdout();
    stdout
        .write_all(format!("SERVER: {}\n", greeting).as_bytes())
        .await?;

    client
        .run(BufReader::new(io::stdin()), &mut stdout)
        .await
        .context("Connection to the server lost")?;
    Ok(())
}
