use crate::core_error::{ClientError, FtpError};
use crate::core_ftpcommand::ftpcommand::{Command, FtpCommand};
use crate::core_ftpcommand::reply::{Reply, ReplyCode};
use crate::core_network::network::connect_to;
use crate::core_network::{ControlChannel, DataChannelAcceptor, PendingDataChannel};
use crate::core_transfer::{TransferDescriptor, TransferEngine};
use crate::Config;
use log::{debug, error, info, warn};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

const PROMPT: &str = "ftp> ";
const CWD_REPLY_PREFIX: &str = "Directory changed to: ";

/// Everything one command line produced: the server's replies in order,
/// the transfer that happened if any, and a local failure that did not cost
/// the control channel.
#[derive(Debug, Default)]
pub struct Exchange {
    pub replies: Vec<Reply>,
    pub transfer: Option<TransferDescriptor>,
    pub local_error: Option<ClientError>,
    pub closed: bool,
}

impl Exchange {
    fn single(reply: Reply) -> Self {
        Self {
            replies: vec![reply],
            ..Default::default()
        }
    }

    /// The last reply received, normally the completion reply.
    pub fn last(&self) -> Option<&Reply> {
        self.replies.last()
    }
}

/// The interactive client: one control connection, commands strictly in
/// sequence.
pub struct Client {
    control: ControlChannel,
    config: Arc<Config>,
    acceptor: Arc<dyn DataChannelAcceptor>,
    engine: TransferEngine,
    download_root: PathBuf,
    local_dir: PathBuf,
}

impl Client {
    /// Connects to the configured server and reads its greeting.
    pub async fn connect(
        config: Config,
        acceptor: Arc<dyn DataChannelAcceptor>,
    ) -> Result<(Client, Reply), ClientError> {
        let stream = connect_to(
            &config.client.server_host,
            config.client.server_port,
            config.timeouts.connect(),
        )
        .await?;
        let mut control = ControlChannel::new(stream, config.transfer.max_line_length)?;
        info!("Connected to {}", control.peer_addr());

        let greeting = control.read_reply(config.timeouts.idle()).await?;

        let download_root = PathBuf::from(&config.client.download_dir);
        fs::create_dir_all(&download_root).await?;

        let client = Client {
            control,
            engine: TransferEngine::from_config(&config),
            config: Arc::new(config),
            acceptor,
            local_dir: download_root.clone(),
            download_root,
        };
        Ok((client, greeting))
    }

    /// The local directory transfers read from and write to.
    pub fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    async fn read_reply(&mut self) -> Result<Reply, FtpError> {
        self.control.read_reply(self.config.timeouts.idle()).await
    }

    /// Sends one command line and collects what comes back.
    ///
    /// RETR and STOR with an argument also move the file; every other line is
    /// sent as typed and answered by exactly one reply.
    pub async fn execute(&mut self, line: &str) -> Result<Exchange, ClientError> {
        let line = line.trim();
        let command = Command::parse(line);

        match (command.verb, command.argument) {
            (FtpCommand::RETR, Some(name)) => self.retrieve(line, &name).await,
            (FtpCommand::STOR, Some(name)) => self.store(line, &name).await,
            (verb, _) => {
                self.control.send_line(line).await?;
                let reply = self.read_reply().await?;

                if verb == FtpCommand::CWD && reply.code == ReplyCode::CommandOkay {
                    self.mirror_remote_cwd(&reply).await;
                }

                let mut exchange = Exchange::single(reply);
                exchange.closed = verb == FtpCommand::QUIT
                    && exchange.last().map(|r| r.code) == Some(ReplyCode::ClosingControlConnection);
                if exchange.closed {
                    self.control.shutdown().await?;
                }
                Ok(exchange)
            }
        }
    }

    async fn mirror_remote_cwd(&mut self, reply: &Reply) {
        if !self.config.client.mirror_remote_cwd {
            return;
        }
        let Some(dir) = mirrored_dir(&self.download_root, &reply.text()) else {
            warn!("Cannot mirror remote directory from reply: {}", reply);
            return;
        };
        match fs::create_dir_all(&dir).await {
            Ok(()) => {
                debug!("Local directory is now {:?}", dir);
                self.local_dir = dir;
            }
            Err(e) => warn!("Failed to create local directory {:?}: {}", dir, e),
        }
    }

    /// Starts accepting the data connection in the background so the reply
    /// that follows 150 can be read meanwhile.
    fn accept_in_background(
        &self,
        pending: PendingDataChannel,
    ) -> JoinHandle<Result<TcpStream, FtpError>> {
        tokio::spawn(pending.accept(self.config.timeouts.connect()))
    }

    /// Sends `line` and reads replies up to the 125 that announces the data
    /// connection. Returns the accepted stream, or `None` when the server
    /// answered with a completion reply instead.
    async fn open_transfer(
        &mut self,
        line: &str,
        exchange: &mut Exchange,
    ) -> Result<Option<TcpStream>, ClientError> {
        let pending = self.acceptor.listen().await?;
        self.control.send_line(line).await?;

        let first = self.read_reply().await?;
        let accepted = first.code == ReplyCode::FileStatusOkay;
        exchange.replies.push(first);
        if !accepted {
            return Ok(None);
        }

        let accepting = self.accept_in_background(pending);
        let next = match self.read_reply().await {
            Ok(reply) => reply,
            Err(e) => {
                accepting.abort();
                return Err(e.into());
            }
        };
        let opened = next.code == ReplyCode::ConnectionOpen;
        exchange.replies.push(next);
        if !opened {
            accepting.abort();
            return Ok(None);
        }

        match accepting.await {
            Ok(Ok(stream)) => Ok(Some(stream)),
            Ok(Err(e)) => {
                exchange.local_error = Some(e.into());
                Ok(None)
            }
            Err(e) => {
                exchange.local_error = Some(ClientError::Io(e.into()));
                Ok(None)
            }
        }
    }

    /// Reads replies until a completion reply, appending them to `exchange`.
    async fn drain_until_final(&mut self, exchange: &mut Exchange) -> Result<(), ClientError> {
        loop {
            let preliminary = exchange
                .last()
                .map(|reply| reply.code.is_preliminary())
                .unwrap_or(true);
            if !preliminary {
                return Ok(());
            }
            let reply = self.read_reply().await?;
            exchange.replies.push(reply);
        }
    }

    async fn retrieve(&mut self, line: &str, name: &str) -> Result<Exchange, ClientError> {
        let target = self.local_target(name)?;
        let mut exchange = Exchange::default();

        if let Some(mut data) = self.open_transfer(line, &mut exchange).await? {
            match self.engine.receive_file(&mut data, &target).await {
                Ok(descriptor) => exchange.transfer = Some(descriptor),
                Err(e) => {
                    error!("Download of {} failed: {}", name, e);
                    exchange.local_error = Some(e.into());
                }
            }
            drop(data);
        }

        self.drain_until_final(&mut exchange).await?;
        Ok(exchange)
    }

    async fn store(&mut self, line: &str, name: &str) -> Result<Exchange, ClientError> {
        let source = self.local_dir.join(name);
        if !source.is_file() {
            return Err(ClientError::LocalFileNotFound(source));
        }
        let mut exchange = Exchange::default();

        if let Some(mut data) = self.open_transfer(line, &mut exchange).await? {
            match self.engine.send_file(&source, &mut data).await {
                Ok(descriptor) => exchange.transfer = Some(descriptor),
                Err(e) => {
                    error!("Upload of {} failed: {}", name, e);
                    exchange.local_error = Some(e.into());
                }
            }
            if let Err(e) = data.shutdown().await {
                debug!("Data channel shutdown: {}", e);
            }
            drop(data);
        }

        self.drain_until_final(&mut exchange).await?;
        Ok(exchange)
    }

    /// Downloads land in the local directory under their bare file name.
    fn local_target(&self, name: &str) -> Result<PathBuf, ClientError> {
        Path::new(name)
            .file_name()
            .map(|file_name| self.local_dir.join(file_name))
            .ok_or_else(|| ClientError::InvalidLocalTarget(name.to_string()))
    }

    /// Reads command lines from `input` until QUIT, end of input or a lost
    /// control channel, writing prompts and replies to `output`.
    pub async fn run<R, W>(&mut self, input: R, output: &mut W) -> Result<(), ClientError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        loop {
            output.write_all(PROMPT.as_bytes()).await?;
            output.flush().await?;

            let line = match lines.next_line().await? {
                Some(line) => line,
                None => {
                    debug!("End of input, sending QUIT");
                    let exchange = self.execute("QUIT").await?;
                    print_exchange(output, &exchange).await?;
                    return Ok(());
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            match self.execute(&line).await {
                Ok(exchange) => {
                    print_exchange(output, &exchange).await?;
                    if exchange.closed {
                        return Ok(());
                    }
                }
                Err(e) if e.is_fatal() => {
                    error!("Lost connection to the server: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    output.write_all(format!("{}\n", e).as_bytes()).await?;
                }
            }
        }
    }
}

async fn print_exchange<W>(output: &mut W, exchange: &Exchange) -> Result<(), ClientError>
where
    W: AsyncWrite + Unpin,
{
    let mut text = String::new();
    for reply in &exchange.replies {
        text.push_str(&format!("SERVER: {}\n", reply));
    }
    if let Some(e) = &exchange.local_error {
        text.push_str(&format!("Local error: {}\n", e));
    }
    output.write_all(text.as_bytes()).await?;
    output.flush().await?;
    Ok(())
}

/// The local counterpart of the remote directory named in a CWD reply.
/// Only plain path components are accepted.
pub fn mirrored_dir(download_root: &Path, reply_text: &str) -> Option<PathBuf> {
    let remote = reply_text.strip_prefix(CWD_REPLY_PREFIX)?.trim();
    let remote = remote.strip_prefix('/')?;

    let mut dir = download_root.to_path_buf();
    for component in Path::new(remote).components() {
        match component {
            Component::Normal(part) => dir.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::net::TcpListener;

    /// Listens on an ephemeral port and remembers which one.
    #[derive(Default)]
    struct PortRecordingAcceptor {
        port: Mutex<Option<u16>>,
    }

    #[async_trait]
    impl DataChannelAcceptor for PortRecordingAcceptor {
        async fn listen(&self) -> Result<PendingDataChannel, FtpError> {
            let listener = TcpListener::bind("127.0.0.1:0").await?;
            *self.port.lock().unwrap() = Some(listener.local_addr()?.port());
            Ok(PendingDataChannel::new(listener))
        }
    }

    #[tokio::test]
    async fn test_lost_control_channel_releases_data_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server_port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut control = ControlChannel::new(stream, 512).unwrap();
            control.reply(ReplyCode::ServiceReady, "ready").await.unwrap();
            control.read_line().await.unwrap();
            control
                .send_reply(&Reply::standard(ReplyCode::FileStatusOkay))
                .await
                .unwrap();
            // Gone before the 125.
        });

        let downloads = tempdir().unwrap();
        let mut config = Config::default();
        config.client.server_host = "127.0.0.1".to_string();
        config.client.server_port = server_port;
        config.client.download_dir = downloads.path().to_string_lossy().into_owned();

        let acceptor = Arc::new(PortRecordingAcceptor::default());
        let (mut client, _) = Client::connect(config, acceptor.clone()).await.unwrap();
        let err = client.execute("RETR notes.txt").await.unwrap_err();
        assert!(err.is_fatal());
        server.await.unwrap();

        // The data port comes free well before the connect timeout.
        let data_port = acceptor.port.lock().unwrap().unwrap();
        let mut released = false;
        for _ in 0..50 {
            if std::net::TcpListener::bind(("127.0.0.1", data_port)).is_ok() {
                released = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(released);
    }

    #[test]
    fn test_mirrored_dir() {
        let root = Path::new("/tmp/downloads");
        assert_eq!(
            mirrored_dir(root, "Directory changed to: /"),
            Some(root.to_path_buf())
        );
        assert_eq!(
            mirrored_dir(root, "Directory changed to: /a/b"),
            Some(root.join("a").join("b"))
        );
        assert_eq!(mirrored_dir(root, "Directory changed to: /../etc"), None);
        assert_eq!(mirrored_dir(root, "Directory changed to: a"), None);
        assert_eq!(mirrored_dir(root, "Command okay."), None);
    }

    #[test]
    fn test_exchange_last() {
        let mut exchange = Exchange::single(Reply::standard(ReplyCode::FileStatusOkay));
        exchange
            .replies
            .push(Reply::standard(ReplyCode::ClosingDataConnection));
        assert_eq!(
            exchange.last().map(|r| r.code),
            Some(ReplyCode::ClosingDataConnection)
        );
        assert!(!exchange.closed);
    }
}
