use crate::core_error::FtpError;
use crate::core_ftpcommand::reply::{Reply, ReplyCode};
use log::{trace, warn};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// The persistent command/reply connection between client and server.
///
/// Both ends use the same type: the server reads command lines and writes
/// replies, the client does the opposite.
#[derive(Debug)]
pub struct ControlChannel {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    peer: SocketAddr,
    max_line: usize,
}

impl ControlChannel {
    pub fn new(stream: TcpStream, max_line: usize) -> Result<Self, FtpError> {
        let peer = stream.peer_addr()?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
            peer,
            max_line: max_line.max(8),
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Reads one line without its terminator. `None` means the peer closed
    /// the connection.
    ///
    /// A line longer than the configured maximum is truncated: the excess up
    /// to the next newline is read and discarded.
    pub async fn read_line(&mut self) -> Result<Option<String>, FtpError> {
        let limit = self.max_line as u64;
        let mut buf = Vec::new();
        let n = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut buf)
            .await?;
        if n == 0 {
            return Ok(None);
        }

        if buf.last() != Some(&b'\n') && n as u64 == limit {
            warn!(
                "Line from {} exceeds {} bytes, truncating",
                self.peer, self.max_line
            );
            let mut discarded = Vec::new();
            loop {
                discarded.clear();
                let m = (&mut self.reader)
                    .take(limit)
                    .read_until(b'\n', &mut discarded)
                    .await?;
                if m == 0 || discarded.last() == Some(&b'\n') {
                    break;
                }
            }
        }

        let line = String::from_utf8_lossy(&buf)
            .trim_end_matches(&['\r', '\n'][..])
            .to_string();
        trace!("<- {}: {}", self.peer, line);
        Ok(Some(line))
    }

    /// Like [`read_line`](Self::read_line), bounded by `timeout`.
    pub async fn read_line_timeout(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<Option<String>, FtpError> {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, self.read_line())
                .await
                .map_err(|_| FtpError::IdleTimeout(limit))?,
            None => self.read_line().await,
        }
    }

    pub async fn send_line(&mut self, line: &str) -> Result<(), FtpError> {
        trace!("-> {}: {}", self.peer, line);
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub async fn send_reply(&mut self, reply: &Reply) -> Result<(), FtpError> {
        trace!("-> {}: {}", self.peer, reply);
        self.writer.write_all(reply.to_wire().as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub async fn reply(&mut self, code: ReplyCode, text: impl Into<String>) -> Result<(), FtpError> {
        self.send_reply(&Reply::new(code, text)).await
    }

    /// Reads one complete reply, single or multi-line.
    pub async fn read_reply(&mut self, timeout: Option<Duration>) -> Result<Reply, FtpError> {
        let first = self
            .read_line_timeout(timeout)
            .await?
            .ok_or(FtpError::ConnectionClosed)?;
        let head = Reply::parse_head(&first)?;

        let mut lines = vec![head.text];
        if head.continues {
            loop {
                let line = self
                    .read_line_timeout(timeout)
                    .await?
                    .ok_or(FtpError::ConnectionClosed)?;
                if let Some(last) = Reply::closing_text(&line, head.code) {
                    lines.push(last);
                    break;
                }
                lines.push(Reply::continuation_text(&line));
            }
        }

        Ok(Reply::multi_line(head.code, lines))
    }

    pub async fn shutdown(&mut self) -> Result<(), FtpError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn channel_pair(max_line: usize) -> (ControlChannel, ControlChannel) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (accepted, connected) = tokio::join!(listener.accept(), TcpStream::connect(addr));
        let server = ControlChannel::new(accepted.unwrap().0, max_line).unwrap();
        let client = ControlChannel::new(connected.unwrap(), max_line).unwrap();
        (server, client)
    }

    #[tokio::test]
    async fn test_line_exchange() {
        let (mut server, mut client) = channel_pair(512).await;
        client.send_line("RETR file.txt").await.unwrap();
        assert_eq!(
            server.read_line().await.unwrap(),
            Some("RETR file.txt".to_string())
        );

        client.shutdown().await.unwrap();
        assert_eq!(server.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_multi_line_reply_round_trip() {
        let (mut server, mut client) = channel_pair(512).await;
        let reply = Reply::multi_line(
            ReplyCode::DirectoryStatus,
            vec![
                "Files and/or folders in /:".into(),
                "212 looks like an end".into(),
                "notes.txt".into(),
                "End of list.".into(),
            ],
        );
        server.send_reply(&reply).await.unwrap();
        server.reply(ReplyCode::CommandOkay, "next").await.unwrap();

        assert_eq!(client.read_reply(None).await.unwrap(), reply);
        assert_eq!(
            client.read_reply(None).await.unwrap(),
            Reply::new(ReplyCode::CommandOkay, "next")
        );
    }

    #[tokio::test]
    async fn test_overlong_line_is_truncated() {
        let (mut server, mut client) = channel_pair(16).await;
        client
            .send_line("MKD a-directory-name-that-is-far-too-long")
            .await
            .unwrap();
        client.send_line("PWD").await.unwrap();

        let truncated = server.read_line().await.unwrap().unwrap();
        assert_eq!(truncated, "MKD a-directory-");
        assert_eq!(server.read_line().await.unwrap(), Some("PWD".to_string()));
    }

    #[tokio::test]
    async fn test_read_reply_on_closed_channel() {
        let (server, mut client) = channel_pair(512).await;
        drop(server);
        assert!(matches!(
            client.read_reply(None).await,
            Err(FtpError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_idle_timeout() {
        let (mut server, _client) = channel_pair(512).await;
        assert!(matches!(
            server
                .read_line_timeout(Some(Duration::from_millis(50)))
                .await,
            Err(FtpError::IdleTimeout(_))
        ));
    }
}
