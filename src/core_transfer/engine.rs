use super::error::TransferError;
use crate::constants::LENGTH_FIELD_WIDTH;
use crate::Config;
use log::{debug, info, warn};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Receive,
}

/// What one data channel use moved: which file, how many bytes, which way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferDescriptor {
    pub path: PathBuf,
    pub declared_len: u64,
    pub direction: Direction,
}

/// Frames and streams one file over a data channel.
///
/// The wire format is an 8-byte big-endian length followed by exactly that
/// many content bytes. Content is moved in chunks of at most `chunk_size`
/// bytes; both directions account strictly by the byte counts the
/// underlying reads and writes report.
#[derive(Debug, Clone)]
pub struct TransferEngine {
    chunk_size: usize,
    idle_timeout: Option<Duration>,
}

fn chunk_len(remaining: u64, chunk_size: usize) -> usize {
    remaining.min(chunk_size as u64) as usize
}

/// Sibling of `path` that an incoming file is staged in.
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.part", name))
}

impl TransferEngine {
    pub fn new(chunk_size: usize, idle_timeout: Option<Duration>) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            idle_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.transfer.chunk_size, config.timeouts.data())
    }

    /// Runs one data channel operation under the idle deadline.
    async fn deadline<T, F>(&self, operation: F) -> Result<T, TransferError>
    where
        F: Future<Output = io::Result<T>>,
    {
        match self.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, operation)
                .await
                .map_err(|_| TransferError::Timeout(limit))?
                .map_err(TransferError::Data),
            None => operation.await.map_err(TransferError::Data),
        }
    }

    /// Opens `path` and sends its length and content over `data`.
    pub async fn send_file<W>(
        &self,
        path: &Path,
        data: &mut W,
    ) -> Result<TransferDescriptor, TransferError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut file = File::open(path).await.map_err(TransferError::Source)?;
        let declared_len = file
            .metadata()
            .await
            .map_err(TransferError::Source)?
            .len();

        info!("Sending file: {:?} ({} bytes)", path, declared_len);
        self.send_stream(&mut file, declared_len, data).await?;

        Ok(TransferDescriptor {
            path: path.to_path_buf(),
            declared_len,
            direction: Direction::Send,
        })
    }

    /// Reads the length header from `data` and stores the content at `path`.
    ///
    /// Content goes to a sibling staging file created once a complete header
    /// has arrived. It replaces `path` only when every declared byte was
    /// received; otherwise it is removed and an existing `path` is untouched.
    pub async fn receive_file<R>(
        &self,
        data: &mut R,
        path: &Path,
    ) -> Result<TransferDescriptor, TransferError>
    where
        R: AsyncRead + Unpin,
    {
        let declared_len = self.read_length(data).await?;
        info!("Receiving file: {:?} ({} bytes)", path, declared_len);

        let staging = staging_path(path);
        let mut file = File::create(&staging)
            .await
            .map_err(TransferError::Sink)?;
        let mut result = self
            .receive_stream(data, declared_len, &mut file)
            .await
            .map(|_| ());
        if result.is_ok() {
            result = file.flush().await.map_err(TransferError::Sink);
        }
        drop(file);
        if result.is_ok() {
            result = fs::rename(&staging, path)
                .await
                .map_err(TransferError::Sink);
        }

        if let Err(e) = result {
            if let Err(remove_err) = fs::remove_file(&staging).await {
                warn!("Failed to remove partial file {:?}: {}", staging, remove_err);
            }
            return Err(e);
        }

        Ok(TransferDescriptor {
            path: path.to_path_buf(),
            declared_len,
            direction: Direction::Receive,
        })
    }

    pub async fn write_length<W>(&self, data: &mut W, len: u64) -> Result<(), TransferError>
    where
        W: AsyncWrite + Unpin,
    {
        let header = len.to_be_bytes();
        let mut pending = &header[..];
        while !pending.is_empty() {
            let written = self.deadline(data.write(pending)).await?;
            if written == 0 {
                return Err(TransferError::WriteZero { remaining: len });
            }
            pending = &pending[written..];
        }
        Ok(())
    }

    pub async fn read_length<R>(&self, data: &mut R) -> Result<u64, TransferError>
    where
        R: AsyncRead + Unpin,
    {
        let mut header = [0u8; LENGTH_FIELD_WIDTH];
        match self.deadline(data.read_exact(&mut header)).await {
            Ok(_) => Ok(u64::from_be_bytes(header)),
            Err(TransferError::Data(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(TransferError::MissingHeader)
            }
            Err(e) => Err(e),
        }
    }

    /// Sends the header and `declared_len` bytes taken from `source`.
    pub async fn send_stream<R, W>(
        &self,
        source: &mut R,
        declared_len: u64,
        data: &mut W,
    ) -> Result<u64, TransferError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        self.write_length(data, declared_len).await?;

        let mut buffer = vec![0; self.chunk_size];
        let mut remaining = declared_len;
        while remaining > 0 {
            let want = chunk_len(remaining, self.chunk_size);
            let bytes_read = source
                .read(&mut buffer[..want])
                .await
                .map_err(TransferError::Source)?;
            if bytes_read == 0 {
                return Err(TransferError::SourceExhausted {
                    expected: declared_len,
                    sent: declared_len - remaining,
                });
            }

            let mut chunk = &buffer[..bytes_read];
            while !chunk.is_empty() {
                let written = self.deadline(data.write(chunk)).await?;
                if written == 0 {
                    return Err(TransferError::WriteZero { remaining });
                }
                remaining -= written as u64;
                chunk = &chunk[written..];
            }
        }

        self.deadline(data.flush()).await?;
        debug!("Sent {} bytes", declared_len);
        Ok(declared_len)
    }

    /// Copies exactly `declared_len` bytes from `data` into `sink`.
    pub async fn receive_stream<R, W>(
        &self,
        data: &mut R,
        declared_len: u64,
        sink: &mut W,
    ) -> Result<u64, TransferError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buffer = vec![0; self.chunk_size];
        let mut received: u64 = 0;
        while received < declared_len {
            let want = chunk_len(declared_len - received, self.chunk_size);
            let bytes_read = self.deadline(data.read(&mut buffer[..want])).await?;
            if bytes_read == 0 {
                return Err(TransferError::PrematureEof {
                    expected: declared_len,
                    received,
                });
            }
            sink.write_all(&buffer[..bytes_read])
                .await
                .map_err(TransferError::Sink)?;
            received += bytes_read as u64;
        }

        sink.flush().await.map_err(TransferError::Sink)?;
        debug!("Received {} bytes", received);
        Ok(received)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tempfile::tempdir;
    use tokio::io::ReadBuf;

    /// Accepts at most `max_write` bytes per call.
    struct TrickleWriter {
        inner: Vec<u8>,
        max_write: usize,
    }

    impl AsyncWrite for TrickleWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let this = self.get_mut();
            let n = buf.len().min(this.max_write);
            this.inner.extend_from_slice(&buf[..n]);
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    /// Hands out at most `max_read` bytes per call.
    struct TrickleReader {
        data: Vec<u8>,
        pos: usize,
        max_read: usize,
    }

    impl AsyncRead for TrickleReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let this = self.get_mut();
            let end = (this.pos + this.max_read)
                .min(this.data.len())
                .min(this.pos + buf.remaining());
            buf.put_slice(&this.data[this.pos..end]);
            this.pos = end;
            Poll::Ready(Ok(()))
        }
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    async fn round_trip(len: usize, chunk_size: usize) -> Vec<u8> {
        let original = payload(len);
        let engine = TransferEngine::new(chunk_size, Some(Duration::from_secs(5)));
        let (mut tx, mut rx) = tokio::io::duplex(64);
        let mut source = original.as_slice();
        let mut sink = Vec::new();

        let sender = async {
            let sent = engine.send_stream(&mut source, len as u64, &mut tx).await?;
            drop(tx);
            Ok::<u64, TransferError>(sent)
        };
        let receiver = async {
            let declared = engine.read_length(&mut rx).await?;
            engine.receive_stream(&mut rx, declared, &mut sink).await
        };
        let (sent, received) = tokio::join!(sender, receiver);

        assert_eq!(sent.unwrap(), len as u64);
        assert_eq!(received.unwrap(), len as u64);
        assert_eq!(sink, original);
        sink
    }

    #[tokio::test]
    async fn test_round_trip_boundary_sizes() {
        let chunk = 16;
        for len in [0, 1, chunk - 1, chunk, chunk + 1, chunk * 64 + 5] {
            let received = round_trip(len, chunk).await;
            assert_eq!(received.len(), len, "length mismatch for {} bytes", len);
        }
    }

    #[tokio::test]
    async fn test_round_trip_default_chunk_size() {
        let chunk = crate::constants::DEFAULT_CHUNK_SIZE;
        round_trip(3 * chunk + 17, chunk).await;
    }

    #[tokio::test]
    async fn test_length_header_is_big_endian() {
        let engine = TransferEngine::new(4, None);
        let mut wire = Vec::new();
        let mut source: &[u8] = b"abc";
        engine.send_stream(&mut source, 3, &mut wire).await.unwrap();
        assert_eq!(&wire[..LENGTH_FIELD_WIDTH], &[0, 0, 0, 0, 0, 0, 0, 3]);
        assert_eq!(&wire[LENGTH_FIELD_WIDTH..], b"abc");
    }

    #[tokio::test]
    async fn test_zero_length_sends_only_header() {
        let engine = TransferEngine::new(4, None);
        let mut wire = Vec::new();
        let mut source: &[u8] = b"ignored";
        engine.send_stream(&mut source, 0, &mut wire).await.unwrap();
        assert_eq!(wire, vec![0u8; LENGTH_FIELD_WIDTH]);
    }

    #[tokio::test]
    async fn test_short_writes_are_retried() {
        let engine = TransferEngine::new(32, None);
        let original = payload(100);
        let mut source = original.as_slice();
        let mut writer = TrickleWriter {
            inner: Vec::new(),
            max_write: 3,
        };
        engine
            .send_stream(&mut source, 100, &mut writer)
            .await
            .unwrap();
        assert_eq!(writer.inner.len(), LENGTH_FIELD_WIDTH + 100);
        assert_eq!(&writer.inner[LENGTH_FIELD_WIDTH..], original.as_slice());
    }

    #[tokio::test]
    async fn test_short_reads_write_only_received_bytes() {
        let engine = TransferEngine::new(32, None);
        let original = payload(75);
        let mut reader = TrickleReader {
            data: original.clone(),
            pos: 0,
            max_read: 7,
        };
        let mut sink = Vec::new();
        let received = engine
            .receive_stream(&mut reader, 75, &mut sink)
            .await
            .unwrap();
        assert_eq!(received, 75);
        assert_eq!(sink, original);
    }

    #[tokio::test]
    async fn test_premature_eof_is_a_failure() {
        let engine = TransferEngine::new(8, None);
        let mut wire = 10u64.to_be_bytes().to_vec();
        wire.extend_from_slice(b"abcd");
        let mut data = wire.as_slice();
        let mut sink = Vec::new();

        let declared = engine.read_length(&mut data).await.unwrap();
        let err = engine
            .receive_stream(&mut data, declared, &mut sink)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransferError::PrematureEof {
                expected: 10,
                received: 4
            }
        ));
        assert_eq!(sink, b"abcd");
    }

    #[tokio::test]
    async fn test_truncated_header_is_reported() {
        let engine = TransferEngine::new(8, None);
        let mut data: &[u8] = &[0, 0, 0];
        assert!(matches!(
            engine.read_length(&mut data).await,
            Err(TransferError::MissingHeader)
        ));
    }

    #[tokio::test]
    async fn test_source_shorter_than_declared() {
        let engine = TransferEngine::new(8, None);
        let mut source: &[u8] = b"abc";
        let mut wire = Vec::new();
        let err = engine
            .send_stream(&mut source, 10, &mut wire)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransferError::SourceExhausted {
                expected: 10,
                sent: 3
            }
        ));
    }

    #[tokio::test]
    async fn test_zero_byte_write_is_a_failure() {
        let engine = TransferEngine::new(8, None);
        let mut source: &[u8] = b"abc";
        let mut writer = TrickleWriter {
            inner: Vec::new(),
            max_write: 0,
        };
        let err = engine
            .send_stream(&mut source, 3, &mut writer)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::WriteZero { remaining: 3 }));
    }

    #[tokio::test]
    async fn test_idle_timeout_on_silent_peer() {
        let engine = TransferEngine::new(8, Some(Duration::from_millis(50)));
        let (_tx, mut rx) = tokio::io::duplex(64);
        assert!(matches!(
            engine.read_length(&mut rx).await,
            Err(TransferError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_file_round_trip_and_partial_cleanup() {
        let dir = tempdir().unwrap();
        let source_path = dir.path().join("source.bin");
        let target_path = dir.path().join("target.bin");
        std::fs::write(&source_path, payload(1000)).unwrap();

        let engine = TransferEngine::new(64, Some(Duration::from_secs(5)));
        let mut wire = Vec::new();
        let sent = engine.send_file(&source_path, &mut wire).await.unwrap();
        assert_eq!(sent.declared_len, 1000);
        assert_eq!(sent.direction, Direction::Send);

        let mut data = wire.as_slice();
        let received = engine.receive_file(&mut data, &target_path).await.unwrap();
        assert_eq!(received.declared_len, 1000);
        assert_eq!(received.direction, Direction::Receive);
        assert_eq!(std::fs::read(&target_path).unwrap(), payload(1000));

        let partial_path = dir.path().join("partial.bin");
        let cut = wire[..LENGTH_FIELD_WIDTH + 10].to_vec();
        let mut data = cut.as_slice();
        assert!(engine.receive_file(&mut data, &partial_path).await.is_err());
        assert!(!partial_path.exists());
        assert!(!staging_path(&partial_path).exists());
    }

    #[tokio::test]
    async fn test_failed_receive_keeps_existing_file() {
        let dir = tempdir().unwrap();
        let target_path = dir.path().join("report.txt");
        std::fs::write(&target_path, b"previous version").unwrap();

        let engine = TransferEngine::new(8, Some(Duration::from_secs(5)));
        let mut wire = 100u64.to_be_bytes().to_vec();
        wire.extend_from_slice(b"0123456789");
        let mut data = wire.as_slice();

        assert!(matches!(
            engine.receive_file(&mut data, &target_path).await,
            Err(TransferError::PrematureEof { .. })
        ));
        assert_eq!(std::fs::read(&target_path).unwrap(), b"previous version");
        assert!(!staging_path(&target_path).exists());
    }

    #[tokio::test]
    async fn test_complete_receive_replaces_existing_file() {
        let dir = tempdir().unwrap();
        let target_path = dir.path().join("report.txt");
        std::fs::write(&target_path, b"previous version").unwrap();

        let engine = TransferEngine::new(8, None);
        let mut wire = 3u64.to_be_bytes().to_vec();
        wire.extend_from_slice(b"new");
        let mut data = wire.as_slice();

        engine.receive_file(&mut data, &target_path).await.unwrap();
        assert_eq!(std::fs::read(&target_path).unwrap(), b"new");
        assert!(!staging_path(&target_path).exists());
    }
}
