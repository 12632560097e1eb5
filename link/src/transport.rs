use homesec_common::config::LinkConfig;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tracing::info;

use crate::session::LinkError;

/// Any duplex byte stream the reader loop can drive.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

/// Open the peripheral byte stream described by `config`.
///
/// `tcp` expects a `host:port` serial bridge; `device` opens an already-bound
/// RFCOMM character device such as `/dev/rfcomm0`.
pub async fn open(config: &LinkConfig) -> Result<Box<dyn Transport>, LinkError> {
    match config.transport.as_str() {
        "tcp" => {
            let stream = TcpStream::connect(&config.address)
                .await
                .map_err(|e| LinkError::Connect(format!("{}: {e}", config.address)))?;
            stream
                .set_nodelay(true)
                .map_err(|e| LinkError::Connect(format!("{}: {e}", config.address)))?;
            info!(addr = config.address, "connected to peripheral over TCP");
            Ok(Box::new(stream))
        }
        "device" => {
            let file = tokio::fs::OpenOptions::new()
                .read(true)
                .write(true)
                .open(&config.address)
                .await
                .map_err(|e| LinkError::Connect(format!("{}: {e}", config.address)))?;
            let stream = DeviceStream::from_std(file.into_std().await)
                .map_err(|e| LinkError::Connect(format!("{}: {e}", config.address)))?;
            info!(device = config.address, "opened peripheral device");
            Ok(Box::new(stream))
        }
        other => Err(LinkError::UnknownTransport(other.to_string())),
    }
}

/// Character device opened as two handles.
///
/// A `tokio::fs::File` runs each operation on the blocking pool and serialises
/// them, so a read parked on a silent peripheral would hold back every write.
/// Separate handles let polls and alarm commands go out while a read waits.
pub struct DeviceStream {
    reader: tokio::fs::File,
    writer: tokio::fs::File,
}

impl DeviceStream {
    pub fn from_std(file: std::fs::File) -> io::Result<Self> {
        let writer = file.try_clone()?;
        Ok(Self {
            reader: tokio::fs::File::from_std(file),
            writer: tokio::fs::File::from_std(writer),
        })
    }
}

impl AsyncRead for DeviceStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.reader).poll_read(cx, buf)
    }
}

impl AsyncWrite for DeviceStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.writer).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.writer).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.writer).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_transport_is_rejected() {
        let config = LinkConfig {
            transport: "carrier-pigeon".into(),
            ..LinkConfig::default()
        };
        assert!(matches!(
            open(&config).await,
            Err(LinkError::UnknownTransport(t)) if t == "carrier-pigeon"
        ));
    }

    #[tokio::test]
    async fn tcp_connects_to_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = LinkConfig {
            transport: "tcp".into(),
            address: listener.local_addr().unwrap().to_string(),
            ..LinkConfig::default()
        };
        let (opened, accepted) = tokio::join!(open(&config), listener.accept());
        assert!(opened.is_ok());
        assert!(accepted.is_ok());
    }

    #[tokio::test]
    async fn missing_device_fails_to_open() {
        let config = LinkConfig {
            transport: "device".into(),
            address: "/nonexistent/rfcomm-test".into(),
            ..LinkConfig::default()
        };
        assert!(matches!(open(&config).await, Err(LinkError::Connect(_))));
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn device_keeps_polling_while_read_is_pending() {
        use crate::session::LinkSession;
        use std::os::fd::OwnedFd;
        use std::time::{Duration, Instant};
        use tokio::io::AsyncReadExt;

        let (local, peer) = std::os::unix::net::UnixStream::pair().unwrap();
        let device = DeviceStream::from_std(std::fs::File::from(OwnedFd::from(local))).unwrap();
        peer.set_nonblocking(true).unwrap();
        let mut peer = tokio::net::UnixStream::from_std(peer).unwrap();

        let config = LinkConfig {
            poll_interval_ms: 100,
            read_timeout_ms: 20,
            ..LinkConfig::default()
        };
        let (session, handle, _events) = LinkSession::new(device, &config);
        let task = tokio::spawn(session.run());

        // the peripheral stays silent, so every read on the device blocks
        let deadline = Instant::now() + Duration::from_millis(1000);
        let mut polls = Vec::new();
        let mut buf = [0u8; 64];
        while Instant::now() < deadline {
            let left = deadline.saturating_duration_since(Instant::now());
            if let Ok(Ok(n)) = tokio::time::timeout(left, peer.read(&mut buf)).await {
                polls.extend_from_slice(&buf[..n]);
            }
        }
        assert!(polls.len() >= 5, "only {} polls: {polls:?}", polls.len());
        assert!(polls.iter().all(|&b| b == b'e'));

        handle.close();
        // EOF unblocks the parked read so the session can finish
        drop(peer);
        task.await.unwrap().unwrap();
    }
}
