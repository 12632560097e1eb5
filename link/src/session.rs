use chrono::Utc;
use homesec_common::command::Command;
use homesec_common::config::LinkConfig;
use homesec_common::frame::RawFrame;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::demux::StreamDemultiplexer;

const WRITE_TIMEOUT: Duration = Duration::from_secs(1);
const COMMAND_QUEUE: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("failed to connect to peripheral: {0}")]
    Connect(String),
    #[error("unknown transport {0:?}, expected 'tcp' or 'device'")]
    UnknownTransport(String),
    #[error("peripheral read failed: {0}")]
    Read(String),
}

/// What the reader loop hands to consumers.
#[derive(Debug)]
pub enum LinkEvent {
    Frame {
        frame: RawFrame,
        received_at_ms: i64,
    },
    /// Always the last event of a session. `reason` is set when a transport error ended it.
    Disconnected { reason: Option<String> },
}

struct Control {
    closed: AtomicBool,
    poll_interval_ms: AtomicU64,
}

/// Cheap, cloneable control surface for a running [`LinkSession`].
#[derive(Clone)]
pub struct LinkHandle {
    commands: mpsc::Sender<Command>,
    control: Arc<Control>,
}

impl LinkHandle {
    /// Queue a command for the peripheral. Returns `false` if it could not be queued.
    pub fn send(&self, command: Command) -> bool {
        match self.commands.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(?command, "command queue full, dropping command");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(?command, "link session gone, command not sent");
                false
            }
        }
    }

    /// Ask the reader loop to stop. Takes effect at its next iteration.
    pub fn close(&self) {
        self.control.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.control.closed.load(Ordering::Acquire) || self.commands.is_closed()
    }

    pub fn set_poll_interval(&self, interval: Duration) {
        let ms = (interval.as_millis() as u64).max(1);
        self.control.poll_interval_ms.store(ms, Ordering::Relaxed);
    }
}

/// Reader loop for one live connection.
///
/// All buffer mutation happens on the task running [`LinkSession::run`]; frames leave
/// through a bounded channel so slow consumers never hold up the transport.
pub struct LinkSession<T> {
    transport: T,
    demux: StreamDemultiplexer,
    events: mpsc::Sender<LinkEvent>,
    commands: mpsc::Receiver<Command>,
    control: Arc<Control>,
    poll_command: Command,
    read_timeout: Duration,
    read_chunk_bytes: usize,
}

impl<T> LinkSession<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(transport: T, config: &LinkConfig) -> (Self, LinkHandle, mpsc::Receiver<LinkEvent>) {
        let (events_tx, events_rx) = mpsc::channel(config.channel_capacity);
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE);
        let control = Arc::new(Control {
            closed: AtomicBool::new(false),
            poll_interval_ms: AtomicU64::new(config.poll_interval_ms),
        });

        let session = Self {
            transport,
            demux: StreamDemultiplexer::new(config.max_buffer_bytes),
            events: events_tx,
            commands: commands_rx,
            control: Arc::clone(&control),
            poll_command: config.poll_command,
            read_timeout: Duration::from_millis(config.read_timeout_ms),
            read_chunk_bytes: config.read_chunk_bytes,
        };
        let handle = LinkHandle {
            commands: commands_tx,
            control,
        };
        (session, handle, events_rx)
    }

    /// Drive the connection until it is closed, hits EOF, or fails to read.
    ///
    /// A final [`LinkEvent::Disconnected`] is sent in every case.
    pub async fn run(mut self) -> Result<(), LinkError> {
        let result = self.read_loop().await;
        self.demux.reset();

        let reason = result.as_ref().err().map(|e| e.to_string());
        if self
            .events
            .send(LinkEvent::Disconnected { reason })
            .await
            .is_err()
        {
            debug!("no consumer left for disconnect notice");
        }
        result
    }

    async fn read_loop(&mut self) -> Result<(), LinkError> {
        let mut read_buf = vec![0u8; self.read_chunk_bytes];
        let mut last_poll: Option<Instant> = None;

        loop {
            if self.control.closed.load(Ordering::Acquire) {
                info!("link session closed by caller");
                return Ok(());
            }

            let poll_interval =
                Duration::from_millis(self.control.poll_interval_ms.load(Ordering::Relaxed));
            if last_poll.map_or(true, |at| at.elapsed() >= poll_interval) {
                self.write_command(self.poll_command).await;
                last_poll = Some(Instant::now());
            }

            while let Ok(command) = self.commands.try_recv() {
                self.write_command(command).await;
            }

            match tokio::time::timeout(self.read_timeout, self.transport.read(&mut read_buf)).await
            {
                // nothing available this tick
                Err(_) => continue,
                Ok(Ok(0)) => {
                    info!("peripheral closed the stream");
                    return Ok(());
                }
                Ok(Ok(n)) => self.dispatch(&read_buf[..n]),
                Ok(Err(e)) => return Err(LinkError::Read(e.to_string())),
            }
        }
    }

    fn dispatch(&mut self, chunk: &[u8]) {
        let received_at_ms = Utc::now().timestamp_millis();
        for frame in self.demux.push(chunk) {
            let kind = frame.kind();
            match self.events.try_send(LinkEvent::Frame {
                frame,
                received_at_ms,
            }) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(kind, "frame channel full, dropping frame");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(kind, "frame consumer gone, dropping frame");
                }
            }
        }
    }

    /// Write failures are logged; only reads decide whether the link is alive.
    async fn write_command(&mut self, command: Command) {
        let byte = [command.as_byte()];
        let write = async {
            self.transport.write_all(&byte).await?;
            self.transport.flush().await?;
            Ok::<_, std::io::Error>(())
        };
        match tokio::time::timeout(WRITE_TIMEOUT, write).await {
            Ok(Ok(())) => debug!(?command, "command sent"),
            Ok(Err(e)) => warn!(error = %e, ?command, "failed to send command"),
            Err(_) => warn!(?command, "timed out sending command"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::DuplexStream;

    fn test_config() -> LinkConfig {
        LinkConfig {
            poll_interval_ms: 300,
            read_timeout_ms: 20,
            ..LinkConfig::default()
        }
    }

    async fn next_frame(rx: &mut mpsc::Receiver<LinkEvent>) -> RawFrame {
        match rx.recv().await {
            Some(LinkEvent::Frame { frame, .. }) => frame,
            other => panic!("expected frame, got {other:?}"),
        }
    }

    fn spawn_session(
        config: &LinkConfig,
    ) -> (
        DuplexStream,
        LinkHandle,
        mpsc::Receiver<LinkEvent>,
        tokio::task::JoinHandle<Result<(), LinkError>>,
    ) {
        let (local, peripheral) = tokio::io::duplex(64 * 1024);
        let (session, handle, events) = LinkSession::new(local, config);
        let task = tokio::spawn(session.run());
        (peripheral, handle, events, task)
    }

    #[tokio::test]
    async fn frames_flow_in_order() {
        let (mut peripheral, handle, mut events, task) = spawn_session(&test_config());

        peripheral.write_all(b"ALARM ON\r\n\xFF\xD8ab").await.unwrap();
        peripheral.write_all(b"c\xFF\xD9SOUND=3%\n").await.unwrap();

        assert_eq!(next_frame(&mut events).await, RawFrame::TextLine("ALARM ON".into()));
        assert_eq!(
            next_frame(&mut events).await,
            RawFrame::JpegImage(b"\xFF\xD8abc\xFF\xD9".to_vec())
        );
        assert_eq!(next_frame(&mut events).await, RawFrame::TextLine("SOUND=3%".into()));

        handle.close();
        assert!(task.await.unwrap().is_ok());
        assert!(matches!(
            events.recv().await,
            Some(LinkEvent::Disconnected { reason: None })
        ));
    }

    #[tokio::test]
    async fn polls_immediately_and_forwards_commands() {
        let (mut peripheral, handle, _events, task) = spawn_session(&test_config());

        let mut byte = [0u8; 1];
        peripheral.read_exact(&mut byte).await.unwrap();
        assert_eq!(byte[0], b'e');

        assert!(handle.send(Command::AlarmOn));
        peripheral.read_exact(&mut byte).await.unwrap();
        assert_eq!(byte[0], b'a');

        handle.close();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn polls_on_interval() {
        let config = LinkConfig {
            poll_command: Command::RequestClimate,
            ..test_config()
        };
        let (mut peripheral, handle, _events, task) = spawn_session(&config);

        let started = Instant::now();
        let mut byte = [0u8; 1];
        for _ in 0..3 {
            peripheral.read_exact(&mut byte).await.unwrap();
            assert_eq!(byte[0], b't');
        }
        // first poll at t=0, then one per 300 ms interval
        assert!(started.elapsed() >= Duration::from_millis(600));

        handle.close();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn poll_interval_change_applies_to_next_poll() {
        let (mut peripheral, handle, _events, task) = spawn_session(&test_config());

        let mut byte = [0u8; 1];
        peripheral.read_exact(&mut byte).await.unwrap();
        let first = Instant::now();
        handle.set_poll_interval(Duration::from_millis(1000));

        peripheral.read_exact(&mut byte).await.unwrap();
        assert_eq!(byte[0], b'e');
        assert!(first.elapsed() >= Duration::from_millis(1000));
        assert!(first.elapsed() < Duration::from_millis(1100));

        handle.close();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn eof_ends_session_with_disconnect() {
        let (peripheral, _handle, mut events, task) = spawn_session(&test_config());
        drop(peripheral);

        assert!(task.await.unwrap().is_ok());
        assert!(matches!(
            events.recv().await,
            Some(LinkEvent::Disconnected { reason: None })
        ));
    }

    #[tokio::test]
    async fn handle_reports_closed() {
        let (_peripheral, handle, _events, task) = spawn_session(&test_config());
        assert!(!handle.is_closed());
        handle.close();
        assert!(handle.is_closed());
        task.await.unwrap().unwrap();
        assert!(!handle.send(Command::AlarmOff));
    }
}
