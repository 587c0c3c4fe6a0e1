//! Stream transport: one long-lived TCP connection speaking CRLF lines.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::BytesMut;
use ipkchat_wire::{line, Event, Intent};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Result, TransportError};
use crate::traits::{EventSink, ShutdownSignal, Transport};

const READ_CHUNK: usize = 4096;
const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Stream transport tuning.
#[derive(Debug, Clone, Copy)]
pub struct TcpConfig {
    /// How long `AUTH`/`JOIN` may wait for a `REPLY` before the transport
    /// demands session shutdown.
    pub reply_timeout: Duration,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }
}

/// Chat transport over one TCP connection.
pub struct TcpTransport {
    addr: SocketAddr,
    config: TcpConfig,
    reader: Mutex<Option<OwnedReadHalf>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    reply_timer: Mutex<Option<CancellationToken>>,
    shutdown: ShutdownSignal,
}

impl TcpTransport {
    pub fn new(addr: SocketAddr) -> Self {
        Self::with_config(addr, TcpConfig::default())
    }

    pub fn with_config(addr: SocketAddr, config: TcpConfig) -> Self {
        Self {
            addr,
            config,
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            reply_timer: Mutex::new(None),
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Arm the reply watchdog; a previous one is replaced, as on an
    /// `AUTH` resend.
    async fn arm_reply_timer(&self) {
        let token = CancellationToken::new();
        {
            let mut slot = self.reply_timer.lock().await;
            if let Some(old) = slot.take() {
                old.cancel();
            }
            *slot = Some(token.clone());
        }
        let timeout = self.config.reply_timeout;
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    warn!(?timeout, "no reply from server");
                    shutdown.raise(format!(
                        "no REPLY from server within {} ms",
                        timeout.as_millis()
                    ));
                }
            }
        });
    }

    async fn disarm_reply_timer(&self) {
        if let Some(token) = self.reply_timer.lock().await.take() {
            token.cancel();
        }
    }

    async fn forward(&self, sink: &EventSink, event: Event) -> bool {
        debug!(kind = event.kind(), "line received");
        if matches!(
            event,
            Event::ReplyPositive { .. } | Event::ReplyNegative { .. }
        ) {
            self.disarm_reply_timer().await;
        }
        sink.send(event).is_ok()
    }
}

impl Transport for TcpTransport {
    async fn connect(&self) -> Result<()> {
        let stream = TcpStream::connect(self.addr)
            .await
            .map_err(|source| TransportError::Connect {
                addr: self.addr,
                source,
            })?;
        debug!(addr = %self.addr, "stream transport connected");
        let (read_half, write_half) = stream.into_split();
        *self.reader.lock().await = Some(read_half);
        *self.writer.lock().await = Some(write_half);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.disarm_reply_timer().await;
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
            debug!("stream transport disconnected");
        }
        self.reader.lock().await.take();
        Ok(())
    }

    async fn send(&self, intent: &Intent) -> Result<()> {
        let line = line::encode(intent)?;
        {
            let mut guard = self.writer.lock().await;
            let writer = guard.as_mut().ok_or(TransportError::NotConnected)?;
            writer.write_all(line.as_bytes()).await?;
        }
        debug!(kind = intent.kind(), "line sent");
        if matches!(intent, Intent::Authenticate { .. } | Intent::Join { .. }) {
            self.arm_reply_timer().await;
        }
        Ok(())
    }

    async fn run_receive_loop(&self, sink: EventSink, cancel: CancellationToken) -> Result<()> {
        let mut reader = self
            .reader
            .lock()
            .await
            .take()
            .ok_or(TransportError::NotConnected)?;
        let mut buf = BytesMut::with_capacity(READ_CHUNK);
        loop {
            let read = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("receive loop cancelled");
                    return Ok(());
                }
                read = reader.read_buf(&mut buf) => read?,
            };
            if read == 0 {
                debug!("server closed the connection");
                // A final line the server never terminated still decodes.
                if !buf.is_empty() {
                    let raw = String::from_utf8_lossy(&buf).into_owned();
                    self.forward(&sink, line::decode(&raw)).await;
                }
                return Ok(());
            }
            while let Some(raw) = line::take_line(&mut buf) {
                if !self.forward(&sink, line::decode(&raw)).await {
                    return Ok(());
                }
            }
        }
    }

    fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }
}
