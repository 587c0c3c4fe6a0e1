//! Datagram transport: tagged binary frames over UDP with the
//! confirm/retransmit reliability layer.
//!
//! Every wire intent consumes one sequence id and must be confirmed by
//! the server before the next one may go out (single outstanding send).
//! Inbound frames are confirmed before they are forwarded, duplicates are
//! confirmed again and dropped, and the server's ephemeral endpoint is
//! latched from the first datagram it sends us.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use ipkchat_wire::{dgram, Event, Intent};
use tokio::net::UdpSocket;
use tokio::sync::{oneshot, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Result, TransportError};
use crate::traits::{EventSink, ShutdownSignal, Transport};

const MAX_DATAGRAM: usize = 65_535;

/// Reliability parameters for the datagram transport.
#[derive(Debug, Clone, Copy)]
pub struct UdpConfig {
    /// How long a sent frame may wait for its CONFIRM before it is
    /// retransmitted.
    pub ack_timeout: Duration,
    /// How many retransmissions follow the initial transmission.
    pub retries: u32,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_millis(250),
            retries: 3,
        }
    }
}

/// Bookkeeping for one unacknowledged outbound datagram.
#[derive(Debug)]
struct PendingSend {
    seq: u16,
    payload: Bytes,
    attempts: u32,
    deadline: Instant,
    ack_tx: oneshot::Sender<()>,
}

/// The single outstanding send slot plus the sequence id counter.
#[derive(Debug, Default)]
struct SendWindow {
    pending: Option<PendingSend>,
    next_seq: u16,
}

struct Remote {
    addr: SocketAddr,
    latched: bool,
}

struct Shared {
    config: UdpConfig,
    socket: Mutex<Option<Arc<UdpSocket>>>,
    remote: Mutex<Remote>,
    window: Mutex<SendWindow>,
    seen: Mutex<HashSet<u16>>,
    shutdown: ShutdownSignal,
    lifecycle: CancellationToken,
}

impl Shared {
    async fn dest(&self) -> SocketAddr {
        self.remote.lock().await.addr
    }

    /// Pin all future sends to the first endpoint the server answers from.
    async fn latch_remote(&self, from: SocketAddr) {
        let mut remote = self.remote.lock().await;
        if !remote.latched {
            remote.latched = true;
            remote.addr = from;
            debug!(%from, "server endpoint latched");
        }
    }

    /// Match a CONFIRM against the outstanding send, atomically with any
    /// concurrently firing retransmission timeout.
    async fn resolve_confirm(&self, ref_id: u16) {
        let mut window = self.window.lock().await;
        match window.pending.take() {
            Some(pending) if pending.seq == ref_id => {
                debug!(seq = ref_id, "send confirmed");
                let _ = pending.ack_tx.send(());
            }
            other => {
                debug!(ref_id, "confirm without matching send");
                window.pending = other;
            }
        }
    }
}

enum RetryAction {
    Resend { payload: Bytes, attempt: u32 },
    GiveUp { attempts: u32 },
}

/// Watches one pending send until it is confirmed, cancelled, or out of
/// budget. The decision to retransmit is made under the window lock, so a
/// confirm and a timeout can never both act on the same deadline.
async fn retransmit_loop(
    shared: Arc<Shared>,
    socket: Arc<UdpSocket>,
    seq: u16,
    mut ack_rx: oneshot::Receiver<()>,
) {
    loop {
        let deadline = {
            let window = shared.window.lock().await;
            match &window.pending {
                Some(pending) if pending.seq == seq => pending.deadline,
                _ => return,
            }
        };

        tokio::select! {
            _ = &mut ack_rx => return,
            _ = shared.lifecycle.cancelled() => return,
            _ = tokio::time::sleep_until(deadline) => {}
        }

        let action = {
            let mut window = shared.window.lock().await;
            match window.pending.take() {
                Some(mut pending) if pending.seq == seq => {
                    if pending.attempts > shared.config.retries {
                        RetryAction::GiveUp {
                            attempts: pending.attempts,
                        }
                    } else {
                        pending.attempts += 1;
                        pending.deadline = Instant::now() + shared.config.ack_timeout;
                        let payload = pending.payload.clone();
                        let attempt = pending.attempts;
                        window.pending = Some(pending);
                        RetryAction::Resend { payload, attempt }
                    }
                }
                other => {
                    window.pending = other;
                    return;
                }
            }
        };

        match action {
            RetryAction::Resend { payload, attempt } => {
                let dest = shared.dest().await;
                if let Err(err) = socket.send_to(&payload, dest).await {
                    warn!(seq, %err, "retransmission failed");
                    shared
                        .shutdown
                        .raise(format!("failed to retransmit message {seq}: {err}"));
                    return;
                }
                debug!(seq, attempt, "datagram retransmitted");
            }
            RetryAction::GiveUp { attempts } => {
                warn!(seq, attempts, "confirm budget exhausted");
                shared.shutdown.raise(format!(
                    "no CONFIRM for message {seq} after {attempts} transmissions"
                ));
                return;
            }
        }
    }
}

/// Chat transport over UDP.
pub struct UdpTransport {
    shared: Arc<Shared>,
}

impl UdpTransport {
    pub fn new(server: SocketAddr) -> Self {
        Self::with_config(server, UdpConfig::default())
    }

    pub fn with_config(server: SocketAddr, config: UdpConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                socket: Mutex::new(None),
                remote: Mutex::new(Remote {
                    addr: server,
                    latched: false,
                }),
                window: Mutex::new(SendWindow::default()),
                seen: Mutex::new(HashSet::new()),
                shutdown: ShutdownSignal::new(),
                lifecycle: CancellationToken::new(),
            }),
        }
    }

    async fn socket_handle(&self) -> Result<Arc<UdpSocket>> {
        self.shared
            .socket
            .lock()
            .await
            .clone()
            .ok_or(TransportError::NotConnected)
    }
}

impl Transport for UdpTransport {
    async fn connect(&self) -> Result<()> {
        let server = self.shared.dest().await;
        let bind_addr = match server {
            SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|source| TransportError::Connect {
                addr: server,
                source,
            })?;
        debug!(server = %server, "datagram transport bound");
        *self.shared.socket.lock().await = Some(Arc::new(socket));
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.shared.lifecycle.cancel();
        self.shared.window.lock().await.pending = None;
        if self.shared.socket.lock().await.take().is_some() {
            debug!("datagram transport closed");
        }
        Ok(())
    }

    async fn send(&self, intent: &Intent) -> Result<()> {
        let socket = self.socket_handle().await?;

        let (payload, seq, ack_rx) = {
            let mut window = self.shared.window.lock().await;
            if let Some(pending) = &window.pending {
                return Err(TransportError::AckPending { seq: pending.seq });
            }
            let seq = window.next_seq;
            let payload = Bytes::from(dgram::encode(intent, seq)?);
            window.next_seq = window.next_seq.wrapping_add(1);
            let (ack_tx, ack_rx) = oneshot::channel();
            window.pending = Some(PendingSend {
                seq,
                payload: payload.clone(),
                attempts: 1,
                deadline: Instant::now() + self.shared.config.ack_timeout,
                ack_tx,
            });
            (payload, seq, ack_rx)
        };

        let dest = self.shared.dest().await;
        if let Err(err) = socket.send_to(&payload, dest).await {
            self.shared.window.lock().await.pending = None;
            return Err(err.into());
        }
        debug!(kind = intent.kind(), seq, "datagram sent");

        tokio::spawn(retransmit_loop(
            Arc::clone(&self.shared),
            socket,
            seq,
            ack_rx,
        ));
        Ok(())
    }

    async fn run_receive_loop(&self, sink: EventSink, cancel: CancellationToken) -> Result<()> {
        let socket = self.socket_handle().await?;
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let (len, from) = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("receive loop cancelled");
                    return Ok(());
                }
                recv = socket.recv_from(&mut buf) => recv?,
            };
            self.shared.latch_remote(from).await;

            let inbound = dgram::decode(&buf[..len]);
            match inbound.event {
                Event::Ack { ref_id } => {
                    // Consumed here; the session layer never sees confirms.
                    self.shared.resolve_confirm(ref_id).await;
                }
                event => {
                    if let Some(seq) = inbound.seq {
                        let confirm = dgram::encode_confirm(seq);
                        if let Err(err) = socket.send_to(&confirm, from).await {
                            warn!(seq, %err, "failed to send confirm");
                        }
                        if !self.shared.seen.lock().await.insert(seq) {
                            debug!(seq, "duplicate datagram dropped");
                            continue;
                        }
                    }
                    debug!(kind = event.kind(), seq = ?inbound.seq, "datagram received");
                    if sink.send(event).is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shared.shutdown
    }
}
