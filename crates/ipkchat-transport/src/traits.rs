//! The contract both chat transports implement.

use std::future::Future;
use std::sync::{Arc, OnceLock};

use ipkchat_wire::{Event, Intent};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Where decoded inbound events are delivered, in arrival order.
pub type EventSink = mpsc::UnboundedSender<Event>;

/// Liveness signal a transport raises to demand session shutdown
/// independent of any received event.
///
/// Clones share the same signal. It trips at most once; the first
/// recorded reason wins.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
    reason: Arc<OnceLock<String>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the cause and trip the signal.
    pub fn raise(&self, reason: impl Into<String>) {
        let _ = self.reason.set(reason.into());
        self.token.cancel();
    }

    pub fn is_raised(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until the signal trips.
    pub async fn raised(&self) {
        self.token.cancelled().await;
    }

    pub fn reason(&self) -> Option<String> {
        self.reason.get().cloned()
    }
}

/// Chat transport contract shared by the stream and datagram
/// implementations.
///
/// `run_receive_loop` stays on the calling task until the connection
/// closes or `cancel` fires, delivering one event per decoded inbound
/// unit through `sink`. `disconnect` is idempotent and safe after a
/// failed or absent `connect`. The shutdown signal trips when the
/// transport itself decides the session is over: a reply that never
/// arrived on the stream transport, an exhausted confirm budget on the
/// datagram transport.
pub trait Transport: Send + Sync + 'static {
    fn connect(&self) -> impl Future<Output = Result<()>> + Send;

    fn disconnect(&self) -> impl Future<Output = Result<()>> + Send;

    fn send(&self, intent: &Intent) -> impl Future<Output = Result<()>> + Send;

    fn run_receive_loop(
        &self,
        sink: EventSink,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<()>> + Send;

    /// The transport's own demand for session shutdown.
    fn shutdown_signal(&self) -> &ShutdownSignal;

    /// Poll form of [`Transport::shutdown_signal`].
    fn should_terminate(&self) -> bool {
        self.shutdown_signal().is_raised()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_raise_wins() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_raised());
        assert_eq!(signal.reason(), None);

        signal.raise("first");
        signal.raise("second");
        assert!(signal.is_raised());
        assert_eq!(signal.reason().as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn raised_unblocks_waiters() {
        let signal = ShutdownSignal::new();
        let waiter = signal.clone();
        let task = tokio::spawn(async move {
            waiter.raised().await;
            waiter.reason()
        });
        signal.raise("done");
        let reason = task.await.expect("waiter task");
        assert_eq!(reason.as_deref(), Some("done"));
    }
}
