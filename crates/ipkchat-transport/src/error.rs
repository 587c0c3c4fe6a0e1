use std::net::SocketAddr;

/// Errors surfaced by the chat transports.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to reach the server.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Socket-level failure after connect.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The intent has no encoding on this transport.
    #[error("encode error: {0}")]
    Wire(#[from] ipkchat_wire::WireError),

    /// Send attempted before connect or after disconnect.
    #[error("transport is not connected")]
    NotConnected,

    /// A previous datagram send is still waiting for its confirmation.
    #[error("message {seq} is still awaiting confirmation")]
    AckPending { seq: u16 },
}

impl TransportError {
    /// Whether the session must terminate over this error.
    ///
    /// `AckPending` is the one recoverable case: the rejected command is
    /// dropped and the session stays where it was.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::AckPending { .. })
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
