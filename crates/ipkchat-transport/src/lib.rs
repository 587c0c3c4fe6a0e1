//! Chat transports for the IPK-chat client.
//!
//! Two implementations of one contract: a stream transport speaking CRLF
//! lines over TCP, and a datagram transport speaking tagged binary frames
//! over UDP with the confirm/retransmit reliability layer on top. The
//! session layer talks to either through the [`Transport`] trait and never
//! sees sequence ids, confirms or retransmissions.

pub mod error;
pub mod tcp;
pub mod traits;
pub mod udp;

pub use error::{Result, TransportError};
pub use tcp::{TcpConfig, TcpTransport};
pub use traits::{EventSink, ShutdownSignal, Transport};
pub use udp::{UdpConfig, UdpTransport};
