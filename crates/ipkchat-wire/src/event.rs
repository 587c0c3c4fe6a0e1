//! Decoded units received from the peer.

/// A unit received from the peer, already classified by kind.
///
/// `Ack` and `KeepAlive` occur only on the datagram transport. `Malformed`
/// stands in for anything outside the inbound grammar; the decoders return
/// it instead of an error because the transport boundary is adversarial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ReplyPositive { text: String },
    ReplyNegative { text: String },
    Message { from: String, text: String },
    ErrorNotice { from: String, text: String },
    Leave { from: String },
    Ack { ref_id: u16 },
    KeepAlive,
    Malformed { raw: String },
}

impl Event {
    /// Short kind name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ReplyPositive { .. } => "REPLY_OK",
            Self::ReplyNegative { .. } => "REPLY_NOK",
            Self::Message { .. } => "MSG",
            Self::ErrorNotice { .. } => "ERR",
            Self::Leave { .. } => "BYE",
            Self::Ack { .. } => "CONFIRM",
            Self::KeepAlive => "PING",
            Self::Malformed { .. } => "MALFORMED",
        }
    }
}
