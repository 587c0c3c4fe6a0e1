use std::fmt;

/// User-visible output produced by the session machine.
///
/// The machine never prints; it returns notices and the binary renders
/// them on stdout. Each variant maps to one fixed output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Positive server reply to an action we requested.
    ActionSuccess { text: String },
    /// Negative server reply to an action we requested.
    ActionFailure { text: String },
    /// A chat message from another participant.
    Chat { from: String, text: String },
    /// An error the peer sent us.
    PeerError { from: String, text: String },
    /// The peer left the session.
    PeerLeft { from: String },
    /// A locally detected problem; nothing was transmitted for it.
    LocalError { text: String },
    /// The local command reference.
    Help,
}

impl Notice {
    pub(crate) fn local_error(text: impl fmt::Display) -> Self {
        Self::LocalError {
            text: text.to_string(),
        }
    }
}
