/// Protocol state of one chat session.
///
/// Exactly one value is active per session; only the
/// [`SessionMachine`](crate::SessionMachine) mutates it, under its lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, nothing sent yet.
    Start,
    /// `AUTH` sent, waiting for the server's reply.
    Authenticating,
    /// Authenticated, free to chat and join channels.
    Open,
    /// `JOIN` sent, waiting for the join outcome.
    Joining,
    /// The session is over; nothing may be sent or received.
    Terminated,
}

impl SessionState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Authenticating => "authenticating",
            Self::Open => "open",
            Self::Joining => "joining",
            Self::Terminated => "terminated",
        }
    }
}
