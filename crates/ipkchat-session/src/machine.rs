//! The session state machine.

use std::sync::{Arc, OnceLock};

use ipkchat_transport::Transport;
use ipkchat_wire::{Event, Intent};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::command::UserCommand;
use crate::notice::Notice;
use crate::state::SessionState;

/// Display name before the first `/auth` or `/rename`.
const DEFAULT_DISPLAY_NAME: &str = "User";

/// Why the session reached [`SessionState::Terminated`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndCause {
    /// The local user left (command, empty input, EOF or interrupt).
    LocalLeave,
    /// The peer said `BYE`.
    PeerLeft,
    /// The peer sent `ERR`.
    PeerError,
    /// The peer broke the protocol: an event illegal in the current
    /// state, or an undecodable inbound unit.
    ProtocolViolation,
    /// The transport failed or demanded shutdown on its own.
    TransportFailed,
}

impl EndCause {
    /// Whether the session ended the way a session is supposed to end.
    pub fn is_clean(self) -> bool {
        matches!(self, Self::LocalLeave | Self::PeerLeft)
    }
}

struct Inner {
    state: SessionState,
    display_name: String,
}

/// The single source of truth for protocol state.
///
/// One lock serializes every transition: handling a local command and
/// handling an inbound event can never interleave, and the lock is held
/// across the transport send a transition depends on. The machine never
/// calls back into itself, so the lock is never taken twice.
///
/// Terminal conditions all converge here. Whatever ends the session, the
/// state becomes `Terminated` exactly once, the cause is recorded, and
/// the termination signal trips so the orchestrator can stop the input
/// loop and disconnect.
pub struct SessionMachine<T: Transport> {
    transport: Arc<T>,
    inner: Mutex<Inner>,
    ended: CancellationToken,
    cause: OnceLock<EndCause>,
}

impl<T: Transport> SessionMachine<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            inner: Mutex::new(Inner {
                state: SessionState::Start,
                display_name: DEFAULT_DISPLAY_NAME.to_string(),
            }),
            ended: CancellationToken::new(),
            cause: OnceLock::new(),
        }
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    pub async fn display_name(&self) -> String {
        self.inner.lock().await.display_name.clone()
    }

    pub fn is_terminated(&self) -> bool {
        self.ended.is_cancelled()
    }

    /// Resolves once the session reaches `Terminated`, however it got
    /// there.
    pub async fn terminated(&self) {
        self.ended.cancelled().await;
    }

    /// Why the session ended; `None` while it is still running.
    pub fn end_cause(&self) -> Option<EndCause> {
        self.cause.get().copied()
    }

    /// Handle one local command against the on-send table.
    ///
    /// Disallowed commands are rejected with a local error: nothing is
    /// transmitted and the state does not change.
    pub async fn handle_command(&self, command: UserCommand) -> Vec<Notice> {
        let mut inner = self.inner.lock().await;
        match command {
            UserCommand::Help => vec![Notice::Help],

            UserCommand::Rename { display_name } => match Intent::rename(display_name) {
                Ok(Intent::Rename { display_name }) => {
                    debug!(name = %display_name, "display name changed");
                    inner.display_name = display_name;
                    Vec::new()
                }
                Ok(_) => Vec::new(),
                Err(err) => vec![Notice::local_error(err)],
            },

            UserCommand::Authenticate {
                username,
                secret,
                display_name,
            } => {
                match inner.state {
                    SessionState::Start | SessionState::Authenticating => {}
                    SessionState::Open | SessionState::Joining => {
                        return vec![Notice::local_error("already authenticated")];
                    }
                    SessionState::Terminated => return self.after_end(),
                }
                let intent = match Intent::authenticate(username, display_name, secret) {
                    Ok(intent) => intent,
                    Err(err) => return vec![Notice::local_error(err)],
                };
                let mut notices = Vec::new();
                if self.transmit(&mut inner, &intent, &mut notices).await {
                    if let Intent::Authenticate { display_name, .. } = intent {
                        inner.display_name = display_name;
                    }
                    self.transition(&mut inner, SessionState::Authenticating);
                }
                notices
            }

            UserCommand::Join { channel } => {
                match inner.state {
                    SessionState::Open => {}
                    SessionState::Start | SessionState::Authenticating => {
                        return vec![Notice::local_error("you must authenticate first")];
                    }
                    SessionState::Joining => {
                        return vec![Notice::local_error(
                            "still waiting for the previous join to finish",
                        )];
                    }
                    SessionState::Terminated => return self.after_end(),
                }
                let intent = match Intent::join(channel, inner.display_name.clone()) {
                    Ok(intent) => intent,
                    Err(err) => return vec![Notice::local_error(err)],
                };
                let mut notices = Vec::new();
                if self.transmit(&mut inner, &intent, &mut notices).await {
                    self.transition(&mut inner, SessionState::Joining);
                }
                notices
            }

            UserCommand::Message { content } => {
                match inner.state {
                    SessionState::Open => {}
                    SessionState::Start | SessionState::Authenticating => {
                        return vec![Notice::local_error("you must authenticate first")];
                    }
                    SessionState::Joining => {
                        return vec![Notice::local_error(
                            "cannot send messages while joining a channel",
                        )];
                    }
                    SessionState::Terminated => return self.after_end(),
                }
                let intent = match Intent::message(inner.display_name.clone(), content) {
                    Ok(intent) => intent,
                    Err(err) => return vec![Notice::local_error(err)],
                };
                let mut notices = Vec::new();
                self.transmit(&mut inner, &intent, &mut notices).await;
                notices
            }

            UserCommand::Leave => {
                if inner.state == SessionState::Terminated {
                    return self.after_end();
                }
                // Leaving always succeeds locally; the BYE on the wire is
                // best effort so EOF can end the session even when the
                // transport cannot take another send.
                match Intent::leave(inner.display_name.clone()) {
                    Ok(intent) => self.best_effort_send(&intent).await,
                    Err(err) => debug!(%err, "BYE not encodable"),
                }
                self.terminate(&mut inner, EndCause::LocalLeave);
                Vec::new()
            }
        }
    }

    /// Handle one inbound event against the on-receive table.
    ///
    /// The cross-cutting rules come first: `Malformed` and a peer `ERR`
    /// are terminal in any state, and `PING` is accepted everywhere
    /// without output. Everything else dispatches on the current state.
    pub async fn handle_event(&self, event: Event) -> Vec<Notice> {
        let mut inner = self.inner.lock().await;
        if inner.state == SessionState::Terminated {
            debug!(kind = event.kind(), "event ignored after termination");
            return Vec::new();
        }
        match event {
            Event::KeepAlive => Vec::new(),
            // Confirms are consumed inside the datagram transport; one
            // showing up here is tolerated, not acted on.
            Event::Ack { ref_id } => {
                debug!(ref_id, "stray confirm ignored");
                Vec::new()
            }

            Event::Malformed { raw } => {
                warn!(%raw, "malformed message from server");
                self.notify_violation(&mut inner, "malformed message received")
                    .await;
                self.terminate(&mut inner, EndCause::ProtocolViolation);
                vec![Notice::local_error(format!(
                    "unknown message from server: {raw}"
                ))]
            }

            Event::ErrorNotice { from, text } => {
                self.send_leave(&inner).await;
                self.terminate(&mut inner, EndCause::PeerError);
                vec![Notice::PeerError { from, text }]
            }

            event => match inner.state {
                // The server spoke before we authenticated.
                SessionState::Start => {
                    self.terminate(&mut inner, EndCause::ProtocolViolation);
                    vec![Notice::local_error(format!(
                        "server sent {} before authentication",
                        event.kind()
                    ))]
                }
                SessionState::Authenticating => self.on_authenticating(&mut inner, event).await,
                SessionState::Open => self.on_open(&mut inner, event).await,
                SessionState::Joining => self.on_joining(&mut inner, event),
                SessionState::Terminated => unreachable!("handled above"),
            },
        }
    }

    /// Terminate on behalf of the transport or orchestrator: a reply that
    /// never came, an exhausted confirm budget, a dead connection.
    pub async fn abort(&self, reason: &str) -> Vec<Notice> {
        let mut inner = self.inner.lock().await;
        if inner.state == SessionState::Terminated {
            return Vec::new();
        }
        self.terminate(&mut inner, EndCause::TransportFailed);
        vec![Notice::local_error(reason)]
    }

    async fn on_authenticating(&self, inner: &mut Inner, event: Event) -> Vec<Notice> {
        match event {
            Event::ReplyPositive { text } => {
                self.transition(inner, SessionState::Open);
                vec![Notice::ActionSuccess { text }]
            }
            Event::ReplyNegative { text } => vec![Notice::ActionFailure { text }],
            Event::Message { .. } => {
                self.notify_violation(inner, "unexpected MSG before authentication")
                    .await;
                self.terminate(inner, EndCause::ProtocolViolation);
                vec![Notice::local_error(
                    "server sent a message before authentication finished",
                )]
            }
            Event::Leave { from } => {
                self.terminate(inner, EndCause::PeerLeft);
                vec![Notice::PeerLeft { from }]
            }
            _ => unreachable!("cross-cutting events handled before dispatch"),
        }
    }

    async fn on_open(&self, inner: &mut Inner, event: Event) -> Vec<Notice> {
        match event {
            Event::ReplyPositive { .. } | Event::ReplyNegative { .. } => {
                if let Ok(intent) =
                    Intent::error_notice(inner.display_name.clone(), "unexpected REPLY")
                {
                    self.best_effort_send(&intent).await;
                }
                self.terminate(inner, EndCause::ProtocolViolation);
                vec![Notice::local_error("unexpected reply from server")]
            }
            Event::Message { from, text } => vec![Notice::Chat { from, text }],
            Event::Leave { from } => {
                self.terminate(inner, EndCause::PeerLeft);
                vec![Notice::PeerLeft { from }]
            }
            _ => unreachable!("cross-cutting events handled before dispatch"),
        }
    }

    fn on_joining(&self, inner: &mut Inner, event: Event) -> Vec<Notice> {
        match event {
            Event::ReplyPositive { text } => {
                self.transition(inner, SessionState::Open);
                vec![Notice::ActionSuccess { text }]
            }
            Event::ReplyNegative { text } => {
                self.transition(inner, SessionState::Open);
                vec![Notice::ActionFailure { text }]
            }
            Event::Message { from, text } => vec![Notice::Chat { from, text }],
            Event::Leave { from } => {
                self.terminate(inner, EndCause::PeerLeft);
                vec![Notice::PeerLeft { from }]
            }
            _ => unreachable!("cross-cutting events handled before dispatch"),
        }
    }

    /// Send an intent a state transition depends on.
    ///
    /// A fatal transport error is terminal; the non-fatal rejection (a
    /// datagram still awaiting its confirm) is reported and otherwise
    /// changes nothing.
    async fn transmit(&self, inner: &mut Inner, intent: &Intent, notices: &mut Vec<Notice>) -> bool {
        match self.transport.send(intent).await {
            Ok(()) => {
                debug!(kind = intent.kind(), "command sent");
                true
            }
            Err(err) if err.is_fatal() => {
                notices.push(Notice::local_error(&err));
                self.terminate(inner, EndCause::TransportFailed);
                false
            }
            Err(err) => {
                notices.push(Notice::local_error(err));
                false
            }
        }
    }

    /// Tell the peer we saw a violation: `ERR`, then `BYE`. The session
    /// is ending either way, so failures are only logged.
    async fn notify_violation(&self, inner: &Inner, detail: &str) {
        if let Ok(intent) = Intent::error_notice(inner.display_name.clone(), detail) {
            self.best_effort_send(&intent).await;
        }
        self.send_leave(inner).await;
    }

    async fn send_leave(&self, inner: &Inner) {
        if let Ok(intent) = Intent::leave(inner.display_name.clone()) {
            self.best_effort_send(&intent).await;
        }
    }

    async fn best_effort_send(&self, intent: &Intent) {
        if let Err(err) = self.transport.send(intent).await {
            debug!(kind = intent.kind(), %err, "peer notification not sent");
        }
    }

    fn transition(&self, inner: &mut Inner, next: SessionState) {
        if inner.state != next {
            debug!(from = inner.state.name(), to = next.name(), "state transition");
            inner.state = next;
        }
    }

    fn terminate(&self, inner: &mut Inner, cause: EndCause) {
        if inner.state != SessionState::Terminated {
            debug!(from = inner.state.name(), ?cause, "session terminated");
            inner.state = SessionState::Terminated;
            let _ = self.cause.set(cause);
            self.ended.cancel();
        }
    }

    fn after_end(&self) -> Vec<Notice> {
        vec![Notice::local_error("the session has ended")]
    }
}
