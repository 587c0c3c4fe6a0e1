//! Session layer for the IPK-chat client.
//!
//! The [`SessionMachine`] is the single source of truth for protocol
//! state. It consumes [`UserCommand`] values from the local input surface
//! and [`Event`](ipkchat_wire::Event) values from the transport, decides
//! what may be sent, what terminates the session and what the user gets
//! to see, and serializes all of it under one lock so command handling
//! and event handling never interleave.

pub mod command;
pub mod machine;
pub mod notice;
pub mod state;

pub use command::UserCommand;
pub use machine::{EndCause, SessionMachine};
pub use notice::Notice;
pub use state::SessionState;
