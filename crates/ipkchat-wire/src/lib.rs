//! Message model and wire codecs for the IPK-chat protocol.
//!
//! One message model, two encodings: a human-readable CRLF line protocol
//! for the stream transport and a tagged binary framing for the datagram
//! transport. Field limits are enforced when an [`Intent`] is constructed,
//! so the encoders never re-validate; the decoders never fail, returning
//! [`Event::Malformed`] for anything outside the inbound grammar.

pub mod dgram;
pub mod error;
pub mod event;
pub mod intent;
pub mod line;

pub use error::{Result, WireError};
pub use event::Event;
pub use intent::{Intent, MAX_CONTENT_LEN, MAX_DISPLAY_NAME_LEN, MAX_ID_LEN, MAX_SECRET_LEN};
