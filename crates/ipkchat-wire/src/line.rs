//! CRLF line codec for the stream transport.

use bytes::{Buf, BytesMut};

use crate::error::{Result, WireError};
use crate::event::Event;
use crate::intent::Intent;

const CRLF: &str = "\r\n";

/// Render an intent as one CRLF-terminated protocol line.
pub fn encode(intent: &Intent) -> Result<String> {
    let line = match intent {
        Intent::Authenticate {
            username,
            display_name,
            secret,
        } => format!("AUTH {username} AS {display_name} USING {secret}"),
        Intent::Join {
            channel,
            display_name,
        } => format!("JOIN {channel} AS {display_name}"),
        Intent::Message {
            display_name,
            content,
        } => format!("MSG FROM {display_name} IS {content}"),
        Intent::ErrorNotice {
            display_name,
            content,
        } => format!("ERR FROM {display_name} IS {content}"),
        Intent::Leave { display_name } => format!("BYE FROM {display_name}"),
        Intent::Rename { .. } | Intent::Help => {
            return Err(WireError::LocalIntent(intent.kind()))
        }
    };
    Ok(line + CRLF)
}

/// Decode one received line into an event.
///
/// Trailing CRLF/whitespace is stripped first. Anything that does not
/// match the inbound grammar comes back as [`Event::Malformed`] carrying
/// the trimmed input; this function never fails.
pub fn decode(raw: &str) -> Event {
    let line = raw.trim_end();
    if let Some(text) = line.strip_prefix("REPLY OK IS ") {
        return Event::ReplyPositive {
            text: text.to_string(),
        };
    }
    if let Some(text) = line.strip_prefix("REPLY NOK IS ") {
        return Event::ReplyNegative {
            text: text.to_string(),
        };
    }
    if let Some(rest) = line.strip_prefix("MSG FROM ") {
        // Content may itself contain " IS ", so split on the first one.
        if let Some((from, text)) = rest.split_once(" IS ") {
            return Event::Message {
                from: from.to_string(),
                text: text.to_string(),
            };
        }
    }
    if let Some(rest) = line.strip_prefix("ERR FROM ") {
        if let Some((from, text)) = rest.split_once(" IS ") {
            return Event::ErrorNotice {
                from: from.to_string(),
                text: text.to_string(),
            };
        }
    }
    if let Some(from) = line.strip_prefix("BYE FROM ") {
        return Event::Leave {
            from: from.to_string(),
        };
    }
    Event::Malformed {
        raw: line.to_string(),
    }
}

/// Pull the next complete line out of `buf`.
///
/// Lines end at `\n`; an optional preceding `\r` is dropped. Bytes that do
/// not yet form a complete line stay in the buffer for the next read.
pub fn take_line(buf: &mut BytesMut) -> Option<String> {
    let pos = buf.iter().position(|&b| b == b'\n')?;
    let mut line = buf.split_to(pos);
    buf.advance(1);
    if line.last() == Some(&b'\r') {
        line.truncate(line.len() - 1);
    }
    Some(String::from_utf8_lossy(&line).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_every_wire_intent() {
        let auth = Intent::authenticate("alice", "Alice", "pw123").unwrap();
        assert_eq!(encode(&auth).unwrap(), "AUTH alice AS Alice USING pw123\r\n");

        let join = Intent::join("general", "Alice").unwrap();
        assert_eq!(encode(&join).unwrap(), "JOIN general AS Alice\r\n");

        let msg = Intent::message("bob", "hi").unwrap();
        assert_eq!(encode(&msg).unwrap(), "MSG FROM bob IS hi\r\n");

        let err = Intent::error_notice("bob", "something broke").unwrap();
        assert_eq!(encode(&err).unwrap(), "ERR FROM bob IS something broke\r\n");

        let bye = Intent::leave("bob").unwrap();
        assert_eq!(encode(&bye).unwrap(), "BYE FROM bob\r\n");
    }

    #[test]
    fn local_intents_have_no_line_form() {
        let rename = Intent::rename("bob").unwrap();
        assert!(matches!(
            encode(&rename),
            Err(WireError::LocalIntent("RENAME"))
        ));
        assert!(matches!(encode(&Intent::Help), Err(WireError::LocalIntent("HELP"))));
    }

    #[test]
    fn decodes_replies() {
        assert_eq!(
            decode("REPLY OK IS Auth success.\r\n"),
            Event::ReplyPositive {
                text: "Auth success.".into()
            }
        );
        assert_eq!(
            decode("REPLY NOK IS bad password"),
            Event::ReplyNegative {
                text: "bad password".into()
            }
        );
    }

    #[test]
    fn decodes_messages_and_errors() {
        assert_eq!(
            decode("MSG FROM bob IS hi there\r\n"),
            Event::Message {
                from: "bob".into(),
                text: "hi there".into()
            }
        );
        assert_eq!(
            decode("ERR FROM server IS overloaded"),
            Event::ErrorNotice {
                from: "server".into(),
                text: "overloaded".into()
            }
        );
        assert_eq!(
            decode("BYE FROM bob"),
            Event::Leave { from: "bob".into() }
        );
    }

    #[test]
    fn splits_content_on_first_is_separator() {
        assert_eq!(
            decode("MSG FROM bob IS this IS nested"),
            Event::Message {
                from: "bob".into(),
                text: "this IS nested".into()
            }
        );
    }

    #[test]
    fn unmatched_input_is_malformed() {
        for raw in ["", "HELLO", "REPLY MAYBE IS x", "MSG FROM bob", "BYE"] {
            assert!(
                matches!(decode(raw), Event::Malformed { .. }),
                "expected malformed for {raw:?}"
            );
        }
    }

    #[test]
    fn malformed_preserves_trimmed_text() {
        assert_eq!(
            decode("NOT A MESSAGE\r\n"),
            Event::Malformed {
                raw: "NOT A MESSAGE".into()
            }
        );
    }

    #[test]
    fn take_line_waits_for_complete_lines() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(b"MSG FROM bob I");
        assert_eq!(take_line(&mut buf), None);

        buf.extend_from_slice(b"S hi\r\nREPLY");
        assert_eq!(take_line(&mut buf), Some("MSG FROM bob IS hi".to_string()));
        assert_eq!(take_line(&mut buf), None);
        assert_eq!(&buf[..], b"REPLY");
    }

    #[test]
    fn take_line_handles_multiple_lines_per_read() {
        let mut buf = BytesMut::from(&b"one\r\ntwo\r\nthree\n"[..]);
        assert_eq!(take_line(&mut buf), Some("one".to_string()));
        assert_eq!(take_line(&mut buf), Some("two".to_string()));
        assert_eq!(take_line(&mut buf), Some("three".to_string()));
        assert_eq!(take_line(&mut buf), None);
        assert!(buf.is_empty());
    }
}
