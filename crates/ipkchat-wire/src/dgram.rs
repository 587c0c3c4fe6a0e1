//! Tagged binary codec for the datagram transport.
//!
//! Frame layout: a 1-byte type tag, a 2-byte big-endian sequence id, then
//! type-specific fields as NUL-terminated ASCII strings in a fixed order.
//! `CONFIRM` is the exception: the two bytes after its tag reference the
//! confirmed send and nothing follows.

use crate::error::{Result, WireError};
use crate::event::Event;
use crate::intent::Intent;

/// Frame type tags.
pub mod tag {
    pub const CONFIRM: u8 = 0x00;
    pub const REPLY: u8 = 0x01;
    pub const AUTH: u8 = 0x02;
    pub const JOIN: u8 = 0x03;
    pub const MSG: u8 = 0x04;
    pub const PING: u8 = 0xFD;
    pub const ERR: u8 = 0xFE;
    pub const BYE: u8 = 0xFF;
}

/// Tag byte plus big-endian sequence id.
pub const HEADER_SIZE: usize = 3;

/// One decoded inbound datagram.
///
/// `seq` is the frame's own sequence id when a complete header was read;
/// it is `None` for `CONFIRM` frames (whose id bytes reference one of our
/// sends) and for frames too short to carry a header. The transport can
/// confirm exactly the frames whose `seq` is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub seq: Option<u16>,
    pub event: Event,
}

/// Encode an intent into one datagram carrying the given sequence id.
pub fn encode(intent: &Intent, seq: u16) -> Result<Vec<u8>> {
    let (tag, fields): (u8, Vec<&str>) = match intent {
        Intent::Authenticate {
            username,
            display_name,
            secret,
        } => (tag::AUTH, vec![username, display_name, secret]),
        Intent::Join {
            channel,
            display_name,
        } => (tag::JOIN, vec![channel, display_name]),
        Intent::Message {
            display_name,
            content,
        } => (tag::MSG, vec![display_name, content]),
        Intent::ErrorNotice {
            display_name,
            content,
        } => (tag::ERR, vec![display_name, content]),
        Intent::Leave { display_name } => (tag::BYE, vec![display_name]),
        Intent::Rename { .. } | Intent::Help => {
            return Err(WireError::LocalIntent(intent.kind()))
        }
    };

    let body_len: usize = fields.iter().map(|f| f.len() + 1).sum();
    let mut frame = Vec::with_capacity(HEADER_SIZE + body_len);
    frame.push(tag);
    frame.extend_from_slice(&seq.to_be_bytes());
    for field in fields {
        frame.extend_from_slice(field.as_bytes());
        frame.push(0);
    }
    Ok(frame)
}

/// Encode a confirm frame referencing a received sequence id.
pub fn encode_confirm(ref_id: u16) -> [u8; 3] {
    let id = ref_id.to_be_bytes();
    [tag::CONFIRM, id[0], id[1]]
}

/// Decode one received datagram.
///
/// Never fails: anything outside the inbound grammar becomes
/// [`Event::Malformed`], keeping the sequence id whenever the header was
/// readable so the transport can still confirm the frame.
pub fn decode(buf: &[u8]) -> Inbound {
    if buf.len() < HEADER_SIZE {
        return Inbound {
            seq: None,
            event: malformed(buf),
        };
    }
    let id = u16::from_be_bytes([buf[1], buf[2]]);
    let body = &buf[HEADER_SIZE..];
    match buf[0] {
        tag::CONFIRM => {
            if body.is_empty() {
                Inbound {
                    seq: None,
                    event: Event::Ack { ref_id: id },
                }
            } else {
                Inbound {
                    seq: None,
                    event: malformed(buf),
                }
            }
        }
        tag::REPLY => Inbound {
            seq: Some(id),
            event: decode_reply(body).unwrap_or_else(|| malformed(buf)),
        },
        tag::PING => Inbound {
            seq: Some(id),
            event: if body.is_empty() {
                Event::KeepAlive
            } else {
                malformed(buf)
            },
        },
        tag::MSG => Inbound {
            seq: Some(id),
            event: match fields::<2>(body) {
                Some([from, text]) => Event::Message { from, text },
                None => malformed(buf),
            },
        },
        tag::ERR => Inbound {
            seq: Some(id),
            event: match fields::<2>(body) {
                Some([from, text]) => Event::ErrorNotice { from, text },
                None => malformed(buf),
            },
        },
        tag::BYE => Inbound {
            seq: Some(id),
            event: match fields::<1>(body) {
                Some([from]) => Event::Leave { from },
                None => malformed(buf),
            },
        },
        _ => Inbound {
            seq: Some(id),
            event: malformed(buf),
        },
    }
}

fn decode_reply(body: &[u8]) -> Option<Event> {
    // success flag, then two bytes referencing the request id. With a
    // single send outstanding the reference is implicit, so it is not
    // surfaced in the event.
    if body.len() < 3 {
        return None;
    }
    let [text] = fields::<1>(&body[3..])?;
    match body[0] {
        1 => Some(Event::ReplyPositive { text }),
        0 => Some(Event::ReplyNegative { text }),
        _ => None,
    }
}

/// Split `body` into exactly `N` NUL-terminated UTF-8 fields with nothing
/// left over.
fn fields<const N: usize>(body: &[u8]) -> Option<[String; N]> {
    let mut out: [String; N] = std::array::from_fn(|_| String::new());
    let mut rest = body;
    for slot in &mut out {
        let nul = rest.iter().position(|&b| b == 0)?;
        *slot = std::str::from_utf8(&rest[..nul]).ok()?.to_string();
        rest = &rest[nul + 1..];
    }
    rest.is_empty().then_some(out)
}

fn malformed(buf: &[u8]) -> Event {
    Event::Malformed {
        raw: String::from_utf8_lossy(buf).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(head: [u8; 3], body: &[u8]) -> Vec<u8> {
        let mut buf = head.to_vec();
        buf.extend_from_slice(body);
        buf
    }

    #[test]
    fn encodes_auth_frame_layout() {
        let auth = Intent::authenticate("alice", "Alice", "pw").unwrap();
        assert_eq!(
            encode(&auth, 0x0102).unwrap(),
            frame([tag::AUTH, 0x01, 0x02], b"alice\0Alice\0pw\0")
        );
    }

    #[test]
    fn encodes_remaining_wire_intents() {
        let join = Intent::join("general", "Alice").unwrap();
        assert_eq!(
            encode(&join, 1).unwrap(),
            frame([tag::JOIN, 0, 1], b"general\0Alice\0")
        );

        let msg = Intent::message("bob", "hi").unwrap();
        assert_eq!(encode(&msg, 2).unwrap(), frame([tag::MSG, 0, 2], b"bob\0hi\0"));

        let err = Intent::error_notice("bob", "broken").unwrap();
        assert_eq!(
            encode(&err, 3).unwrap(),
            frame([tag::ERR, 0, 3], b"bob\0broken\0")
        );

        let bye = Intent::leave("bob").unwrap();
        assert_eq!(encode(&bye, 4).unwrap(), frame([tag::BYE, 0, 4], b"bob\0"));
    }

    #[test]
    fn local_intents_have_no_frame_form() {
        assert!(matches!(
            encode(&Intent::Help, 0),
            Err(WireError::LocalIntent("HELP"))
        ));
    }

    #[test]
    fn confirm_frame_is_three_bytes() {
        assert_eq!(encode_confirm(0xABCD), [tag::CONFIRM, 0xAB, 0xCD]);
    }

    #[test]
    fn decodes_message_frame() {
        let frame = [0x04, 0x00, 0x07, b'b', b'o', b'b', 0x00, b'h', b'i', 0x00];
        assert_eq!(
            decode(&frame),
            Inbound {
                seq: Some(7),
                event: Event::Message {
                    from: "bob".into(),
                    text: "hi".into()
                },
            }
        );
    }

    #[test]
    fn decodes_confirm_without_own_sequence_id() {
        let inbound = decode(&[tag::CONFIRM, 0x00, 0x2A]);
        assert_eq!(
            inbound,
            Inbound {
                seq: None,
                event: Event::Ack { ref_id: 42 },
            }
        );
    }

    #[test]
    fn decodes_replies_by_success_flag() {
        let ok = frame([tag::REPLY, 0, 5], b"\x01\0\0welcome\0");
        assert_eq!(
            decode(&ok),
            Inbound {
                seq: Some(5),
                event: Event::ReplyPositive {
                    text: "welcome".into()
                },
            }
        );

        let nok = frame([tag::REPLY, 0, 6], b"\x00\0\0denied\0");
        assert_eq!(
            decode(&nok),
            Inbound {
                seq: Some(6),
                event: Event::ReplyNegative {
                    text: "denied".into()
                },
            }
        );
    }

    #[test]
    fn decodes_ping_err_and_bye() {
        assert_eq!(
            decode(&[tag::PING, 0, 9]),
            Inbound {
                seq: Some(9),
                event: Event::KeepAlive,
            }
        );

        let err = frame([tag::ERR, 0, 10], b"server\0oops\0");
        assert_eq!(
            decode(&err),
            Inbound {
                seq: Some(10),
                event: Event::ErrorNotice {
                    from: "server".into(),
                    text: "oops".into()
                },
            }
        );

        let bye = frame([tag::BYE, 0, 11], b"server\0");
        assert_eq!(
            decode(&bye),
            Inbound {
                seq: Some(11),
                event: Event::Leave {
                    from: "server".into()
                },
            }
        );
    }

    #[test]
    fn short_reply_is_malformed() {
        // Five bytes cannot hold the reply header.
        let inbound = decode(&[tag::REPLY, 0, 1, 1, 0]);
        assert_eq!(inbound.seq, Some(1));
        assert!(matches!(inbound.event, Event::Malformed { .. }));
    }

    #[test]
    fn reply_with_unknown_flag_is_malformed() {
        let raw = frame([tag::REPLY, 0, 1], b"\x02\0\0text\0");
        assert!(matches!(decode(&raw).event, Event::Malformed { .. }));
    }

    #[test]
    fn truncated_header_is_malformed_without_sequence_id() {
        for frame in [&[][..], &[tag::MSG][..], &[tag::MSG, 0][..]] {
            let inbound = decode(frame);
            assert_eq!(inbound.seq, None);
            assert!(matches!(inbound.event, Event::Malformed { .. }));
        }
    }

    #[test]
    fn unterminated_field_is_malformed() {
        let raw = frame([tag::MSG, 0, 1], b"bob\0hi");
        let inbound = decode(&raw);
        assert_eq!(inbound.seq, Some(1));
        assert!(matches!(inbound.event, Event::Malformed { .. }));
    }

    #[test]
    fn trailing_bytes_after_last_field_are_malformed() {
        let raw = frame([tag::BYE, 0, 1], b"bob\0junk");
        assert!(matches!(decode(&raw).event, Event::Malformed { .. }));
    }

    #[test]
    fn unknown_tag_keeps_confirmable_sequence_id() {
        let inbound = decode(&[0x42, 0x00, 0x03, 0x00]);
        assert_eq!(inbound.seq, Some(3));
        assert!(matches!(inbound.event, Event::Malformed { .. }));
    }

    #[test]
    fn non_utf8_field_is_malformed() {
        let raw = frame([tag::BYE, 0, 1], &[0xFF, 0xFE, 0x00]);
        assert!(matches!(decode(&raw).event, Event::Malformed { .. }));
    }

    #[test]
    fn oversized_confirm_is_malformed() {
        let inbound = decode(&[tag::CONFIRM, 0, 1, 0]);
        assert_eq!(inbound.seq, None);
        assert!(matches!(inbound.event, Event::Malformed { .. }));
    }
}
