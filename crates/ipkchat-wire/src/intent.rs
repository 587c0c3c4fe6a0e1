//! Locally originated protocol intents and their field validation.

use crate::error::{Result, WireError};

/// Maximum length of a username or channel identifier.
pub const MAX_ID_LEN: usize = 20;
/// Maximum length of an authentication secret.
pub const MAX_SECRET_LEN: usize = 128;
/// Maximum length of a display name.
pub const MAX_DISPLAY_NAME_LEN: usize = 20;
/// Maximum length of a chat message body.
pub const MAX_CONTENT_LEN: usize = 60_000;

/// A request to perform a protocol action, validated on construction.
///
/// `Rename` and `Help` never reach the wire; every other variant encodes
/// to one line on the stream transport or one datagram on the datagram
/// transport. Build values through the constructors so the field limits
/// hold everywhere downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Authenticate {
        username: String,
        display_name: String,
        secret: String,
    },
    Join {
        channel: String,
        display_name: String,
    },
    Message {
        display_name: String,
        content: String,
    },
    ErrorNotice {
        display_name: String,
        content: String,
    },
    Leave {
        display_name: String,
    },
    Rename {
        display_name: String,
    },
    Help,
}

impl Intent {
    /// Build an `Authenticate` intent, validating every field.
    pub fn authenticate(
        username: impl Into<String>,
        display_name: impl Into<String>,
        secret: impl Into<String>,
    ) -> Result<Self> {
        let username = username.into();
        let display_name = display_name.into();
        let secret = secret.into();
        validate_token("username", &username, MAX_ID_LEN)?;
        validate_display_name(&display_name)?;
        validate_token("secret", &secret, MAX_SECRET_LEN)?;
        Ok(Self::Authenticate {
            username,
            display_name,
            secret,
        })
    }

    /// Build a `Join` intent.
    pub fn join(channel: impl Into<String>, display_name: impl Into<String>) -> Result<Self> {
        let channel = channel.into();
        let display_name = display_name.into();
        validate_token("channel", &channel, MAX_ID_LEN)?;
        validate_display_name(&display_name)?;
        Ok(Self::Join {
            channel,
            display_name,
        })
    }

    /// Build a chat `Message` intent.
    pub fn message(display_name: impl Into<String>, content: impl Into<String>) -> Result<Self> {
        let display_name = display_name.into();
        let content = content.into();
        validate_display_name(&display_name)?;
        validate_content(&content)?;
        Ok(Self::Message {
            display_name,
            content,
        })
    }

    /// Build an `ErrorNotice` intent sent to the peer on protocol violations.
    pub fn error_notice(
        display_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Self> {
        let display_name = display_name.into();
        let content = content.into();
        validate_display_name(&display_name)?;
        validate_content(&content)?;
        Ok(Self::ErrorNotice {
            display_name,
            content,
        })
    }

    /// Build a `Leave` intent announcing session end.
    pub fn leave(display_name: impl Into<String>) -> Result<Self> {
        let display_name = display_name.into();
        validate_display_name(&display_name)?;
        Ok(Self::Leave { display_name })
    }

    /// Build the local `Rename` intent.
    pub fn rename(display_name: impl Into<String>) -> Result<Self> {
        let display_name = display_name.into();
        validate_display_name(&display_name)?;
        Ok(Self::Rename { display_name })
    }

    /// Wire name of the intent kind, used in logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authenticate { .. } => "AUTH",
            Self::Join { .. } => "JOIN",
            Self::Message { .. } => "MSG",
            Self::ErrorNotice { .. } => "ERR",
            Self::Leave { .. } => "BYE",
            Self::Rename { .. } => "RENAME",
            Self::Help => "HELP",
        }
    }

    /// Whether this intent stays inside the client.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Rename { .. } | Self::Help)
    }
}

fn validate_token(field: &'static str, value: &str, max: usize) -> Result<()> {
    if value.len() > max {
        return Err(WireError::FieldTooLong {
            field,
            len: value.len(),
            max,
        });
    }
    let legal = |b: u8| b.is_ascii_alphanumeric() || b == b'-' || b == b'_';
    if !value.bytes().all(legal) {
        return Err(WireError::IllegalCharacters {
            field,
            allowed: "letters, digits, '-' and '_'",
        });
    }
    Ok(())
}

fn validate_display_name(value: &str) -> Result<()> {
    if value.len() > MAX_DISPLAY_NAME_LEN {
        return Err(WireError::FieldTooLong {
            field: "display name",
            len: value.len(),
            max: MAX_DISPLAY_NAME_LEN,
        });
    }
    if !value.bytes().all(|b| (0x21..=0x7E).contains(&b)) {
        return Err(WireError::IllegalCharacters {
            field: "display name",
            allowed: "printable characters without spaces",
        });
    }
    Ok(())
}

fn validate_content(value: &str) -> Result<()> {
    if value.len() > MAX_CONTENT_LEN {
        return Err(WireError::FieldTooLong {
            field: "message content",
            len: value.len(),
            max: MAX_CONTENT_LEN,
        });
    }
    if !value
        .bytes()
        .all(|b| b == b'\n' || (0x20..=0x7E).contains(&b))
    {
        return Err(WireError::IllegalCharacters {
            field: "message content",
            allowed: "printable characters, spaces and line feeds",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_fields_at_their_limits() {
        let username = "a".repeat(MAX_ID_LEN);
        let secret = "s".repeat(MAX_SECRET_LEN);
        assert!(Intent::authenticate(username, "Display_Name", secret).is_ok());

        let content = "x".repeat(MAX_CONTENT_LEN);
        assert!(Intent::message("bob", content).is_ok());
    }

    #[test]
    fn rejects_overlong_username() {
        let username = "a".repeat(MAX_ID_LEN + 1);
        let err = Intent::authenticate(username, "bob", "pw").unwrap_err();
        assert!(matches!(
            err,
            WireError::FieldTooLong {
                field: "username",
                ..
            }
        ));
    }

    #[test]
    fn rejects_overlong_secret() {
        let secret = "s".repeat(MAX_SECRET_LEN + 1);
        let err = Intent::authenticate("alice", "bob", secret).unwrap_err();
        assert!(matches!(
            err,
            WireError::FieldTooLong { field: "secret", .. }
        ));
    }

    #[test]
    fn rejects_illegal_username_characters() {
        for bad in ["with space", "ěščř", "semi;colon", "new\nline"] {
            let err = Intent::authenticate(bad, "bob", "pw").unwrap_err();
            assert!(matches!(err, WireError::IllegalCharacters { .. }), "{bad}");
        }
    }

    #[test]
    fn channel_follows_token_rules() {
        assert!(Intent::join("general-1_a", "bob").is_ok());
        assert!(Intent::join("general channel", "bob").is_err());
        assert!(Intent::join("c".repeat(MAX_ID_LEN + 1), "bob").is_err());
    }

    #[test]
    fn display_name_must_be_printable_without_spaces() {
        assert!(Intent::rename("Bob!~").is_ok());
        assert!(Intent::rename("Bob Smith").is_err());
        assert!(Intent::rename("b".repeat(MAX_DISPLAY_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn content_allows_spaces_and_line_feeds() {
        assert!(Intent::message("bob", "hello there\nsecond line").is_ok());
        assert!(Intent::message("bob", "tab\tseparated").is_err());
        assert!(Intent::message("bob", "carriage\rreturn").is_err());
    }

    #[test]
    fn empty_fields_pass_validation() {
        // Length and charset are the only constraints the protocol states.
        assert!(Intent::authenticate("", "b", "").is_ok());
        assert!(Intent::message("b", "").is_ok());
    }

    #[test]
    fn kind_names_match_wire_verbs() {
        assert_eq!(Intent::leave("bob").unwrap().kind(), "BYE");
        assert_eq!(Intent::Help.kind(), "HELP");
        assert!(Intent::Help.is_local());
        assert!(Intent::rename("bob").unwrap().is_local());
        assert!(!Intent::leave("bob").unwrap().is_local());
    }
}
