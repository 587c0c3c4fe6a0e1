//! The line-oriented local input surface.

use ipkchat_session::UserCommand;

/// Split one non-empty input line into a command.
///
/// A leading `/` selects a local command with a fixed argument count;
/// anything else becomes a chat message verbatim. Empty lines and EOF are
/// handled by the caller, which ends the session for both.
pub fn parse(line: &str) -> Result<UserCommand, String> {
    if !line.starts_with('/') {
        return Ok(UserCommand::Message {
            content: line.to_string(),
        });
    }

    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or("/").to_ascii_lowercase();
    let args: Vec<&str> = parts.collect();
    match command.as_str() {
        "/auth" => match args.as_slice() {
            [username, secret, display_name] => Ok(UserCommand::Authenticate {
                username: username.to_string(),
                secret: secret.to_string(),
                display_name: display_name.to_string(),
            }),
            _ => Err("Invalid syntax. Usage: /auth <username> <secret> <displayname>".into()),
        },
        "/join" => match args.as_slice() {
            [channel] => Ok(UserCommand::Join {
                channel: channel.to_string(),
            }),
            _ => Err("Invalid syntax. Usage: /join <channel>".into()),
        },
        "/rename" => match args.as_slice() {
            [display_name] => Ok(UserCommand::Rename {
                display_name: display_name.to_string(),
            }),
            _ => Err("Invalid syntax. Usage: /rename <displayname>".into()),
        },
        "/bye" => match args.as_slice() {
            [] => Ok(UserCommand::Leave),
            _ => Err("Invalid syntax. Usage: /bye".into()),
        },
        "/help" => match args.as_slice() {
            [] => Ok(UserCommand::Help),
            _ => Err("Invalid syntax. Usage: /help".into()),
        },
        other => Err(format!("Unknown command: {other}. Try /help")),
    }
}
