//! Rendering of session notices on stdout.

use ipkchat_session::Notice;

const HELP: &str = "Commands:
  /auth <username> <secret> <displayname>  Authenticate and set the display name
  /join <channel>                          Join a channel
  /rename <displayname>                    Locally change the display name
  /bye                                     Disconnect from the server
  /help                                    Show this message
  <message>                                Send the line as a chat message";

pub fn render(notice: &Notice) -> String {
    match notice {
        Notice::ActionSuccess { text } => format!("Action Success: {text}"),
        Notice::ActionFailure { text } => format!("Action Failure: {text}"),
        Notice::Chat { from, text } => format!("{from}: {text}"),
        Notice::PeerError { from, text } => format!("ERROR FROM {from}: {text}"),
        Notice::PeerLeft { from } => format!("BYE FROM {from}"),
        Notice::LocalError { text } => format!("ERROR: {text}"),
        Notice::Help => HELP.to_string(),
    }
}

pub fn print_notices(notices: &[Notice]) {
    for notice in notices {
        println!("{}", render(notice));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_exact_output_formats() {
        assert_eq!(
            render(&Notice::ActionSuccess {
                text: "welcome".into()
            }),
            "Action Success: welcome"
        );
        assert_eq!(
            render(&Notice::ActionFailure {
                text: "denied".into()
            }),
            "Action Failure: denied"
        );
        assert_eq!(
            render(&Notice::Chat {
                from: "bob".into(),
                text: "hi".into()
            }),
            "bob: hi"
        );
        assert_eq!(
            render(&Notice::PeerError {
                from: "server".into(),
                text: "boom".into()
            }),
            "ERROR FROM server: boom"
        );
        assert_eq!(
            render(&Notice::PeerLeft {
                from: "server".into()
            }),
            "BYE FROM server"
        );
        assert_eq!(
            render(&Notice::LocalError {
                text: "bad input".into()
            }),
            "ERROR: bad input"
        );
    }

    #[test]
    fn help_lists_every_command() {
        let help = render(&Notice::Help);
        for command in ["/auth", "/join", "/rename", "/bye", "/help"] {
            assert!(help.contains(command), "help misses {command}");
        }
    }
}
