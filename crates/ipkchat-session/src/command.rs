/// A parsed local command, the session machine's input surface.
///
/// Produced by the line-oriented input parser in the binary. Field
/// values are still unvalidated here; the machine runs them through the
/// [`Intent`](ipkchat_wire::Intent) constructors, which enforce the
/// protocol's length and character limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Authenticate {
        username: String,
        secret: String,
        display_name: String,
    },
    Join {
        channel: String,
    },
    Message {
        content: String,
    },
    Rename {
        display_name: String,
    },
    Leave,
    Help,
}
