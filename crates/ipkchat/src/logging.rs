use tracing::level_filters::LevelFilter;

/// Route tracing output to stderr; stdout belongs to the conversation.
///
/// `--debug` opens up the protocol-level events (sends, receives,
/// retransmissions, state transitions); without it only warnings show.
pub fn init(debug: bool) {
    let level = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_ansi(false)
        .with_target(false)
        .try_init();
}
