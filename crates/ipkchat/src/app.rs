//! The orchestrator: wires one transport to the session machine, runs
//! the receive loop in the background and bridges local input into the
//! machine. It owns no protocol logic.

use std::sync::Arc;

use ipkchat_session::{SessionMachine, UserCommand};
use ipkchat_transport::Transport;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::input;
use crate::output;

/// Run one chat session to completion and return the process exit code.
pub async fn run<T: Transport>(transport: Arc<T>) -> Result<i32, String> {
    transport.connect().await.map_err(|err| err.to_string())?;

    let machine = SessionMachine::new(Arc::clone(&transport));
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let mut receive_task = Some(tokio::spawn({
        let transport = Arc::clone(&transport);
        let cancel = cancel.clone();
        async move { transport.run_receive_loop(events_tx, cancel).await }
    }));

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    while !machine.is_terminated() {
        tokio::select! {
            _ = machine.terminated() => break,

            _ = transport.shutdown_signal().raised() => {
                let reason = transport
                    .shutdown_signal()
                    .reason()
                    .unwrap_or_else(|| "transport requested shutdown".to_string());
                output::print_notices(&machine.abort(&reason).await);
            }

            _ = tokio::signal::ctrl_c() => {
                debug!("interrupt received");
                output::print_notices(&machine.handle_command(UserCommand::Leave).await);
            }

            event = events.recv() => match event {
                Some(event) => {
                    output::print_notices(&machine.handle_event(event).await);
                }
                None => {
                    // The receive loop is done; its result says why.
                    let reason = match receive_task.take() {
                        Some(task) => match task.await {
                            Ok(Ok(())) => "connection closed by server".to_string(),
                            Ok(Err(err)) => err.to_string(),
                            Err(err) => format!("receive task failed: {err}"),
                        },
                        None => "connection closed by server".to_string(),
                    };
                    output::print_notices(&machine.abort(&reason).await);
                }
            },

            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) if !line.trim().is_empty() => match input::parse(&line) {
                    Ok(command) => {
                        output::print_notices(&machine.handle_command(command).await);
                    }
                    Err(message) => println!("ERROR: {message}"),
                },
                // An empty line, EOF or an unreadable terminal all end
                // the session gracefully.
                Ok(Some(_)) => {
                    output::print_notices(&machine.handle_command(UserCommand::Leave).await);
                }
                Ok(None) | Err(_) => {
                    stdin_open = false;
                    output::print_notices(&machine.handle_command(UserCommand::Leave).await);
                }
            },
        }
    }

    cancel.cancel();
    if let Err(err) = transport.disconnect().await {
        debug!(%err, "disconnect failed");
    }
    if let Some(task) = receive_task {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => debug!(%err, "receive loop ended with an error"),
            Err(err) => warn!(%err, "receive task panicked"),
        }
    }

    let code = match machine.end_cause() {
        Some(cause) if cause.is_clean() => 0,
        _ => 1,
    };
    Ok(code)
}
