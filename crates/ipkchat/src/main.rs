mod app;
mod input;
mod logging;
mod output;
mod resolve;

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use ipkchat_transport::{TcpTransport, UdpConfig, UdpTransport};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum TransportKind {
    /// CRLF lines over one TCP connection.
    #[value(alias = "tcp")]
    Stream,
    /// Binary frames over UDP with confirm/retransmit.
    #[value(alias = "udp")]
    Datagram,
}

#[derive(Parser, Debug)]
#[command(name = "ipkchat", version, about = "IPK-chat client")]
struct Cli {
    /// Transport protocol.
    #[arg(short = 't', long = "transport", value_name = "PROTOCOL")]
    transport: TransportKind,

    /// Server hostname or address.
    #[arg(short = 's', long = "server", value_name = "HOST")]
    server: String,

    /// Server port.
    #[arg(
        short = 'p',
        long = "port",
        value_name = "PORT",
        default_value_t = 4567,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    port: u16,

    /// Confirm timeout in milliseconds (datagram transport).
    #[arg(short = 'd', long = "timeout", value_name = "MS", default_value_t = 250)]
    timeout: u64,

    /// Retransmissions after the initial send (datagram transport).
    #[arg(short = 'r', long = "retries", value_name = "COUNT", default_value_t = 3)]
    retries: u32,

    /// Protocol debug logging on stderr.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.debug);

    let code = match run(cli).await {
        Ok(code) => code,
        Err(message) => {
            println!("ERROR: {message}");
            1
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32, String> {
    let addr = resolve::server_addr(&cli.server, cli.port).await?;
    match cli.transport {
        TransportKind::Stream => app::run(Arc::new(TcpTransport::new(addr))).await,
        TransportKind::Datagram => {
            let config = UdpConfig {
                ack_timeout: Duration::from_millis(cli.timeout),
                retries: cli.retries,
            };
            app::run(Arc::new(UdpTransport::with_config(addr, config))).await
        }
    }
}
