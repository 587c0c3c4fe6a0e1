use std::net::SocketAddr;

use tokio::net::lookup_host;
use tracing::debug;

/// Resolve the server argument to one socket address.
///
/// The first IPv4 result is preferred; failing that, the first result of
/// any family is used.
pub async fn server_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let addrs: Vec<SocketAddr> = lookup_host((host, port))
        .await
        .map_err(|err| format!("could not resolve {host}: {err}"))?
        .collect();
    let addr = addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| format!("no usable address for {host}"))?;
    debug!(%host, %addr, "server resolved");
    Ok(addr)
}
