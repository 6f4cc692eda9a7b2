//! TCP transport: line JSON-RPC over a plain TCP stream.

use super::line::LineChannel;
use conductor_application::TransportError;
use tokio::net::TcpStream;
use tracing::debug;

/// Connect to `address` (`host:port`).
pub async fn connect(server_name: &str, address: &str) -> Result<LineChannel, TransportError> {
    debug!(server = %server_name, address, "Connecting over TCP");
    let stream = TcpStream::connect(address)
        .await
        .map_err(|e| TransportError::Io(format!("{address}: {e}")))?;
    stream
        .set_nodelay(true)
        .map_err(|e| TransportError::Io(e.to_string()))?;
    let (read_half, write_half) = stream.into_split();
    Ok(LineChannel::new(server_name, read_half, write_half, None))
}
