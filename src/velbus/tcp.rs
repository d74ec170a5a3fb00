use crate::error::{Result, VelbusError};
use std::io;
use std::net::SocketAddrV4;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connects to a Velbus TCP server (velserv, a VMBSIG signum or similar bridge).
pub async fn connect_socket(addr: SocketAddrV4) -> Result<TcpStream> {
    let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| {
            VelbusError::connection(
                addr.to_string(),
                io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
            )
        })?
        .map_err(|e| VelbusError::connection(addr.to_string(), e))?;

    // Each frame must go out on its own segment.
    stream
        .set_nodelay(true)
        .map_err(|e| VelbusError::connection(addr.to_string(), e))?;
    Ok(stream)
}
