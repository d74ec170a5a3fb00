//! # Velbus Transport
//!
//! Connection descriptors, their validation, and the byte-stream halves the
//! listener and the command dispatcher work with. The physical channel is
//! either a serial port (see [`crate::velbus::serial`]) or a TCP socket (see
//! [`crate::velbus::tcp`]); once opened both look the same to the rest of the
//! crate.

use crate::error::{Result, VelbusError};
use crate::velbus::serial::{open_serial, SerialConfig};
use crate::velbus::tcp::connect_socket;
use bytes::BytesMut;
use nom::bytes::complete::take_while_m_n;
use nom::character::complete::{char, digit1};
use nom::combinator::{all_consuming, map_res};
use nom::sequence::{preceded, tuple};
use nom::IResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::str::FromStr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

/// Kind of physical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    Serial,
    Socket,
}

impl FromStr for ConnectionKind {
    type Err = VelbusError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "serial" => Ok(ConnectionKind::Serial),
            "socket" => Ok(ConnectionKind::Socket),
            _ => Err(VelbusError::Config(format!(
                "connection type must be 'serial' or 'socket', got '{s}'"
            ))),
        }
    }
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionKind::Serial => f.write_str("serial"),
            ConnectionKind::Socket => f.write_str("socket"),
        }
    }
}

/// Where the bus is: `{"type": "socket", "address": "192.168.1.101:3788"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    #[serde(rename = "type")]
    pub kind: ConnectionKind,
    pub address: String,
}

impl ConnectionDescriptor {
    pub fn serial(path: impl Into<String>) -> Self {
        ConnectionDescriptor {
            kind: ConnectionKind::Serial,
            address: path.into(),
        }
    }

    pub fn socket(address: impl Into<String>) -> Self {
        ConnectionDescriptor {
            kind: ConnectionKind::Socket,
            address: address.into(),
        }
    }
}

/// Anything the bus can be spoken over.
pub trait BusStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> BusStream for T {}

pub type BoxedStream = Box<dyn BusStream>;

/// A validated connection target. The variant is fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    Serial { path: String, config: SerialConfig },
    Socket(SocketAddrV4),
}

impl Transport {
    /// Validates the descriptor without touching the device or network.
    pub fn from_descriptor(
        descriptor: &ConnectionDescriptor,
        serial_config: &SerialConfig,
    ) -> Result<Self> {
        match descriptor.kind {
            ConnectionKind::Serial => {
                validate_serial_path(&descriptor.address)?;
                Ok(Transport::Serial {
                    path: descriptor.address.clone(),
                    config: serial_config.clone(),
                })
            }
            ConnectionKind::Socket => {
                validate_socket_address(&descriptor.address).map(Transport::Socket)
            }
        }
    }

    /// Human readable target used in logs and errors.
    pub fn target(&self) -> String {
        match self {
            Transport::Serial { path, .. } => path.clone(),
            Transport::Socket(addr) => addr.to_string(),
        }
    }

    /// Opens the connection.
    pub async fn open(&self) -> Result<BoxedStream> {
        match self {
            Transport::Serial { path, config } => {
                let port = open_serial(path, config).await?;
                log::info!("Opened serial port {path} at {} baud", config.baudrate);
                Ok(Box::new(port))
            }
            Transport::Socket(addr) => {
                let stream = connect_socket(*addr).await?;
                log::info!("Connected to Velbus TCP server {addr}");
                Ok(Box::new(stream))
            }
        }
    }
}

fn octet(input: &str) -> IResult<&str, u8> {
    map_res(
        take_while_m_n(1, 3, |c: char| c.is_ascii_digit()),
        |digits: &str| digits.parse::<u8>(),
    )(input)
}

fn socket_address(input: &str) -> IResult<&str, SocketAddrV4> {
    let (input, (a, b, c, d)) = tuple((
        octet,
        preceded(char('.'), octet),
        preceded(char('.'), octet),
        preceded(char('.'), octet),
    ))(input)?;
    let (input, port) = preceded(
        char(':'),
        map_res(digit1, |digits: &str| digits.parse::<u16>()),
    )(input)?;
    Ok((input, SocketAddrV4::new(Ipv4Addr::new(a, b, c, d), port)))
}

/// Checks that `address` has the `ddd.ddd.ddd.ddd:port` shape.
pub fn validate_socket_address(address: &str) -> Result<SocketAddrV4> {
    all_consuming(socket_address)(address.trim())
        .map(|(_, addr)| addr)
        .map_err(|_| {
            VelbusError::Config(format!(
                "a socket device is in the form of <ip>:<port>, got '{address}'"
            ))
        })
}

/// Checks that `path` looks like a serial device: an absolute path, a
/// Windows `COMn` name, or a `\\.\` device path.
pub fn validate_serial_path(path: &str) -> Result<()> {
    let is_com_port = path
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("COM"))
        && path.len() > 3
        && path[3..].chars().all(|c| c.is_ascii_digit());

    let plausible = !path.is_empty()
        && !path.chars().any(char::is_whitespace)
        && (path.starts_with('/') || path.starts_with(r"\\.\") || is_com_port);

    if plausible {
        Ok(())
    } else {
        Err(VelbusError::Config(format!(
            "'{path}' is not a serial device path"
        )))
    }
}

/// Splits an open stream into the listener's read half and the shared write
/// half.
pub fn split(stream: BoxedStream, target: impl Into<String>) -> (BusReader, BusWriter) {
    let target = target.into();
    let (read, write) = tokio::io::split(stream);
    (
        BusReader {
            inner: read,
            target: target.clone(),
        },
        BusWriter {
            inner: write,
            target,
            frames_written: 0,
        },
    )
}

/// Read side of the connection. Only the listener holds one.
pub struct BusReader {
    inner: ReadHalf<BoxedStream>,
    target: String,
}

impl BusReader {
    /// Appends whatever is available to `buf`; `Ok(0)` means end of stream.
    pub async fn read(&mut self, buf: &mut BytesMut) -> Result<usize> {
        self.inner
            .read_buf(buf)
            .await
            .map_err(|e| VelbusError::connection(self.target.clone(), e))
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

/// Write side of the connection, shared behind the write lock.
pub struct BusWriter {
    inner: WriteHalf<BoxedStream>,
    target: String,
    frames_written: u64,
}

impl BusWriter {
    /// Writes one complete frame and flushes it.
    pub async fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.inner
            .write_all(frame)
            .await
            .map_err(|e| VelbusError::connection(self.target.clone(), e))?;
        self.inner
            .flush()
            .await
            .map_err(|e| VelbusError::connection(self.target.clone(), e))?;
        self.frames_written += 1;
        Ok(())
    }

    pub async fn close(&mut self) -> Result<()> {
        self.inner
            .shutdown()
            .await
            .map_err(|e| VelbusError::connection(self.target.clone(), e))
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}
