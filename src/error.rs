//! # Velbus Error Handling
//!
//! This module defines the VelbusError enum, which represents the different error
//! types that can occur in the velbus-rs crate.

use crate::registry::{CommandId, DeviceId};
use thiserror::Error;

/// Represents the different error types that can occur in the Velbus crate.
#[derive(Debug, Error)]
pub enum VelbusError {
    /// The connection descriptor or configuration has the wrong shape.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Opening or writing to the serial port / socket failed.
    #[error("Connection error on {target}: {source}")]
    Connection {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// A frame could not be decoded (bad framing byte, length or checksum).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No command is configured for the (device, command) pair.
    #[error("No command {command_id} configured for device {device_id}")]
    NotFound {
        device_id: DeviceId,
        command_id: CommandId,
    },

    /// The bus connection is not open.
    #[error("Bus is not connected")]
    NotConnected,

    /// The bus connection is already open.
    #[error("Bus is already open")]
    AlreadyOpen,

    /// A command argument is out of range.
    #[error("Validation error: {0}")]
    Validation(String),
}

impl VelbusError {
    pub(crate) fn connection(target: impl Into<String>, source: std::io::Error) -> Self {
        VelbusError::Connection {
            target: target.into(),
            source,
        }
    }

    /// True for errors that must stop the manager from starting.
    pub fn is_fatal(&self) -> bool {
        matches!(self, VelbusError::Config(_) | VelbusError::Connection { .. })
    }
}

pub type Result<T> = std::result::Result<T, VelbusError>;
