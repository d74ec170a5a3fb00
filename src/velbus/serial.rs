//! # Velbus Serial Communication
//!
//! Opens the serial line to a Velbus USB/RS232 interface (VMBRSUSB, VMB1USB).
//! The interface speaks 38400 baud, 8 data bits, no parity, one stop bit.

use crate::constants::VELBUS_SERIAL_BAUDRATE;
use crate::error::{Result, VelbusError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_serial::{SerialPortBuilderExt, SerialStream};

/// Configuration for serial connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub baudrate: u32,
    pub hardware_flow_control: bool,
    pub timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            baudrate: VELBUS_SERIAL_BAUDRATE,
            hardware_flow_control: false,
            timeout_ms: 5000,
        }
    }
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Opens the serial port with the Velbus line settings.
pub async fn open_serial(path: &str, config: &SerialConfig) -> Result<SerialStream> {
    let flow_control = if config.hardware_flow_control {
        tokio_serial::FlowControl::Hardware
    } else {
        tokio_serial::FlowControl::None
    };

    tokio_serial::new(path, config.baudrate)
        .data_bits(tokio_serial::DataBits::Eight)
        .stop_bits(tokio_serial::StopBits::One)
        .parity(tokio_serial::Parity::None)
        .flow_control(flow_control)
        .timeout(config.timeout())
        .open_native_async()
        .map_err(|e| VelbusError::connection(path, std::io::Error::from(e)))
}
