//! # velbus-rs - A Rust Crate for Velbus Home-Automation Bus Communication
//!
//! The velbus-rs crate drives a Velbus bus through a serial USB interface or a
//! TCP bridge. Velbus modules (dimmers, relays, blind controllers, push
//! buttons) share one bus and exchange short checksummed frames; this crate
//! encodes commands onto that bus and turns the status frames modules send
//! back into sensor events for the host application.
//!
//! ## Features
//!
//! - Encode and decode Velbus frames, resynchronizing on corrupt input
//! - Connect over a serial port or a TCP socket
//! - Map host-level device, command and sensor ids to bus addresses and channels
//! - Set dimmer levels and drive shutters, safely from many tasks at once
//! - Report sensor changes and connection loss through a single callback
//! - Scan the bus for modules
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use velbus_rs::{BusEvent, BusManager, ConnectionDescriptor, DeviceDescriptor};
//!
//! # async fn run() -> velbus_rs::Result<()> {
//! let devices = vec![DeviceDescriptor::new(5, 0x02, 1)
//!     .with_command(10)
//!     .with_sensor(99, "DT_Scaling")];
//! let manager = BusManager::new(&devices, Arc::new(|event: BusEvent| println!("{event:?}")));
//!
//! manager.open(&ConnectionDescriptor::socket("192.168.1.101:3788")).await?;
//! manager.set_level(5, 10, 40).await?;
//! manager.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod bus_manager;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod registry;
pub mod util;
pub mod velbus;

pub use crate::error::{Result, VelbusError};
pub use crate::logging::{init_logger, log_info};

// Manager and configuration
pub use bus_manager::{BusManager, ConnectionState};
pub use config::{BusConfig, ManagerOptions, ScanScope};
pub use registry::{
    CommandDescriptor, CommandId, DeviceDescriptor, DeviceId, DeviceParameters, DeviceRegistry,
    SensorDescriptor, SensorId,
};

// Protocol types
pub use velbus::{
    BusEvent, ConnectionDescriptor, ConnectionKind, DataType, EventCallback, ShutterDirection,
    VelbusFrame,
};

/// Builds a manager from a configuration file's contents and opens its
/// connection.
///
/// # Arguments
/// * `config` - Connection, devices and options
/// * `callback` - Receives sensor events and connection loss
///
/// # Returns
/// * `Ok(BusManager)` - Manager with the bus open and the listener running
/// * `Err(VelbusError)` - The connection could not be opened
pub async fn connect(config: &BusConfig, callback: EventCallback) -> Result<BusManager> {
    let manager = BusManager::with_options(&config.devices, config.options.clone(), callback);
    manager.open(&config.connection).await?;
    Ok(manager)
}

/// Decodes one frame from the start of `bytes`.
///
/// # Returns
/// * `Ok(VelbusFrame)` - A complete, verified frame
/// * `Err(VelbusError::Protocol)` - Incomplete or corrupt input
pub fn decode_frame(bytes: &[u8]) -> Result<VelbusFrame> {
    match velbus::frame::decode(bytes) {
        velbus::Decoded::Frame { frame, .. } => Ok(frame),
        velbus::Decoded::NeedMoreBytes => {
            Err(VelbusError::Protocol("incomplete frame".to_string()))
        }
        velbus::Decoded::Invalid { reason, .. } => Err(VelbusError::Protocol(reason.to_string())),
    }
}
