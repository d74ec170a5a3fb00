//! # Configuration
//!
//! Serde model for everything the host hands to the bus manager: the
//! connection descriptor, the device list and the manager options. The
//! `velbus-cli` binary reads it from a JSON file:
//!
//! ```json
//! {
//!   "connection": { "type": "socket", "address": "192.168.1.101:3788" },
//!   "devices": [
//!     {
//!       "id": 5,
//!       "parameters": { "address": 2, "channel": 1 },
//!       "commands": [{ "id": 10 }],
//!       "sensors": [{ "id": 99, "data_type": "DT_Scaling" }]
//!     }
//!   ],
//!   "options": { "scan_on_open": true }
//! }
//! ```

use crate::error::{Result, VelbusError};
use crate::registry::DeviceDescriptor;
use crate::velbus::serial::SerialConfig;
use crate::velbus::transport::ConnectionDescriptor;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which addresses a scan sends a module type request to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanScope {
    /// Addresses of configured devices only.
    #[default]
    Configured,
    /// Every module address, 0x01 through 0xFE.
    Full,
}

/// Tunables for the bus manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerOptions {
    pub serial: SerialConfig,
    pub scan_scope: ScanScope,
    /// Scan the bus right after the connection opens.
    pub scan_on_open: bool,
    /// Publish the commanded value as a sensor event once a command is written.
    pub optimistic_echo: bool,
}

/// Complete configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    pub connection: ConnectionDescriptor,
    #[serde(default)]
    pub devices: Vec<DeviceDescriptor>,
    #[serde(default)]
    pub options: ManagerOptions,
}

impl BusConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| VelbusError::Config(e.to_string()))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| VelbusError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }
}
