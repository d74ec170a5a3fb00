//! # Device Registry
//!
//! Maps the external identifiers callers use onto physical bus endpoints and
//! back. The registry is built once from the configured device list before the
//! connection opens and is never mutated afterwards, so the listener and any
//! number of command callers share it through an `Arc` without locking.

use crate::constants::{
    VELBUS_ADDRESS_MAX, VELBUS_ADDRESS_MIN, VELBUS_CHANNEL_MAX, VELBUS_CHANNEL_MIN,
};
use crate::error::{Result, VelbusError};
use crate::velbus::message::DataType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

pub type DeviceId = u32;
pub type CommandId = u32;
pub type SensorId = u32;

/// Bus location of a configured device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceParameters {
    #[serde(default)]
    pub address: Option<u8>,
    #[serde(default)]
    pub channel: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDescriptor {
    pub id: CommandId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorDescriptor {
    pub id: SensorId,
    /// Free-form data type tag, coerced to [`DataType`] at build time.
    pub data_type: String,
}

/// One configured device as handed over by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub id: DeviceId,
    #[serde(default)]
    pub parameters: DeviceParameters,
    #[serde(default)]
    pub commands: Vec<CommandDescriptor>,
    #[serde(default)]
    pub sensors: Vec<SensorDescriptor>,
}

impl DeviceDescriptor {
    pub fn new(id: DeviceId, address: u8, channel: u8) -> Self {
        DeviceDescriptor {
            id,
            parameters: DeviceParameters {
                address: Some(address),
                channel: Some(channel),
            },
            commands: Vec::new(),
            sensors: Vec::new(),
        }
    }

    pub fn with_command(mut self, id: CommandId) -> Self {
        self.commands.push(CommandDescriptor { id });
        self
    }

    pub fn with_sensor(mut self, id: SensorId, data_type: impl Into<String>) -> Self {
        self.sensors.push(SensorDescriptor {
            id,
            data_type: data_type.into(),
        });
        self
    }
}

/// Physical bus endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub address: u8,
    pub channel: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SensorKey {
    address: u8,
    channel: u8,
    data_type: DataType,
}

/// Immutable command and sensor indexes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceRegistry {
    commands: HashMap<(DeviceId, CommandId), Endpoint>,
    sensors: HashMap<SensorKey, SensorId>,
    addresses: BTreeSet<u8>,
}

impl DeviceRegistry {
    /// Builds the indexes. Never fails: devices and sensors that cannot be
    /// placed on the bus are skipped with a warning.
    pub fn build(devices: &[DeviceDescriptor]) -> Self {
        let mut registry = DeviceRegistry::default();

        for device in devices {
            let Some(endpoint) = endpoint_of(device) else {
                continue;
            };
            registry.addresses.insert(endpoint.address);

            for command in &device.commands {
                if let Some(previous) = registry
                    .commands
                    .insert((device.id, command.id), endpoint)
                {
                    log::warn!(
                        "Device {} command {} configured twice, replacing {:?} with {:?}",
                        device.id,
                        command.id,
                        previous,
                        endpoint
                    );
                }
            }

            for sensor in &device.sensors {
                let data_type = match sensor.data_type.parse::<DataType>() {
                    Ok(data_type) => data_type,
                    Err(e) => {
                        log::warn!("Skipping sensor {} of device {}: {e}", sensor.id, device.id);
                        continue;
                    }
                };
                let key = SensorKey {
                    address: endpoint.address,
                    channel: endpoint.channel,
                    data_type,
                };
                if let Some(previous) = registry.sensors.insert(key, sensor.id) {
                    log::warn!(
                        "Sensors {previous} and {} both map to address 0x{:02X} channel {} {data_type}, keeping {}",
                        sensor.id,
                        endpoint.address,
                        endpoint.channel,
                        sensor.id
                    );
                }
            }
        }

        log::debug!(
            "Device registry built: {} commands, {} sensors, {} modules",
            registry.commands.len(),
            registry.sensors.len(),
            registry.addresses.len()
        );
        registry
    }

    /// Endpoint for a (device, command) pair.
    pub fn resolve_command(&self, device_id: DeviceId, command_id: CommandId) -> Result<Endpoint> {
        self.commands
            .get(&(device_id, command_id))
            .copied()
            .ok_or(VelbusError::NotFound {
                device_id,
                command_id,
            })
    }

    /// Sensor for an endpoint, trying each candidate data type in order.
    pub fn resolve_sensor(
        &self,
        address: u8,
        channel: u8,
        data_types: &[DataType],
    ) -> Option<(SensorId, DataType)> {
        data_types.iter().find_map(|&data_type| {
            self.sensors
                .get(&SensorKey {
                    address,
                    channel,
                    data_type,
                })
                .map(|sensor| (*sensor, data_type))
        })
    }

    /// Configured module addresses, ascending.
    pub fn addresses(&self) -> impl Iterator<Item = u8> + '_ {
        self.addresses.iter().copied()
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    pub fn sensor_count(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.sensors.is_empty()
    }
}

fn endpoint_of(device: &DeviceDescriptor) -> Option<Endpoint> {
    let (Some(address), Some(channel)) = (device.parameters.address, device.parameters.channel)
    else {
        log::warn!("Device {} has no bus address/channel, not indexed", device.id);
        return None;
    };

    if !(VELBUS_ADDRESS_MIN..=VELBUS_ADDRESS_MAX).contains(&address) {
        log::warn!(
            "Skipping device {}: address 0x{address:02X} is not a module address",
            device.id
        );
        return None;
    }
    if !(VELBUS_CHANNEL_MIN..=VELBUS_CHANNEL_MAX).contains(&channel) {
        log::warn!("Skipping device {}: channel {channel} out of range", device.id);
        return None;
    }

    Some(Endpoint { address, channel })
}
