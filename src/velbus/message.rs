//! # Velbus Messages
//!
//! Builders for the outgoing commands this crate issues, and the table that
//! turns incoming status messages into channel readings.
//!
//! Supporting another status message means adding a row to [`interpret`]:
//! the command code, the candidate data types in lookup order, and how the
//! value is extracted from the payload.

use crate::constants::{
    BLIND_STATUS_DOWN, BLIND_STATUS_OFF, BLIND_STATUS_UP, COMMAND_BLIND_DOWN, COMMAND_BLIND_STATUS,
    COMMAND_BLIND_UP, COMMAND_DIMMERCONTROLLER_STATUS, COMMAND_DIMMER_STATUS,
    COMMAND_MODULE_TYPE, COMMAND_PUSH_BUTTON_STATUS, COMMAND_RELAY_STATUS, COMMAND_SET_DIMVALUE,
    VELBUS_CHANNEL_MAX, VELBUS_CHANNEL_MIN,
};
use crate::error::VelbusError;
use crate::velbus::frame::{encode, encode_rtr, VelbusFrame};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Semantic kind of a value exchanged with a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataType {
    /// Dimmer level, 0-100.
    Scaling,
    /// On/off, 0 or 1.
    Switch,
    /// Shutter direction, 0 = up, 1 = down.
    UpDown,
}

/// Lookup order for a dimmer level.
pub const LEVEL_DATA_TYPES: &[DataType] = &[DataType::Scaling, DataType::Switch];
pub const SWITCH_DATA_TYPES: &[DataType] = &[DataType::Switch];
pub const UP_DOWN_DATA_TYPES: &[DataType] = &[DataType::UpDown];

pub const SHUTTER_UP_VALUE: u8 = 0;
pub const SHUTTER_DOWN_VALUE: u8 = 1;

impl DataType {
    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Scaling => "DT_Scaling",
            DataType::Switch => "DT_Switch",
            DataType::UpDown => "DT_UpDown",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = VelbusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let name = lower.strip_prefix("dt_").unwrap_or(&lower);
        match name {
            "scaling" => Ok(DataType::Scaling),
            "switch" => Ok(DataType::Switch),
            "updown" | "up-down" | "up_down" => Ok(DataType::UpDown),
            _ => Err(VelbusError::Config(format!("unknown data type '{s}'"))),
        }
    }
}

impl TryFrom<String> for DataType {
    type Error = VelbusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DataType> for String {
    fn from(value: DataType) -> Self {
        value.as_str().to_string()
    }
}

/// Shutter movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutterDirection {
    Up,
    Down,
}

impl ShutterDirection {
    pub fn command(self) -> u8 {
        match self {
            ShutterDirection::Up => COMMAND_BLIND_UP,
            ShutterDirection::Down => COMMAND_BLIND_DOWN,
        }
    }

    /// Value published for the direction on an up/down sensor.
    pub fn sensor_value(self) -> u8 {
        match self {
            ShutterDirection::Up => SHUTTER_UP_VALUE,
            ShutterDirection::Down => SHUTTER_DOWN_VALUE,
        }
    }
}

impl FromStr for ShutterDirection {
    type Err = VelbusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(ShutterDirection::Up),
            "down" => Ok(ShutterDirection::Down),
            _ => Err(VelbusError::Validation(format!(
                "shutter direction must be 'up' or 'down', got '{s}'"
            ))),
        }
    }
}

/// Bit mask for a single channel; channels outside 1..=8 map to an empty mask.
pub fn channel_mask(channel: u8) -> u8 {
    if (VELBUS_CHANNEL_MIN..=VELBUS_CHANNEL_MAX).contains(&channel) {
        1 << (channel - 1)
    } else {
        0
    }
}

/// Channels whose bits are set in `mask`, lowest first.
pub fn channels_in_mask(mask: u8) -> impl Iterator<Item = u8> {
    (0..8u8).filter(move |bit| mask & (1 << bit) != 0).map(|bit| bit + 1)
}

/// `COMMAND_SET_DIMVALUE` with an immediate dim speed.
pub fn set_level_frame(address: u8, channel: u8, level: u8) -> Vec<u8> {
    encode(
        address,
        COMMAND_SET_DIMVALUE,
        &[channel_mask(channel), level, 0x00, 0x00],
    )
}

/// `COMMAND_BLIND_UP` / `COMMAND_BLIND_DOWN` with the module's default timeout.
pub fn shutter_frame(address: u8, channel: u8, direction: ShutterDirection) -> Vec<u8> {
    encode(
        address,
        direction.command(),
        &[channel_mask(channel), 0x00, 0x00, 0x00],
    )
}

/// Module type request.
pub fn scan_frame(address: u8) -> Vec<u8> {
    encode_rtr(address)
}

/// A value reported for one channel of a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelReading {
    pub address: u8,
    pub channel: u8,
    /// Candidate data types, in lookup order.
    pub data_types: &'static [DataType],
    pub value: u8,
}

/// What an incoming frame means to the bus manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusMessage {
    /// Channel status updates.
    Readings(Vec<ChannelReading>),
    /// A module answered a module type request.
    ModuleType { address: u8, module_type: u8 },
    /// Traffic this crate does not interpret.
    Unhandled { address: u8, command: Option<u8> },
}

/// Interprets an incoming, checksum-valid frame.
pub fn interpret(frame: &VelbusFrame) -> BusMessage {
    let address = frame.address;
    let payload = frame.payload.as_slice();
    let unhandled = BusMessage::Unhandled {
        address,
        command: frame.command,
    };

    let Some(command) = frame.command else {
        return unhandled;
    };

    let readings = |mask: u8, data_types: &'static [DataType], value: u8| {
        BusMessage::Readings(
            channels_in_mask(mask)
                .map(|channel| ChannelReading {
                    address,
                    channel,
                    data_types,
                    value,
                })
                .collect(),
        )
    };

    match (command, payload) {
        // single-channel dimmer: mode, level, LED status, delay
        (COMMAND_DIMMER_STATUS, [_, level, ..]) => {
            readings(channel_mask(VELBUS_CHANNEL_MIN), LEVEL_DATA_TYPES, *level)
        }
        // channel mask, disable/inhibit, level
        (COMMAND_DIMMERCONTROLLER_STATUS, [mask, _, level, ..]) => {
            readings(*mask, LEVEL_DATA_TYPES, *level)
        }
        // channel mask, disable/inhibit, relay status
        (COMMAND_RELAY_STATUS, [mask, _, status, ..]) => {
            readings(*mask, SWITCH_DATA_TYPES, *status & 0x01)
        }
        // channel mask, timeout, blind status
        (COMMAND_BLIND_STATUS, [mask, _, status, ..]) => match *status {
            BLIND_STATUS_UP => readings(*mask, UP_DOWN_DATA_TYPES, SHUTTER_UP_VALUE),
            BLIND_STATUS_DOWN => readings(*mask, UP_DOWN_DATA_TYPES, SHUTTER_DOWN_VALUE),
            BLIND_STATUS_OFF => BusMessage::Readings(Vec::new()),
            _ => unhandled,
        },
        // pressed mask, released mask, long-pressed mask
        (COMMAND_PUSH_BUTTON_STATUS, [pressed, released, ..]) => {
            let mut out: Vec<ChannelReading> = Vec::new();
            for (mask, value) in [(*pressed, 1u8), (*released, 0u8)] {
                out.extend(channels_in_mask(mask).map(|channel| ChannelReading {
                    address,
                    channel,
                    data_types: SWITCH_DATA_TYPES,
                    value,
                }));
            }
            BusMessage::Readings(out)
        }
        (COMMAND_MODULE_TYPE, [module_type, ..]) => BusMessage::ModuleType {
            address,
            module_type: *module_type,
        },
        _ => unhandled,
    }
}
