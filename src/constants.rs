//! Velbus Protocol Constants
//!
//! Framing bytes, priorities, command codes and address ranges used by the
//! Velbus wire protocol.

/// Start of frame
pub const VELBUS_STX: u8 = 0x0F;

/// End of frame
pub const VELBUS_ETX: u8 = 0x04;

// ----------------------------------------------------------------------------
// Priorities
// ----------------------------------------------------------------------------

pub const VELBUS_PRIORITY_HIGH: u8 = 0xF8;
pub const VELBUS_PRIORITY_FIRMWARE: u8 = 0xF9;
pub const VELBUS_PRIORITY_THIRDPARTY: u8 = 0xFA;
pub const VELBUS_PRIORITY_LOW: u8 = 0xFB;

// ----------------------------------------------------------------------------
// RTR / length byte
// ----------------------------------------------------------------------------

/// Remote transmit request flag
pub const VELBUS_RTR: u8 = 0x40;

/// Data length mask
pub const VELBUS_LENGTH_MASK: u8 = 0x0F;

/// Bits that must be zero in the RTR/length byte
pub const VELBUS_LENGTH_RESERVED_MASK: u8 = !(VELBUS_RTR | VELBUS_LENGTH_MASK);

/// Maximum number of data bytes (command byte included)
pub const VELBUS_MAX_DATA_LEN: usize = 8;

/// Maximum payload after the command byte
pub const VELBUS_MAX_PAYLOAD_LEN: usize = VELBUS_MAX_DATA_LEN - 1;

/// STX, priority, address, RTR/length
pub const VELBUS_HEADER_LEN: usize = 4;

/// Checksum, ETX
pub const VELBUS_TRAILER_LEN: usize = 2;

pub const VELBUS_MIN_FRAME_LEN: usize = VELBUS_HEADER_LEN + VELBUS_TRAILER_LEN;
pub const VELBUS_MAX_FRAME_LEN: usize = VELBUS_MIN_FRAME_LEN + VELBUS_MAX_DATA_LEN;

// ----------------------------------------------------------------------------
// Addresses and channels
// ----------------------------------------------------------------------------

pub const VELBUS_ADDRESS_MIN: u8 = 0x01;
pub const VELBUS_ADDRESS_MAX: u8 = 0xFE;

pub const VELBUS_CHANNEL_MIN: u8 = 1;
pub const VELBUS_CHANNEL_MAX: u8 = 8;

// ----------------------------------------------------------------------------
// Command codes (first data byte)
// ----------------------------------------------------------------------------

// Outgoing
pub const COMMAND_BLIND_UP: u8 = 0x05;
pub const COMMAND_BLIND_DOWN: u8 = 0x06;
pub const COMMAND_SET_DIMVALUE: u8 = 0x07;

// Incoming
pub const COMMAND_PUSH_BUTTON_STATUS: u8 = 0x00;
pub const COMMAND_DIMMERCONTROLLER_STATUS: u8 = 0xB8;
pub const COMMAND_BLIND_STATUS: u8 = 0xEC;
pub const COMMAND_DIMMER_STATUS: u8 = 0xEE;
pub const COMMAND_RELAY_STATUS: u8 = 0xFB;
pub const COMMAND_MODULE_TYPE: u8 = 0xFF;

// Blind status byte
pub const BLIND_STATUS_OFF: u8 = 0x00;
pub const BLIND_STATUS_UP: u8 = 0x01;
pub const BLIND_STATUS_DOWN: u8 = 0x02;

/// Highest dimmer level, in percent
pub const VELBUS_LEVEL_MAX: i32 = 100;

// ----------------------------------------------------------------------------
// Serial line
// ----------------------------------------------------------------------------

pub const VELBUS_SERIAL_BAUDRATE: u32 = 38400;
