//! # Velbus Frame Codec
//!
//! This module encodes and decodes Velbus protocol frames. It leverages the `nom`
//! crate's streaming parsers so that a frame split across several reads is
//! reported as incomplete rather than invalid.
//!
//! ## Wire format
//!
//! ```text
//! STX | priority | address | RTR|length | data[length] | checksum | ETX
//! 0x0F  F8..FB     01..FE     0x40|0..8    command, payload   2's complement  0x04
//! ```
//!
//! The checksum is the two's complement of the byte sum from STX through the
//! last data byte, so summing every byte up to and including the checksum
//! yields zero.
//!
//! ## Usage
//!
//! ```rust
//! use velbus_rs::velbus::frame::{decode, encode, Decoded};
//!
//! let bytes = encode(0x02, 0x07, &[0x01, 40, 0x00, 0x00]);
//! match decode(&bytes) {
//!     Decoded::Frame { frame, consumed } => {
//!         assert_eq!(frame.address, 0x02);
//!         assert_eq!(consumed, bytes.len());
//!     }
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

use crate::constants::{
    COMMAND_BLIND_DOWN, COMMAND_BLIND_UP, COMMAND_SET_DIMVALUE, VELBUS_ETX,
    VELBUS_LENGTH_MASK, VELBUS_LENGTH_RESERVED_MASK, VELBUS_MAX_DATA_LEN,
    VELBUS_MAX_FRAME_LEN, VELBUS_MAX_PAYLOAD_LEN, VELBUS_PRIORITY_FIRMWARE,
    VELBUS_PRIORITY_HIGH, VELBUS_PRIORITY_LOW, VELBUS_PRIORITY_THIRDPARTY, VELBUS_RTR,
    VELBUS_STX,
};
use crate::error::VelbusError;
use nom::bytes::streaming::{tag, take};
use nom::combinator::{map_opt, verify};
use nom::number::streaming::be_u8;
use nom::{Err as NomErr, IResult};

/// Frame priority, carried in the second byte of every frame.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Priority {
    High,
    Firmware,
    ThirdParty,
    Low,
}

impl Priority {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            VELBUS_PRIORITY_HIGH => Some(Priority::High),
            VELBUS_PRIORITY_FIRMWARE => Some(Priority::Firmware),
            VELBUS_PRIORITY_THIRDPARTY => Some(Priority::ThirdParty),
            VELBUS_PRIORITY_LOW => Some(Priority::Low),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Priority::High => VELBUS_PRIORITY_HIGH,
            Priority::Firmware => VELBUS_PRIORITY_FIRMWARE,
            Priority::ThirdParty => VELBUS_PRIORITY_THIRDPARTY,
            Priority::Low => VELBUS_PRIORITY_LOW,
        }
    }

    /// Modules expect output commands at high priority, everything else low.
    pub fn for_command(command: u8) -> Self {
        match command {
            COMMAND_BLIND_UP | COMMAND_BLIND_DOWN | COMMAND_SET_DIMVALUE => Priority::High,
            _ => Priority::Low,
        }
    }
}

/// Represents a Velbus frame.
///
/// `command` is `None` only for remote transmit request frames, which carry no
/// data bytes at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VelbusFrame {
    pub priority: Priority,
    pub address: u8,
    pub rtr: bool,
    pub command: Option<u8>,
    pub payload: Vec<u8>,
    pub checksum: u8,
}

impl VelbusFrame {
    /// Builds a data frame and computes its checksum.
    ///
    /// Payloads longer than 7 bytes do not fit the 4-bit length field and are
    /// truncated.
    pub fn new(priority: Priority, address: u8, command: u8, payload: &[u8]) -> Self {
        let payload = if payload.len() > VELBUS_MAX_PAYLOAD_LEN {
            log::warn!(
                "Truncating payload for command 0x{command:02X} from {} to {VELBUS_MAX_PAYLOAD_LEN} bytes",
                payload.len()
            );
            &payload[..VELBUS_MAX_PAYLOAD_LEN]
        } else {
            payload
        };

        let mut frame = VelbusFrame {
            priority,
            address,
            rtr: false,
            command: Some(command),
            payload: payload.to_vec(),
            checksum: 0,
        };
        frame.checksum = calculate_checksum(&frame);
        frame
    }

    /// Builds a remote transmit request, which asks the module at `address`
    /// to announce its module type.
    pub fn rtr(address: u8) -> Self {
        let mut frame = VelbusFrame {
            priority: Priority::Low,
            address,
            rtr: true,
            command: None,
            payload: Vec::new(),
            checksum: 0,
        };
        frame.checksum = calculate_checksum(&frame);
        frame
    }

    /// Command byte followed by the payload, as carried on the wire.
    pub fn data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(1 + self.payload.len());
        data.extend(self.command);
        data.extend_from_slice(&self.payload);
        data
    }

    fn rtr_len_byte(&self) -> u8 {
        let len = (self.command.is_some() as usize + self.payload.len()) as u8;
        let rtr = if self.rtr { VELBUS_RTR } else { 0 };
        rtr | (len & VELBUS_LENGTH_MASK)
    }
}

/// Outcome of a single [`decode`] attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A complete, checksum-valid frame occupying the first `consumed` bytes.
    Frame { frame: VelbusFrame, consumed: usize },
    /// The buffer holds the beginning of a frame (or nothing at all).
    NeedMoreBytes,
    /// The leading bytes are not a valid frame; drop `discard` bytes and retry.
    Invalid { discard: usize, reason: &'static str },
}

/// Encodes a data frame for `address` with the command's default priority.
pub fn encode(address: u8, command: u8, payload: &[u8]) -> Vec<u8> {
    pack_frame(&VelbusFrame::new(
        Priority::for_command(command),
        address,
        command,
        payload,
    ))
}

/// Encodes a remote transmit request for `address`.
pub fn encode_rtr(address: u8) -> Vec<u8> {
    pack_frame(&VelbusFrame::rtr(address))
}

/// Packs a frame into its wire representation. The stored checksum is written
/// as is; use [`verify_frame`] to check it.
pub fn pack_frame(frame: &VelbusFrame) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(VELBUS_MAX_FRAME_LEN);
    bytes.push(VELBUS_STX);
    bytes.push(frame.priority.as_byte());
    bytes.push(frame.address);
    bytes.push(frame.rtr_len_byte());
    bytes.extend(frame.command);
    bytes.extend_from_slice(&frame.payload);
    bytes.push(frame.checksum);
    bytes.push(VELBUS_ETX);
    bytes
}

/// Verifies the checksum of a frame.
pub fn verify_frame(frame: &VelbusFrame) -> Result<(), VelbusError> {
    let calculated = calculate_checksum(frame);
    if frame.checksum != calculated {
        return Err(VelbusError::Protocol(format!(
            "invalid checksum: expected 0x{:02X}, calculated 0x{calculated:02X}",
            frame.checksum
        )));
    }
    Ok(())
}

/// Two's complement of the byte sum.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes
        .iter()
        .fold(0u8, |acc, b| acc.wrapping_add(*b))
        .wrapping_neg()
}

fn calculate_checksum(frame: &VelbusFrame) -> u8 {
    let header = [
        VELBUS_STX,
        frame.priority.as_byte(),
        frame.address,
        frame.rtr_len_byte(),
    ];
    let sum = header
        .iter()
        .chain(frame.command.iter())
        .chain(frame.payload.iter())
        .fold(0u8, |acc, b| acc.wrapping_add(*b));
    sum.wrapping_neg()
}

/// Parses STX, priority, address and the RTR/length byte.
fn parse_header(input: &[u8]) -> IResult<&[u8], (Priority, u8, bool, usize)> {
    let (input, _) = tag(&[VELBUS_STX][..])(input)?;
    let (input, priority) = map_opt(be_u8, Priority::from_byte)(input)?;
    let (input, address) = be_u8(input)?;
    let (input, rtr_len) = verify(be_u8, |b: &u8| {
        b & VELBUS_LENGTH_RESERVED_MASK == 0
            && usize::from(b & VELBUS_LENGTH_MASK) <= VELBUS_MAX_DATA_LEN
    })(input)?;
    let rtr = rtr_len & VELBUS_RTR != 0;
    let len = usize::from(rtr_len & VELBUS_LENGTH_MASK);
    Ok((input, (priority, address, rtr, len)))
}

/// Uses `nom` streaming parsers to read one frame from the front of `input`.
/// The checksum is read but not verified.
pub fn parse_frame(input: &[u8]) -> IResult<&[u8], VelbusFrame> {
    let (input, (priority, address, rtr, len)) = parse_header(input)?;
    let (input, data) = take(len)(input)?;
    let (input, checksum) = be_u8(input)?;
    let (input, _) = tag(&[VELBUS_ETX][..])(input)?;

    let (command, payload) = match data.split_first() {
        Some((command, payload)) => (Some(*command), payload.to_vec()),
        None => (None, Vec::new()),
    };

    Ok((
        input,
        VelbusFrame {
            priority,
            address,
            rtr,
            command,
            payload,
            checksum,
        },
    ))
}

/// Attempts to decode one frame from the front of `buf`.
///
/// Holds no state between calls: the caller keeps the accumulation buffer and
/// calls again once more bytes have arrived.
pub fn decode(buf: &[u8]) -> Decoded {
    match parse_frame(buf) {
        Ok((rest, frame)) => {
            if verify_frame(&frame).is_err() {
                return Decoded::Invalid {
                    discard: resync_offset(buf),
                    reason: "checksum mismatch",
                };
            }
            Decoded::Frame {
                frame,
                consumed: buf.len() - rest.len(),
            }
        }
        // A truncated frame followed by a complete one was never a frame.
        Err(NomErr::Incomplete(_)) => match later_frame_offset(buf) {
            Some(discard) => Decoded::Invalid {
                discard,
                reason: "truncated frame",
            },
            None => Decoded::NeedMoreBytes,
        },
        Err(_) => Decoded::Invalid {
            discard: resync_offset(buf),
            reason: "bad framing byte",
        },
    }
}

/// Offset of the first start byte after position 0 that begins a complete,
/// checksum-valid frame.
fn later_frame_offset(buf: &[u8]) -> Option<usize> {
    (1..buf.len()).filter(|&i| buf[i] == VELBUS_STX).find(|&i| {
        matches!(parse_frame(&buf[i..]), Ok((_, frame)) if verify_frame(&frame).is_ok())
    })
}

/// Offset of the next candidate start byte after position 0.
fn resync_offset(buf: &[u8]) -> usize {
    buf.iter()
        .skip(1)
        .position(|b| *b == VELBUS_STX)
        .map_or(buf.len(), |p| p + 1)
}
