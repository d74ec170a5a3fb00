//! The velbus module contains the protocol side of the crate: the frame codec,
//! message interpretation, the serial and socket transports, and the listener
//! and dispatcher tasks that sit on either half of an open connection.

pub mod dispatcher;
pub mod frame;
pub mod listener;
pub mod message;
pub mod serial;
pub mod serial_mock;
pub mod tcp;
pub mod transport;

pub use frame::{decode, encode, encode_rtr, Decoded, Priority, VelbusFrame};
pub use listener::{BusEvent, EventCallback};
pub use message::{interpret, BusMessage, ChannelReading, DataType, ShutterDirection};
pub use transport::{ConnectionDescriptor, ConnectionKind};

/// Mock byte stream for exercising the manager without hardware.
pub use serial_mock::MockBusPort;
