//! # Bus Listener
//!
//! The listener is the single consumer of the connection's read half. It runs
//! as its own task from the moment the bus opens until the manager raises the
//! stop signal, turning inbound bytes into [`BusEvent`]s:
//!
//! 1. read into an accumulation buffer (raced against the stop signal);
//! 2. decode as many frames as the buffer holds, dropping garbage up to the
//!    next start byte whenever a frame fails to parse or verify;
//! 3. interpret each frame and resolve its readings against the registry;
//! 4. on end of stream or a read error, mark the connection failed and emit
//!    [`BusEvent::ConnectionLost`].

use crate::bus_manager::ConnectionState;
use crate::registry::{DeviceRegistry, SensorId};
use crate::util::logging::{log_frame_hex, LogThrottle};
use crate::velbus::frame::{decode, Decoded, VelbusFrame};
use crate::velbus::message::{interpret, BusMessage, ChannelReading};
use crate::velbus::transport::BusReader;
use bytes::{Buf, BytesMut};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Something the bus manager reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// A configured sensor changed.
    Sensor { sensor_id: SensorId, value: u8 },
    /// The connection dropped; the listener has stopped.
    ConnectionLost { reason: String },
}

/// Caller-supplied sink for bus events. Invoked from the listener task, so it
/// should hand the event off rather than block.
pub type EventCallback = Arc<dyn Fn(BusEvent) + Send + Sync>;

/// Bytes dropped while resynchronizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discarded {
    pub reason: &'static str,
    pub bytes: Vec<u8>,
}

/// Result of draining an accumulation buffer.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Drained {
    pub frames: Vec<VelbusFrame>,
    pub discarded: Vec<Discarded>,
}

/// Decodes every complete frame at the front of `buf`, removing consumed and
/// discarded bytes. A trailing partial frame stays in the buffer.
pub fn drain_frames(buf: &mut BytesMut) -> Drained {
    let mut drained = Drained::default();
    loop {
        match decode(buf) {
            Decoded::Frame { frame, consumed } => {
                buf.advance(consumed);
                drained.frames.push(frame);
            }
            Decoded::NeedMoreBytes => break,
            Decoded::Invalid { discard, reason } => {
                let bytes = buf.split_to(discard).to_vec();
                drained.discarded.push(Discarded { reason, bytes });
            }
        }
    }
    drained
}

/// Resolves a reading and invokes the callback on a hit.
pub fn publish(
    registry: &DeviceRegistry,
    callback: &EventCallback,
    reading: &ChannelReading,
) -> bool {
    match registry.resolve_sensor(reading.address, reading.channel, reading.data_types) {
        Some((sensor_id, data_type)) => {
            log::info!(
                "Sensor {sensor_id} = {} (address 0x{:02X} channel {} {data_type})",
                reading.value,
                reading.address,
                reading.channel
            );
            callback(BusEvent::Sensor {
                sensor_id,
                value: reading.value,
            });
            true
        }
        None => false,
    }
}

/// Counters reported when the listener exits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ListenerStats {
    pub bytes_read: u64,
    pub frames: u64,
    pub events: u64,
    pub bytes_discarded: u64,
}

enum Wake {
    Stop,
    Read(crate::error::Result<usize>),
}

pub struct Listener {
    reader: BusReader,
    registry: Arc<DeviceRegistry>,
    callback: EventCallback,
    state: Arc<watch::Sender<ConnectionState>>,
    stop: watch::Receiver<bool>,
    buffer: BytesMut,
    throttle: LogThrottle,
    stats: ListenerStats,
}

impl Listener {
    pub fn new(
        reader: BusReader,
        registry: Arc<DeviceRegistry>,
        callback: EventCallback,
        state: Arc<watch::Sender<ConnectionState>>,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Listener {
            reader,
            registry,
            callback,
            state,
            stop,
            buffer: BytesMut::with_capacity(256),
            // at most 5 protocol warnings per second
            throttle: LogThrottle::new(1000, 5),
            stats: ListenerStats::default(),
        }
    }

    pub fn spawn(self) -> JoinHandle<ListenerStats> {
        tokio::spawn(self.run())
    }

    fn stop_requested(&self) -> bool {
        *self.stop.borrow()
    }

    pub async fn run(mut self) -> ListenerStats {
        log::info!("Velbus listener started on {}", self.reader.target());

        while !self.stop_requested() {
            let wake = tokio::select! {
                biased;
                changed = self.stop.changed() => match changed {
                    Ok(()) => continue,
                    Err(_) => Wake::Stop,
                },
                read = self.reader.read(&mut self.buffer) => Wake::Read(read),
            };

            match wake {
                Wake::Stop => break,
                Wake::Read(Ok(0)) => {
                    self.connection_lost("connection closed by peer".to_string());
                    break;
                }
                Wake::Read(Ok(n)) => {
                    self.stats.bytes_read += n as u64;
                    self.process_buffer();
                }
                Wake::Read(Err(e)) => {
                    self.connection_lost(e.to_string());
                    break;
                }
            }
        }

        log::info!("Velbus listener on {} stopped", self.reader.target());
        self.stats
    }

    fn process_buffer(&mut self) {
        let drained = drain_frames(&mut self.buffer);

        for discarded in &drained.discarded {
            self.stats.bytes_discarded += discarded.bytes.len() as u64;
            if self.throttle.allow() {
                let suppressed = self.throttle.take_suppressed();
                log::warn!(
                    "Dropping {} bytes from the bus: {} ({suppressed} similar messages suppressed)",
                    discarded.bytes.len(),
                    discarded.reason
                );
            }
            log_frame_hex("Discarded", &discarded.bytes);
        }

        for frame in &drained.frames {
            self.stats.frames += 1;
            self.handle_frame(frame);
        }
    }

    fn handle_frame(&mut self, frame: &VelbusFrame) {
        match interpret(frame) {
            BusMessage::Readings(readings) => {
                for reading in &readings {
                    if publish(&self.registry, &self.callback, reading) {
                        self.stats.events += 1;
                    } else {
                        log::debug!(
                            "No sensor configured for address 0x{:02X} channel {} {:?}",
                            reading.address,
                            reading.channel,
                            reading.data_types
                        );
                    }
                }
            }
            BusMessage::ModuleType {
                address,
                module_type,
            } => {
                log::info!("Module type 0x{module_type:02X} found at address 0x{address:02X}");
            }
            BusMessage::Unhandled { address, command } => {
                log::debug!("Ignoring command {command:02X?} from address 0x{address:02X}");
            }
        }
    }

    fn connection_lost(&mut self, reason: String) {
        if self.stop_requested() {
            return;
        }
        self.state.send_if_modified(|state| {
            if *state == ConnectionState::Open {
                *state = ConnectionState::Failed;
                true
            } else {
                false
            }
        });
        log::error!("Velbus connection {} lost: {reason}", self.reader.target());
        (self.callback)(BusEvent::ConnectionLost { reason });
    }
}
