//! # Command Dispatcher
//!
//! Resolves caller-facing (device, command) pairs to bus endpoints, builds the
//! matching frame and writes it through the shared writer. Every frame is
//! written while holding the write lock, so concurrent callers never
//! interleave bytes on the wire.
//!
//! Checks run in a fixed order: arguments, registry, connection state. A
//! rejected call never touches the bus.

use crate::bus_manager::ConnectionState;
use crate::config::{ManagerOptions, ScanScope};
use crate::constants::{VELBUS_ADDRESS_MAX, VELBUS_ADDRESS_MIN, VELBUS_LEVEL_MAX};
use crate::error::{Result, VelbusError};
use crate::registry::{CommandId, DeviceId, DeviceRegistry, Endpoint};
use crate::util::logging::log_frame_hex;
use crate::velbus::listener::{publish, EventCallback};
use crate::velbus::message::{
    scan_frame, set_level_frame, shutter_frame, ChannelReading, DataType, ShutterDirection,
    LEVEL_DATA_TYPES, UP_DOWN_DATA_TYPES,
};
use crate::velbus::transport::BusWriter;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// Write half shared between the dispatcher and the manager's lifecycle code.
/// `None` while the bus is closed.
pub type SharedWriter = Arc<Mutex<Option<BusWriter>>>;

pub struct CommandDispatcher {
    registry: Arc<DeviceRegistry>,
    writer: SharedWriter,
    state: watch::Receiver<ConnectionState>,
    callback: EventCallback,
    scan_scope: ScanScope,
    optimistic_echo: bool,
}

impl CommandDispatcher {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        writer: SharedWriter,
        state: watch::Receiver<ConnectionState>,
        callback: EventCallback,
        options: &ManagerOptions,
    ) -> Self {
        CommandDispatcher {
            registry,
            writer,
            state,
            callback,
            scan_scope: options.scan_scope,
            optimistic_echo: options.optimistic_echo,
        }
    }

    /// Sets a dimmer channel to `level` percent.
    pub async fn set_level(
        &self,
        device_id: DeviceId,
        command_id: CommandId,
        level: i32,
    ) -> Result<()> {
        let level = u8::try_from(level)
            .ok()
            .filter(|l| i32::from(*l) <= VELBUS_LEVEL_MAX)
            .ok_or_else(|| {
                VelbusError::Validation(format!(
                    "level must be between 0 and {VELBUS_LEVEL_MAX}, got {level}"
                ))
            })?;
        let endpoint = self.registry.resolve_command(device_id, command_id)?;
        self.ensure_open()?;

        log::debug!(
            "Set level {level} on address 0x{:02X} channel {}",
            endpoint.address,
            endpoint.channel
        );
        self.write(&set_level_frame(endpoint.address, endpoint.channel, level))
            .await?;
        self.echo(endpoint, LEVEL_DATA_TYPES, level);
        Ok(())
    }

    pub async fn shutter_up(&self, device_id: DeviceId, command_id: CommandId) -> Result<()> {
        self.shutter(device_id, command_id, ShutterDirection::Up).await
    }

    pub async fn shutter_down(&self, device_id: DeviceId, command_id: CommandId) -> Result<()> {
        self.shutter(device_id, command_id, ShutterDirection::Down).await
    }

    pub async fn shutter(
        &self,
        device_id: DeviceId,
        command_id: CommandId,
        direction: ShutterDirection,
    ) -> Result<()> {
        let endpoint = self.registry.resolve_command(device_id, command_id)?;
        self.ensure_open()?;

        log::debug!(
            "Shutter {direction:?} on address 0x{:02X} channel {}",
            endpoint.address,
            endpoint.channel
        );
        self.write(&shutter_frame(endpoint.address, endpoint.channel, direction))
            .await?;
        self.echo(endpoint, UP_DOWN_DATA_TYPES, direction.sensor_value());
        Ok(())
    }

    /// Sends a module type request to every address in scope and returns the
    /// number of requests written. Replies arrive through the listener.
    pub async fn scan(&self) -> Result<usize> {
        self.ensure_open()?;

        let addresses: Vec<u8> = match self.scan_scope {
            ScanScope::Configured => self.registry.addresses().collect(),
            ScanScope::Full => (VELBUS_ADDRESS_MIN..=VELBUS_ADDRESS_MAX).collect(),
        };
        if addresses.is_empty() {
            log::warn!("Scan requested but no module addresses are configured");
        }

        for address in &addresses {
            self.write(&scan_frame(*address)).await?;
        }
        log::info!("Scan sent {} module type requests", addresses.len());
        Ok(addresses.len())
    }

    fn ensure_open(&self) -> Result<()> {
        if *self.state.borrow() == ConnectionState::Open {
            Ok(())
        } else {
            Err(VelbusError::NotConnected)
        }
    }

    async fn write(&self, frame: &[u8]) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(VelbusError::NotConnected)?;
        log_frame_hex("Sending", frame);
        writer.write_frame(frame).await.map_err(|e| {
            log::error!("Writing to the bus failed: {e}");
            e
        })
    }

    fn echo(&self, endpoint: Endpoint, data_types: &'static [DataType], value: u8) {
        if !self.optimistic_echo {
            return;
        }
        let reading = ChannelReading {
            address: endpoint.address,
            channel: endpoint.channel,
            data_types,
            value,
        };
        if !publish(&self.registry, &self.callback, &reading) {
            log::debug!(
                "No sensor to echo address 0x{:02X} channel {} to",
                endpoint.address,
                endpoint.channel
            );
        }
    }
}
