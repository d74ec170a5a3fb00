//! # Velbus Bus Manager
//!
//! This module provides the BusManager struct, which serves as the main entry
//! point of the crate. It owns the connection and its lifecycle, starts the
//! listener task when the bus opens, and forwards commands to the dispatcher.
//!
//! ```text
//! Closed --open--> Opening --ok--> Open --close--> Closed
//!                     |              |
//!                     +--error--> Failed <--connection lost
//! ```
//!
//! A manager is meant to be shared: wrap it in an `Arc` and call commands from
//! as many tasks as needed.

use crate::config::ManagerOptions;
use crate::error::{Result, VelbusError};
use crate::registry::{CommandId, DeviceDescriptor, DeviceId, DeviceRegistry};
use crate::velbus::dispatcher::{CommandDispatcher, SharedWriter};
use crate::velbus::listener::{EventCallback, Listener, ListenerStats};
use crate::velbus::message::ShutterDirection;
use crate::velbus::transport::{self, BoxedStream, BusStream, ConnectionDescriptor, Transport};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Opening,
    Open,
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Closed => "closed",
            ConnectionState::Opening => "opening",
            ConnectionState::Open => "open",
            ConnectionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// An open connection: the running listener and its stop signal.
struct Session {
    target: String,
    stop: watch::Sender<bool>,
    listener: JoinHandle<ListenerStats>,
}

pub struct BusManager {
    registry: Arc<DeviceRegistry>,
    options: ManagerOptions,
    callback: EventCallback,
    state: Arc<watch::Sender<ConnectionState>>,
    writer: SharedWriter,
    dispatcher: CommandDispatcher,
    /// Also serializes open and close.
    session: Mutex<Option<Session>>,
}

impl BusManager {
    /// Creates a manager with default options.
    pub fn new(devices: &[DeviceDescriptor], callback: EventCallback) -> Self {
        Self::with_options(devices, ManagerOptions::default(), callback)
    }

    pub fn with_options(
        devices: &[DeviceDescriptor],
        options: ManagerOptions,
        callback: EventCallback,
    ) -> Self {
        Self::from_registry(Arc::new(DeviceRegistry::build(devices)), options, callback)
    }

    pub fn from_registry(
        registry: Arc<DeviceRegistry>,
        options: ManagerOptions,
        callback: EventCallback,
    ) -> Self {
        let (state, state_rx) = watch::channel(ConnectionState::Closed);
        let writer: SharedWriter = Arc::new(Mutex::new(None));
        let dispatcher = CommandDispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&writer),
            state_rx,
            Arc::clone(&callback),
            &options,
        );

        BusManager {
            registry,
            options,
            callback,
            state: Arc::new(state),
            writer,
            dispatcher,
            session: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch the connection state, e.g. to reconnect after a failure.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Opens the serial port or socket described by `descriptor` and starts
    /// listening.
    ///
    /// A malformed descriptor is rejected before anything is opened and
    /// leaves the state untouched; a failed open leaves the manager `Failed`.
    pub async fn open(&self, descriptor: &ConnectionDescriptor) -> Result<()> {
        let mut session = self.session.lock().await;
        self.prepare_open(&mut session).await?;

        let transport = Transport::from_descriptor(descriptor, &self.options.serial)?;
        let target = transport.target();
        self.state.send_replace(ConnectionState::Opening);

        let stream = match transport.open().await {
            Ok(stream) => stream,
            Err(e) => {
                log::error!("Opening {} device {target} failed: {e}", descriptor.kind);
                self.state.send_replace(ConnectionState::Failed);
                return Err(e);
            }
        };

        *session = Some(self.start_session(stream, target).await);
        drop(session);
        self.scan_after_open().await;
        Ok(())
    }

    /// Attaches an already-open byte stream (a mock port, a pipe, a stream
    /// opened by the host) instead of opening a device.
    pub async fn open_stream<S>(&self, stream: S, target: impl Into<String>) -> Result<()>
    where
        S: BusStream + 'static,
    {
        let mut session = self.session.lock().await;
        self.prepare_open(&mut session).await?;
        self.state.send_replace(ConnectionState::Opening);

        *session = Some(self.start_session(Box::new(stream), target.into()).await);
        drop(session);
        self.scan_after_open().await;
        Ok(())
    }

    /// Stops the listener, closes the connection and returns to `Closed`.
    /// Closing a closed manager does nothing.
    pub async fn close(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        match session.take() {
            Some(active) => {
                let target = active.target.clone();
                self.teardown(active).await;
                log::info!("Velbus connection {target} closed");
            }
            None => {
                if self.state() == ConnectionState::Closed {
                    return Ok(());
                }
            }
        }
        self.state.send_replace(ConnectionState::Closed);
        Ok(())
    }

    /// Sets the dimmer behind `(device_id, command_id)` to `level` percent.
    pub async fn set_level(
        &self,
        device_id: DeviceId,
        command_id: CommandId,
        level: i32,
    ) -> Result<()> {
        self.dispatcher.set_level(device_id, command_id, level).await
    }

    pub async fn shutter_up(&self, device_id: DeviceId, command_id: CommandId) -> Result<()> {
        self.dispatcher.shutter_up(device_id, command_id).await
    }

    pub async fn shutter_down(&self, device_id: DeviceId, command_id: CommandId) -> Result<()> {
        self.dispatcher.shutter_down(device_id, command_id).await
    }

    pub async fn shutter(
        &self,
        device_id: DeviceId,
        command_id: CommandId,
        direction: ShutterDirection,
    ) -> Result<()> {
        self.dispatcher
            .shutter(device_id, command_id, direction)
            .await
    }

    /// Asks modules to announce themselves. Returns the number of requests
    /// sent; announcements are logged by the listener as they arrive.
    pub async fn scan(&self) -> Result<usize> {
        self.dispatcher.scan().await
    }

    /// Rejects a second open and clears out a session whose listener has
    /// already died.
    async fn prepare_open(&self, session: &mut Option<Session>) -> Result<()> {
        if self.state() == ConnectionState::Open {
            return Err(VelbusError::AlreadyOpen);
        }
        if let Some(stale) = session.take() {
            self.teardown(stale).await;
        }
        Ok(())
    }

    async fn start_session(&self, stream: BoxedStream, target: String) -> Session {
        let (reader, writer) = transport::split(stream, target.clone());
        *self.writer.lock().await = Some(writer);

        let (stop, stop_rx) = watch::channel(false);
        // Open must be published before the listener can report a failure.
        self.state.send_replace(ConnectionState::Open);
        let listener = Listener::new(
            reader,
            Arc::clone(&self.registry),
            Arc::clone(&self.callback),
            Arc::clone(&self.state),
            stop_rx,
        )
        .spawn();

        log::info!("Velbus connection {target} open");
        Session {
            target,
            stop,
            listener,
        }
    }

    async fn teardown(&self, session: Session) {
        session.stop.send_replace(true);
        match session.listener.await {
            Ok(stats) => log::debug!("Listener on {} finished: {stats:?}", session.target),
            Err(e) => log::error!("Listener on {} ended abnormally: {e}", session.target),
        }

        if let Some(mut writer) = self.writer.lock().await.take() {
            log::debug!("{} frames written to {}", writer.frames_written(), session.target);
            if let Err(e) = writer.close().await {
                log::warn!("Closing {} failed: {e}", session.target);
            }
        }
    }

    async fn scan_after_open(&self) {
        if !self.options.scan_on_open {
            return;
        }
        if let Err(e) = self.scan().await {
            log::warn!("Initial bus scan failed: {e}");
        }
    }
}

impl fmt::Debug for BusManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusManager")
            .field("state", &self.state())
            .field("commands", &self.registry.command_count())
            .field("sensors", &self.registry.sensor_count())
            .field("options", &self.options)
            .finish()
    }
}
