// Shared fixtures for the end-to-end tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use velbus_rs::velbus::MockBusPort;
use velbus_rs::{BusEvent, BusManager, ConnectionState, DeviceDescriptor, EventCallback};

pub const WAIT: Duration = Duration::from_secs(2);

/// Dimmer on 0x02/1, blind on 0x03/2, relay on 0x04/1.
pub fn living_room() -> Vec<DeviceDescriptor> {
    vec![
        DeviceDescriptor::new(5, 0x02, 1)
            .with_command(10)
            .with_sensor(99, "scaling"),
        DeviceDescriptor::new(6, 0x03, 2)
            .with_command(11)
            .with_sensor(100, "DT_UpDown"),
        DeviceDescriptor::new(7, 0x04, 1).with_sensor(101, "DT_Switch"),
    ]
}

/// Callback that forwards every event into a channel.
pub fn event_channel() -> (EventCallback, mpsc::UnboundedReceiver<BusEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback: EventCallback = Arc::new(move |event: BusEvent| {
        let _ = tx.send(event);
    });
    (callback, rx)
}

pub async fn next_event(events: &mut mpsc::UnboundedReceiver<BusEvent>) -> BusEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for a bus event")
        .expect("event channel closed")
}

/// Gives the listener time to process, then asserts nothing was reported.
pub async fn assert_no_event(events: &mut mpsc::UnboundedReceiver<BusEvent>) {
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(events.try_recv().ok(), None);
}

pub async fn open_mock(manager: &BusManager) -> MockBusPort {
    let port = MockBusPort::new();
    manager.open_stream(port.clone(), "mock").await.unwrap();
    assert_eq!(manager.state(), ConnectionState::Open);
    port
}

pub async fn wait_for_state(manager: &BusManager, wanted: ConnectionState) {
    let mut states = manager.subscribe_state();
    timeout(WAIT, states.wait_for(|state| *state == wanted))
        .await
        .expect("timed out waiting for connection state")
        .expect("state channel closed");
}

pub fn hex_to_bytes(hex: &str) -> Vec<u8> {
    velbus_rs::util::hex::decode_hex(hex).unwrap()
}
