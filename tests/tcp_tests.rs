//! Bus manager against a local TCP server standing in for a Velbus TCP bridge.

mod mock_support;

use mock_support::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::timeout;
use velbus_rs::velbus::message::set_level_frame;
use velbus_rs::{BusEvent, BusManager, ConnectionDescriptor, ConnectionState, VelbusError};

#[tokio::test]
async fn test_socket_round_trip() {
    let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();

    let (callback, mut events) = event_channel();
    let manager = BusManager::new(&living_room(), callback);
    manager
        .open(&ConnectionDescriptor::socket(addr.to_string()))
        .await
        .unwrap();
    assert_eq!(manager.state(), ConnectionState::Open);

    let (mut peer, _) = timeout(WAIT, server.accept()).await.unwrap().unwrap();

    manager.set_level(5, 10, 40).await.unwrap();
    let expected = set_level_frame(0x02, 1, 40);
    let mut received = vec![0u8; expected.len()];
    timeout(WAIT, peer.read_exact(&mut received))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received, expected);

    peer.write_all(&hex_to_bytes("0F FB 02 04 B8 01 00 28 0F 04"))
        .await
        .unwrap();
    assert_eq!(
        next_event(&mut events).await,
        BusEvent::Sensor {
            sensor_id: 99,
            value: 40
        }
    );

    drop(peer);
    assert!(matches!(
        next_event(&mut events).await,
        BusEvent::ConnectionLost { .. }
    ));
    assert_eq!(manager.state(), ConnectionState::Failed);

    manager.close().await.unwrap();
    assert_eq!(manager.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_connection_refused() {
    let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();
    drop(server);

    let (callback, _events) = event_channel();
    let manager = BusManager::new(&living_room(), callback);
    let result = manager
        .open(&ConnectionDescriptor::socket(addr.to_string()))
        .await;

    assert!(matches!(result, Err(VelbusError::Connection { .. })));
    assert_eq!(manager.state(), ConnectionState::Failed);
}

#[tokio::test]
async fn test_connect_helper_opens_configured_bus() {
    let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();

    let config = velbus_rs::BusConfig::from_json_str(&format!(
        r#"{{"connection": {{"type": "socket", "address": "{addr}"}},
            "devices": [{{"id": 5, "parameters": {{"address": 2, "channel": 1}}, "commands": [{{"id": 10}}]}}]}}"#
    ))
    .unwrap();

    let (callback, _events) = event_channel();
    let manager = velbus_rs::connect(&config, callback).await.unwrap();
    assert_eq!(manager.state(), ConnectionState::Open);
    assert_eq!(manager.registry().command_count(), 1);
    manager.close().await.unwrap();
}
