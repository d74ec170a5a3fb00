use velbus_rs::registry::Endpoint;
use velbus_rs::{DataType, DeviceDescriptor, DeviceParameters, DeviceRegistry, VelbusError};

fn living_room() -> Vec<DeviceDescriptor> {
    vec![
        DeviceDescriptor::new(5, 0x02, 1)
            .with_command(10)
            .with_sensor(99, "scaling"),
        DeviceDescriptor::new(6, 0x03, 2)
            .with_command(11)
            .with_sensor(100, "DT_UpDown"),
    ]
}

#[test]
fn test_build_is_idempotent() {
    let devices = living_room();
    assert_eq!(DeviceRegistry::build(&devices), DeviceRegistry::build(&devices));
}

#[test]
fn test_resolve_configured_command() {
    let registry = DeviceRegistry::build(&living_room());
    assert_eq!(
        registry.resolve_command(5, 10).unwrap(),
        Endpoint {
            address: 0x02,
            channel: 1
        }
    );
    assert_eq!(registry.command_count(), 2);
    assert_eq!(registry.sensor_count(), 2);
}

#[test]
fn test_unknown_command_is_not_found() {
    let registry = DeviceRegistry::build(&living_room());
    match registry.resolve_command(5, 11) {
        Err(VelbusError::NotFound {
            device_id,
            command_id,
        }) => {
            assert_eq!(device_id, 5);
            assert_eq!(command_id, 11);
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn test_device_without_bus_parameters_is_not_indexed() {
    let mut unaddressed = DeviceDescriptor::new(7, 0x04, 1)
        .with_command(12)
        .with_sensor(101, "DT_Switch");
    unaddressed.parameters = DeviceParameters {
        address: Some(0x04),
        channel: None,
    };

    let registry = DeviceRegistry::build(&[unaddressed]);
    assert!(registry.is_empty());
    assert!(matches!(
        registry.resolve_command(7, 12),
        Err(VelbusError::NotFound { .. })
    ));
    assert_eq!(registry.resolve_sensor(0x04, 1, &[DataType::Switch]), None);
}

#[test]
fn test_unknown_sensor_data_type_is_skipped() {
    let registry = DeviceRegistry::build(&[DeviceDescriptor::new(8, 0x05, 1)
        .with_command(1)
        .with_sensor(102, "DT_Temperature")
        .with_sensor(103, "switch")]);
    assert_eq!(registry.sensor_count(), 1);
    assert_eq!(
        registry.resolve_sensor(0x05, 1, &[DataType::Switch]),
        Some((103, DataType::Switch))
    );
}

#[test]
fn test_sensor_lookup_by_endpoint_and_type() {
    let registry = DeviceRegistry::build(&living_room());
    assert_eq!(
        registry.resolve_sensor(0x02, 1, &[DataType::Scaling, DataType::Switch]),
        Some((99, DataType::Scaling))
    );
    assert_eq!(registry.resolve_sensor(0x02, 1, &[DataType::UpDown]), None);
    assert_eq!(
        registry.resolve_sensor(0x03, 2, &[DataType::UpDown]),
        Some((100, DataType::UpDown))
    );
}

#[test]
fn test_devices_from_json() {
    let devices: Vec<DeviceDescriptor> = serde_json::from_str(
        r#"[
            {"id": 5, "parameters": {"address": 2, "channel": 1},
             "commands": [{"id": 10}], "sensors": [{"id": 99, "data_type": "DT_Scaling"}]},
            {"id": 9, "commands": [{"id": 1}]}
        ]"#,
    )
    .unwrap();

    let registry = DeviceRegistry::build(&devices);
    assert_eq!(registry.command_count(), 1);
    assert_eq!(registry.addresses().collect::<Vec<_>>(), vec![0x02]);
}
