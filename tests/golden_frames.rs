use velbus_rs::velbus::frame::{decode, Decoded, Priority, VelbusFrame};
use velbus_rs::velbus::message::{
    interpret, scan_frame, set_level_frame, shutter_frame, BusMessage, ChannelReading,
    ShutterDirection, LEVEL_DATA_TYPES, SWITCH_DATA_TYPES, UP_DOWN_DATA_TYPES,
};

fn hex_to_bytes(hex: &str) -> Vec<u8> {
    velbus_rs::util::hex::decode_hex(hex).unwrap()
}

// Outgoing commands
const SET_LEVEL_02_CH1_40_HEX: &str = "0F F8 02 05 07 01 28 00 00 C2 04";
const BLIND_UP_03_CH2_HEX: &str = "0F F8 03 05 05 02 00 00 00 EA 04";
const BLIND_DOWN_03_CH2_HEX: &str = "0F F8 03 05 06 02 00 00 00 E9 04";
const MODULE_TYPE_REQUEST_02_HEX: &str = "0F FB 02 40 B4 04";

// Incoming status
const DIMMER_STATUS_02_CH1_40_HEX: &str = "0F FB 02 04 B8 01 00 28 0F 04";
const SINGLE_DIMMER_STATUS_06_MODE1_50_HEX: &str = "0F FB 06 08 EE 01 32 00 00 00 00 00 C7 04";
const BLIND_STATUS_03_CH2_DOWN_HEX: &str = "0F FB 03 04 EC 02 00 02 FF 04";
const RELAY_STATUS_04_CH1_ON_HEX: &str = "0F FB 04 04 FB 01 00 01 F1 04";
const PUSH_BUTTON_05_CH3_PRESSED_HEX: &str = "0F FB 05 04 00 04 00 00 E9 04";
const MODULE_TYPE_02_HEX: &str = "0F FB 02 04 FF 12 00 00 DF 04";

fn decode_one(hex: &str) -> VelbusFrame {
    let data = hex_to_bytes(hex);
    match decode(&data) {
        Decoded::Frame { frame, consumed } => {
            assert_eq!(consumed, data.len());
            frame
        }
        other => panic!("Failed to decode {hex}: {other:?}"),
    }
}

#[test]
fn test_set_level_frame() {
    assert_eq!(set_level_frame(0x02, 1, 40), hex_to_bytes(SET_LEVEL_02_CH1_40_HEX));
}

#[test]
fn test_shutter_frames() {
    assert_eq!(
        shutter_frame(0x03, 2, ShutterDirection::Up),
        hex_to_bytes(BLIND_UP_03_CH2_HEX)
    );
    assert_eq!(
        shutter_frame(0x03, 2, ShutterDirection::Down),
        hex_to_bytes(BLIND_DOWN_03_CH2_HEX)
    );
}

#[test]
fn test_module_type_request() {
    assert_eq!(scan_frame(0x02), hex_to_bytes(MODULE_TYPE_REQUEST_02_HEX));

    let frame = decode_one(MODULE_TYPE_REQUEST_02_HEX);
    assert!(frame.rtr);
    assert_eq!(frame.priority, Priority::Low);
    assert_eq!(frame.command, None);
    assert!(frame.payload.is_empty());
}

#[test]
fn test_dimmer_status() {
    let frame = decode_one(DIMMER_STATUS_02_CH1_40_HEX);
    assert_eq!(frame.priority, Priority::Low);
    assert_eq!(
        interpret(&frame),
        BusMessage::Readings(vec![ChannelReading {
            address: 0x02,
            channel: 1,
            data_types: LEVEL_DATA_TYPES,
            value: 40,
        }])
    );
}

#[test]
fn test_single_channel_dimmer_status() {
    let frame = decode_one(SINGLE_DIMMER_STATUS_06_MODE1_50_HEX);
    assert_eq!(frame.payload.len(), 7);
    assert_eq!(
        interpret(&frame),
        BusMessage::Readings(vec![ChannelReading {
            address: 0x06,
            channel: 1,
            data_types: LEVEL_DATA_TYPES,
            value: 50,
        }])
    );
}

#[test]
fn test_blind_status() {
    let frame = decode_one(BLIND_STATUS_03_CH2_DOWN_HEX);
    assert_eq!(
        interpret(&frame),
        BusMessage::Readings(vec![ChannelReading {
            address: 0x03,
            channel: 2,
            data_types: UP_DOWN_DATA_TYPES,
            value: 1,
        }])
    );
}

#[test]
fn test_relay_status() {
    let frame = decode_one(RELAY_STATUS_04_CH1_ON_HEX);
    assert_eq!(
        interpret(&frame),
        BusMessage::Readings(vec![ChannelReading {
            address: 0x04,
            channel: 1,
            data_types: SWITCH_DATA_TYPES,
            value: 1,
        }])
    );
}

#[test]
fn test_push_button_status() {
    let frame = decode_one(PUSH_BUTTON_05_CH3_PRESSED_HEX);
    assert_eq!(
        interpret(&frame),
        BusMessage::Readings(vec![ChannelReading {
            address: 0x05,
            channel: 3,
            data_types: SWITCH_DATA_TYPES,
            value: 1,
        }])
    );
}

#[test]
fn test_module_type_answer() {
    let frame = decode_one(MODULE_TYPE_02_HEX);
    assert_eq!(
        interpret(&frame),
        BusMessage::ModuleType {
            address: 0x02,
            module_type: 0x12,
        }
    );
}
