//! Integration tests for the satellite line protocol.
//!
//! These tests push raw bytes through the public API exactly the way the
//! bridge's network layer does: bytes → [`LineSplitter`] → [`SatelliteMessage`],
//! and outgoing commands are checked against the documented wire forms.

use satellite_core::protocol::messages::{self, KeyStateUpdate};
use satellite_core::protocol::tokenize;
use satellite_core::{DeviceDescriptor, KeyPos, LineSplitter, SatelliteMessage};

/// Feeds `chunks` into a splitter and parses every complete line.
fn decode_stream(chunks: &[&[u8]]) -> Vec<SatelliteMessage> {
    let mut splitter = LineSplitter::new();
    let mut out = Vec::new();
    for chunk in chunks {
        splitter.push(chunk);
        while let Some(line) = splitter.next_line() {
            out.push(SatelliteMessage::parse(&line));
        }
    }
    out
}

#[test]
fn test_tokenizer_documented_example() {
    assert_eq!(tokenize(r#"A B="x y" C"#), vec!["A", "B=x y", "C"]);
}

#[test]
fn test_session_opening_split_across_reads() {
    // Arrange: BEGIN arrives in two pieces, followed by a PING in the same read
    let chunks: [&[u8]; 2] = [b"BEGIN ApiVer", b"sion=\"1.0.0\"\r\nPING 77\n"];

    // Act
    let msgs = decode_stream(&chunks);

    // Assert
    assert_eq!(msgs.len(), 2);
    match &msgs[0] {
        SatelliteMessage::Begin(peer) => assert_eq!(peer.api_version(), Some("1.0.0")),
        other => panic!("expected BEGIN, got {other:?}"),
    }
    assert_eq!(
        msgs[1],
        SatelliteMessage::Ping {
            body: "77".to_string()
        }
    );
}

#[test]
fn test_key_state_documented_example_resolves_to_x2_y1_hello() {
    // Arrange
    let device = DeviceDescriptor {
        id: "dev1".to_string(),
        columns: 8,
        ..DeviceDescriptor::default()
    };

    // Act
    let msgs = decode_stream(&[b"KEY-STATE DEVICEID=\"dev1\" KEY=1/2 TEXT=SGVsbG8=\n"]);

    // Assert
    let update: &KeyStateUpdate = match &msgs[0] {
        SatelliteMessage::KeyState(u) => u,
        other => panic!("expected KEY-STATE, got {other:?}"),
    };
    assert_eq!(update.device_id, "dev1");
    assert_eq!(update.position(device.columns, device.rows), KeyPos::new(2, 1));
    assert_eq!(update.visual_state().text.as_deref(), Some("Hello"));
}

#[test]
fn test_flat_key_index_resolves_against_grid() {
    let msgs = decode_stream(&[b"KEY-STATE DEVICEID=dev1 KEY=19 COLOR=#ff0000\n"]);
    let SatelliteMessage::KeyState(update) = &msgs[0] else {
        panic!("expected KEY-STATE");
    };
    assert_eq!(update.position(8, 4), KeyPos::new(3, 2));
    assert_eq!(update.visual_state().bg_color.as_deref(), Some("#ff0000"));
}

#[test]
fn test_garbage_lines_never_fail_and_keep_order() {
    // Arrange: an unknown verb, a verb with an unterminated quote, and blank lines
    let chunks: [&[u8]; 1] = [b"\n\nWHATEVER x=\"unterminated\nKEYS-CLEAR DEVICEID=dev1\n"];

    // Act
    let msgs = decode_stream(&chunks);

    // Assert
    assert_eq!(
        msgs,
        vec![
            SatelliteMessage::Unknown {
                verb: "WHATEVER".to_string()
            },
            SatelliteMessage::KeysClear {
                device_id: "dev1".to_string()
            },
        ]
    );
}

#[test]
fn test_outgoing_registration_parses_back_with_same_fields() {
    // Arrange
    let device = DeviceDescriptor {
        id: "dev1".to_string(),
        columns: 5,
        rows: 3,
        bitmap: 96,
        ..DeviceDescriptor::default()
    };

    // Act
    let line = messages::add_device(&device, "Satellite Virtual Surface");
    let cmd = satellite_core::Command::parse(line.trim_end());

    // Assert
    assert!(line.ends_with('\n'));
    assert_eq!(cmd.verb, "ADD-DEVICE");
    assert_eq!(cmd.params.get_str("DEVICEID"), Some("dev1"));
    assert_eq!(cmd.params.get_str("PRODUCT_NAME"), Some("Satellite Virtual Surface"));
    assert_eq!(cmd.params.get_int("KEYS_TOTAL"), Some(15));
    assert_eq!(cmd.params.get_int("KEYS_PER_ROW"), Some(5));
    assert_eq!(cmd.params.get_int("BITMAPS"), Some(96));
    assert_eq!(cmd.params.get_bool("COLORS"), Some(true));
    assert_eq!(cmd.params.get_bool("TEXT"), Some(true));
    assert_eq!(cmd.params.get_bool("TEXT_STYLE"), Some(false));
}

#[test]
fn test_ping_body_echoed_in_pong_verbatim() {
    let msgs = decode_stream(&[b"PING  spaced \"token\"\n"]);
    let SatelliteMessage::Ping { body } = &msgs[0] else {
        panic!("expected PING");
    };
    assert_eq!(messages::pong(body), "PONG  spaced \"token\"\n");
}
