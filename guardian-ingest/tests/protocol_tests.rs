//! Wire-format exactness: the serialized field names are a
//! compatibility contract with deployed device clients.

use chrono::{NaiveDate, TimeZone, Utc};
use guardian_ingest::{Ack, AckBody, ServerMessage, SessionCloseCode};
use guardian_types::{DataKind, DeviceIdentity};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn as_value(message: &ServerMessage) -> Value {
    serde_json::to_value(message).unwrap()
}

// ── Close codes ──────────────────────────────────────────────────

#[test]
fn close_codes_match_the_wire_contract() {
    assert_eq!(SessionCloseCode::AuthRequired.as_u16(), 4001);
    assert_eq!(SessionCloseCode::UnknownIdentity.as_u16(), 4004);
}

// ── Server frames ────────────────────────────────────────────────

#[test]
fn connection_established_frame() {
    let message = ServerMessage::connection_established(&DeviceIdentity::new("abc123"));
    let value = as_value(&message);

    assert_eq!(value["type"], "connection_established");
    assert_eq!(value["child_hash"], "abc123");
    assert!(value["message"].is_string());
}

#[test]
fn auth_required_frame() {
    let value = as_value(&ServerMessage::auth_required());
    assert_eq!(value["type"], "auth_required");
    assert!(value["message"].is_string());
}

#[test]
fn error_frame() {
    let value = as_value(&ServerMessage::error("something went wrong"));
    assert_eq!(value["type"], "error");
    assert_eq!(value["message"], "something went wrong");
}

#[test]
fn screen_time_ack_frame() {
    let ack = Ack {
        kind: DataKind::ScreenTime,
        result: AckBody::ScreenTime {
            stored: true,
            created: false,
            date: NaiveDate::from_ymd_opt(2025, 12, 10).unwrap(),
        },
    };
    let value = as_value(&ack.into_message());

    assert_eq!(value["type"], "ack");
    assert_eq!(value["message_type"], "screen_time");
    assert_eq!(value["status"], "success");
    assert_eq!(value["result"]["stored"], true);
    assert_eq!(value["result"]["created"], false);
    assert_eq!(value["result"]["date"], "2025-12-10");
}

#[test]
fn location_ack_frame() {
    let ack = Ack {
        kind: DataKind::Location,
        result: AckBody::Location {
            stored: true,
            timestamp: Utc.with_ymd_and_hms(2025, 12, 10, 10, 30, 0).unwrap(),
        },
    };
    let value = as_value(&ack.into_message());

    assert_eq!(value["message_type"], "location");
    assert_eq!(value["result"]["stored"], true);
    assert!(value["result"]["timestamp"]
        .as_str()
        .unwrap()
        .starts_with("2025-12-10T10:30:00"));
}

#[test]
fn site_access_ack_frame() {
    let ack = Ack {
        kind: DataKind::SiteAccess,
        result: AckBody::SiteAccess {
            stored: true,
            count: 3,
        },
    };
    let value = as_value(&ack.into_message());

    assert_eq!(value["message_type"], "site_access");
    assert_eq!(value["result"]["count"], 3);
}

#[test]
fn server_frames_roundtrip() {
    for message in [
        ServerMessage::connection_established(&DeviceIdentity::new("abc123")),
        ServerMessage::auth_required(),
        ServerMessage::error("boom"),
        Ack {
            kind: DataKind::SiteAccess,
            result: AckBody::SiteAccess {
                stored: true,
                count: 0,
            },
        }
        .into_message(),
    ] {
        let text = serde_json::to_string(&message).unwrap();
        let parsed: ServerMessage = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, message);
    }
}

// ── Client frame shapes accepted by the validator ────────────────

#[test]
fn client_envelope_shape_is_type_plus_data() {
    // Documented request shapes; the validator owns enforcement, this
    // pins the canonical examples.
    let frame = json!({
        "type": "location",
        "data": {"timestamp": "2025-12-10T10:30:00Z", "latitude": 40.7128, "longitude": -74.006}
    });
    assert!(guardian_ingest::parse_frame(&frame.to_string()).is_ok());

    let auth = json!({"type": "auth", "child_hash": "abc123"});
    assert!(guardian_ingest::parse_frame(&auth.to_string()).is_ok());
}
