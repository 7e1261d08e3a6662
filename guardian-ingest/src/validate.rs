//! Message envelope and payload validation.
//!
//! Pure functions from raw frame text to typed frames. No I/O: the
//! validator never touches the identity resolver or the storage
//! gateway.
//!
//! Error mapping: problems with the envelope itself (non-JSON input,
//! missing `type`/`data`, an unrecognized discriminator) are
//! [`IngestError::MalformedEnvelope`]; field-level problems inside a
//! recognized envelope (missing, mistyped, or out-of-range values) are
//! [`IngestError::InvalidField`]. Out-of-range values are rejected,
//! never clamped.

use crate::error::{IngestError, IngestResult};
use crate::protocol::{
    ClientFrame, IngestMessage, LocationPayload, ScreenTimePayload, SiteAccessBatch,
};
use guardian_types::DataKind;
use serde_json::Value;

/// Parses and validates one inbound frame.
pub fn parse_frame(text: &str) -> IngestResult<ClientFrame> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| IngestError::MalformedEnvelope(format!("invalid JSON: {e}")))?;
    let Value::Object(obj) = value else {
        return Err(IngestError::MalformedEnvelope(
            "expected a JSON object".to_string(),
        ));
    };
    let Some(message_type) = obj.get("type").and_then(Value::as_str) else {
        return Err(IngestError::MalformedEnvelope(
            "expected \"type\" and \"data\" fields".to_string(),
        ));
    };

    if message_type == "auth" {
        let child_hash = obj
            .get("child_hash")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or(IngestError::AuthRequired)?;
        return Ok(ClientFrame::Auth {
            child_hash: child_hash.to_string(),
        });
    }

    let Some(kind) = DataKind::parse(message_type) else {
        return Err(IngestError::MalformedEnvelope(format!(
            "unknown message type: {message_type}"
        )));
    };
    let Some(data) = obj.get("data") else {
        return Err(IngestError::MalformedEnvelope(
            "expected \"type\" and \"data\" fields".to_string(),
        ));
    };

    Ok(ClientFrame::Ingest(parse_section(kind, data)?))
}

/// Validates the `data` object of one telemetry kind.
///
/// Shared by the streaming path (after envelope checks) and the
/// synchronous fallback endpoint, which carries up to three such
/// sections in one request.
pub fn parse_section(kind: DataKind, data: &Value) -> IngestResult<IngestMessage> {
    if !data.is_object() {
        return Err(IngestError::MalformedEnvelope(format!(
            "{kind}: \"data\" must be an object"
        )));
    }
    match kind {
        DataKind::ScreenTime => Ok(IngestMessage::ScreenTime(parse_screen_time(data)?)),
        DataKind::Location => Ok(IngestMessage::Location(parse_location(data)?)),
        DataKind::SiteAccess => Ok(IngestMessage::SiteAccess(parse_site_access(data)?)),
    }
}

fn parse_screen_time(data: &Value) -> IngestResult<ScreenTimePayload> {
    let payload: ScreenTimePayload = serde_json::from_value(data.clone())
        .map_err(|e| IngestError::InvalidField(format!("screen_time: {e}")))?;

    if let Some(apps) = &payload.app_wise_data {
        for (app, hourly) in apps {
            for hour in hourly.keys() {
                // Plain digits only: u8 parsing alone would let a
                // leading `+` through.
                let in_range = hour.bytes().all(|b| b.is_ascii_digit())
                    && hour.parse::<u8>().is_ok_and(|h| h <= 23);
                if !in_range {
                    return Err(IngestError::InvalidField(format!(
                        "screen_time: hour {hour:?} for app {app} is outside 0-23"
                    )));
                }
            }
        }
    }
    Ok(payload)
}

fn parse_location(data: &Value) -> IngestResult<LocationPayload> {
    let payload: LocationPayload = serde_json::from_value(data.clone())
        .map_err(|e| IngestError::InvalidField(format!("location: {e}")))?;

    if !(-90.0..=90.0).contains(&payload.latitude) {
        return Err(IngestError::InvalidField(format!(
            "location: latitude {} is outside [-90, 90]",
            payload.latitude
        )));
    }
    if !(-180.0..=180.0).contains(&payload.longitude) {
        return Err(IngestError::InvalidField(format!(
            "location: longitude {} is outside [-180, 180]",
            payload.longitude
        )));
    }
    Ok(payload)
}

fn parse_site_access(data: &Value) -> IngestResult<SiteAccessBatch> {
    let payload: SiteAccessBatch = serde_json::from_value(data.clone())
        .map_err(|e| IngestError::InvalidField(format!("site_access: {e}")))?;

    for (index, entry) in payload.logs.iter().enumerate() {
        if entry.url.is_empty() {
            return Err(IngestError::InvalidField(format!(
                "site_access: log entry {index} has an empty url"
            )));
        }
    }
    Ok(payload)
}
