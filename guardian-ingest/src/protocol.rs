//! Ingest protocol messages and payload schemas.
//!
//! Field names are a compatibility contract with deployed device
//! clients; changing them breaks the wire format. Client frames are
//! `{type, data}` envelopes (plus the `auth` handshake frame carrying
//! `child_hash` at the top level); server frames are tagged by `type`.

use chrono::{DateTime, NaiveDate, Utc};
use guardian_types::{DataKind, DeviceIdentity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-day screen time for one device.
///
/// `app_wise_data` maps an application identifier to an hour-of-day
/// (as a string key, `"0"`–`"23"`) to seconds used in that hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenTimePayload {
    /// Calendar day the data covers (no time component).
    pub date: NaiveDate,
    /// Total seconds of screen time for the day.
    pub total_screen_time: u64,
    /// Optional per-app hourly breakdown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_wise_data: Option<HashMap<String, HashMap<String, u64>>>,
}

/// A single location point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationPayload {
    /// Absolute point in time the fix was taken.
    pub timestamp: DateTime<Utc>,
    /// Latitude in degrees, [-90, 90].
    pub latitude: f64,
    /// Longitude in degrees, [-180, 180].
    pub longitude: f64,
}

/// One site access or block event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteAccessEntry {
    /// When the access was attempted.
    pub timestamp: DateTime<Utc>,
    /// The requested URL.
    pub url: String,
    /// True if accessed, false if blocked.
    pub accessed: bool,
}

/// An ordered batch of site access events.
///
/// An empty batch is accepted as a no-op success, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteAccessBatch {
    /// Events in the order the device observed them.
    pub logs: Vec<SiteAccessEntry>,
}

/// A validated inbound telemetry message.
///
/// Constructed from one frame by the validator, consumed by one
/// dispatch; never stored as-is.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestMessage {
    /// Daily screen time (upserted by (device, date)).
    ScreenTime(ScreenTimePayload),
    /// A location point (appended).
    Location(LocationPayload),
    /// A site access batch (bulk-appended).
    SiteAccess(SiteAccessBatch),
}

impl IngestMessage {
    /// The data kind this message carries.
    #[must_use]
    pub fn kind(&self) -> DataKind {
        match self {
            Self::ScreenTime(_) => DataKind::ScreenTime,
            Self::Location(_) => DataKind::Location,
            Self::SiteAccess(_) => DataKind::SiteAccess,
        }
    }
}

/// A validated client frame: either the handshake or a data message.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientFrame {
    /// `{type: "auth", child_hash}` — handshake credential.
    Auth {
        /// The device credential to resolve.
        child_hash: String,
    },
    /// A `{type, data}` telemetry envelope.
    Ingest(IngestMessage),
}

/// Result payload inside an ack, mirroring the store outcome per kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AckBody {
    /// Screen-time upsert outcome. `created` is false when an existing
    /// (device, date) record was updated instead.
    ScreenTime {
        stored: bool,
        created: bool,
        date: NaiveDate,
    },
    /// Location append outcome.
    Location {
        stored: bool,
        timestamp: DateTime<Utc>,
    },
    /// Site-access bulk append outcome.
    SiteAccess { stored: bool, count: usize },
}

/// Acknowledgment for one dispatched message.
#[derive(Debug, Clone, PartialEq)]
pub struct Ack {
    /// The kind that was stored.
    pub kind: DataKind,
    /// The store outcome.
    pub result: AckBody,
}

impl Ack {
    /// Converts into the wire frame sent back on the connection.
    #[must_use]
    pub fn into_message(self) -> ServerMessage {
        ServerMessage::Ack {
            message_type: self.kind,
            status: AckStatus::Success,
            result: self.result,
        }
    }
}

/// Ack status. Failures are reported as `error` frames instead, so the
/// only value is `success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    Success,
}

/// A server-to-client frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once after the identity is bound.
    ConnectionEstablished {
        child_hash: String,
        message: String,
    },
    /// Handshake prompt sent when no credential arrived with the
    /// connection.
    AuthRequired { message: String },
    /// Per-message acknowledgment.
    Ack {
        message_type: DataKind,
        status: AckStatus,
        result: AckBody,
    },
    /// Per-message error report. The connection stays open.
    Error { message: String },
}

impl ServerMessage {
    /// The connection-established acknowledgment for a bound identity.
    #[must_use]
    pub fn connection_established(identity: &DeviceIdentity) -> Self {
        Self::ConnectionEstablished {
            child_hash: identity.to_string(),
            message: "WebSocket connection established successfully".to_string(),
        }
    }

    /// The handshake prompt.
    #[must_use]
    pub fn auth_required() -> Self {
        Self::AuthRequired {
            message: "Please authenticate with child_hash".to_string(),
        }
    }

    /// An error frame with the given message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
