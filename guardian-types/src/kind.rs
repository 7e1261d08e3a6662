//! Telemetry data kinds accepted by the ingest protocol.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The three telemetry kinds a device can report.
///
/// The serialized form matches the wire discriminator used in message
/// envelopes (`screen_time`, `location`, `site_access`). Also one half
/// of the in-flight lock key, so writes for different kinds from the
/// same device never block each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    /// Per-day screen time with an optional per-app hourly breakdown.
    ScreenTime,
    /// A single location point.
    Location,
    /// A batch of site access/block events.
    SiteAccess,
}

impl DataKind {
    /// All kinds, in wire order.
    pub const ALL: [DataKind; 3] = [Self::ScreenTime, Self::Location, Self::SiteAccess];

    /// The wire discriminator for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ScreenTime => "screen_time",
            Self::Location => "location",
            Self::SiteAccess => "site_access",
        }
    }

    /// Parses a wire discriminator, `None` for unrecognized kinds.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "screen_time" => Some(Self::ScreenTime),
            "location" => Some(Self::Location),
            "site_access" => Some(Self::SiteAccess),
            _ => None,
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
