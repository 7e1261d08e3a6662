//! Error types for the ingest core.

use thiserror::Error;

/// Result type for ingest operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Close codes sent when the server terminates a connection.
///
/// Both codes are terminal: the client must reconnect (and, for 4004,
/// re-enroll the device) rather than retry on the same connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCloseCode {
    /// Authentication required or failed (4001).
    AuthRequired,
    /// Device identity not found (4004).
    UnknownIdentity,
}

impl SessionCloseCode {
    /// The numeric close code sent on the wire.
    #[must_use]
    pub fn as_u16(self) -> u16 {
        match self {
            Self::AuthRequired => 4001,
            Self::UnknownIdentity => 4004,
        }
    }

    /// Human-readable close reason.
    #[must_use]
    pub fn reason(self) -> &'static str {
        match self {
            Self::AuthRequired => "authentication required",
            Self::UnknownIdentity => "unknown device identity",
        }
    }
}

/// Errors that can occur while ingesting telemetry.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The frame was not a `{type, data}` envelope the protocol recognizes.
    #[error("invalid message format: {0}")]
    MalformedEnvelope(String),

    /// The envelope was recognized but a payload field is missing,
    /// mistyped, or out of range.
    #[error("invalid field: {0}")]
    InvalidField(String),

    /// The supplied credential does not resolve to a device.
    #[error("unknown device identity")]
    UnknownIdentity,

    /// The peer must authenticate before sending data.
    #[error("authentication required")]
    AuthRequired,

    /// The storage gateway failed or timed out; the client may retry.
    #[error("storage failure: {0}")]
    StorageFailure(String),
}

impl IngestError {
    /// Whether this error terminates the connection.
    ///
    /// Only identity failures are fatal. Validation and storage errors
    /// are reported per message and the session stays open, so one bad
    /// frame never kills an otherwise healthy stream.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::UnknownIdentity | Self::AuthRequired)
    }

    /// The close code for a fatal error, `None` for recoverable ones.
    #[must_use]
    pub fn close_code(&self) -> Option<SessionCloseCode> {
        match self {
            Self::UnknownIdentity => Some(SessionCloseCode::UnknownIdentity),
            Self::AuthRequired => Some(SessionCloseCode::AuthRequired),
            _ => None,
        }
    }
}
