//! Connection session state machine.
//!
//! One `Session` per physical connection. The machine is pure: every
//! transition is a synchronous function of (state, event) that returns
//! the frame or close code for the transport driver to act on, so the
//! lifecycle is testable without a socket. The driver performs the
//! async work the machine asks for (credential resolution, dispatch)
//! and feeds the outcome back in.
//!
//! States: `Connecting → {Authenticating | Active} → Closed`, with
//! `Closed` absorbing. `Authenticating` is entered only when no
//! credential arrived with the connection; the peer then gets exactly
//! one attempt — on failure the session closes and retries take a
//! fresh connection.

use crate::error::SessionCloseCode;
use crate::protocol::{ClientFrame, IngestMessage, ServerMessage};
use crate::validate::parse_frame;
use guardian_types::DeviceIdentity;
use tracing::debug;

/// Lifecycle states of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Opened; identity not yet resolved.
    Connecting,
    /// No credential arrived with the connection; awaiting the auth
    /// frame.
    Authenticating,
    /// Identity bound; data frames are accepted.
    Active,
    /// Terminal. No further frames are processed.
    Closed,
}

/// What the driver should do with one inbound frame.
#[derive(Debug, PartialEq)]
pub enum FrameDisposition {
    /// Resolve this credential, then call back with
    /// [`Session::identity_resolved`] or [`Session::identity_rejected`].
    Authenticate(String),
    /// Dispatch through the coordinator and send the resulting
    /// ack/error in arrival order.
    Dispatch(IngestMessage),
    /// Send this frame; the session stays open.
    Reply(ServerMessage),
    /// Close the connection with this code.
    Close(SessionCloseCode),
    /// The session is already closed; drop the frame.
    Ignore,
}

/// Per-connection lifecycle state.
///
/// The identity is bound at most once — either at construction time
/// (direct path) or after the handshake — and never rebound.
pub struct Session {
    state: SessionState,
    identity: Option<DeviceIdentity>,
    frames_seen: u64,
}

impl Session {
    /// A fresh session in `Connecting`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SessionState::Connecting,
            identity: None,
            frames_seen: 0,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The bound identity, if any.
    #[must_use]
    pub fn identity(&self) -> Option<&DeviceIdentity> {
        self.identity.as_ref()
    }

    /// Frames received on this connection, for diagnostics.
    #[must_use]
    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    /// Credential resolution succeeded: bind the identity and go
    /// Active. Returns the connection-established acknowledgment.
    pub fn identity_resolved(&mut self, identity: DeviceIdentity) -> ServerMessage {
        if matches!(
            self.state,
            SessionState::Connecting | SessionState::Authenticating
        ) && self.identity.is_none()
        {
            debug!(device = %identity, "session bound");
            self.identity = Some(identity.clone());
            self.state = SessionState::Active;
        }
        ServerMessage::connection_established(&identity)
    }

    /// Credential resolution failed: close with the identity-not-found
    /// code.
    pub fn identity_rejected(&mut self) -> SessionCloseCode {
        self.state = SessionState::Closed;
        SessionCloseCode::UnknownIdentity
    }

    /// No credential arrived with the connection: enter the handshake.
    /// Returns the auth prompt to send.
    pub fn begin_auth(&mut self) -> ServerMessage {
        if self.state == SessionState::Connecting {
            self.state = SessionState::Authenticating;
        }
        ServerMessage::auth_required()
    }

    /// The bounded wait for the auth frame elapsed.
    pub fn auth_timed_out(&mut self) -> SessionCloseCode {
        self.state = SessionState::Closed;
        SessionCloseCode::AuthRequired
    }

    /// The transport disconnected. Any in-flight dispatch releases its
    /// own lock on completion, so nothing is left to clean up here.
    pub fn peer_disconnected(&mut self) {
        self.state = SessionState::Closed;
    }

    /// Runs one inbound frame through the machine.
    pub fn handle_frame(&mut self, text: &str) -> FrameDisposition {
        match self.state {
            SessionState::Closed => FrameDisposition::Ignore,
            SessionState::Connecting => {
                // Data before the identity is resolved is a protocol
                // violation on either entry path.
                self.state = SessionState::Closed;
                FrameDisposition::Close(SessionCloseCode::AuthRequired)
            }
            SessionState::Authenticating => {
                self.frames_seen += 1;
                match parse_frame(text) {
                    Ok(ClientFrame::Auth { child_hash }) => {
                        FrameDisposition::Authenticate(child_hash)
                    }
                    // One attempt only: anything that is not a valid
                    // auth frame closes the session.
                    _ => {
                        self.state = SessionState::Closed;
                        FrameDisposition::Close(SessionCloseCode::AuthRequired)
                    }
                }
            }
            SessionState::Active => {
                self.frames_seen += 1;
                match parse_frame(text) {
                    Ok(ClientFrame::Ingest(message)) => FrameDisposition::Dispatch(message),
                    Ok(ClientFrame::Auth { .. }) => FrameDisposition::Reply(
                        ServerMessage::error("unexpected auth message on an authenticated connection"),
                    ),
                    // Soft failure: one bad frame does not kill the
                    // session.
                    Err(e) => FrameDisposition::Reply(ServerMessage::error(e.to_string())),
                }
            }
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
