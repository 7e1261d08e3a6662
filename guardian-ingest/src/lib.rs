//! Telemetry ingestion core for Guardian.
//!
//! Accepts screen-time, location, and site-access telemetry streamed
//! from remote devices over long-lived connections, with a synchronous
//! fallback for devices that cannot hold one open.
//!
//! # Components
//!
//! - **Protocol** (`protocol`): the wire vocabulary — envelopes,
//!   payload schemas, acks, and error frames
//! - **Validator** (`validate`): pure envelope and payload validation,
//!   no I/O
//! - **Session** (`session`): per-connection lifecycle state machine,
//!   including the auth handshake
//! - **Coordinator** (`coordinator`): at most one in-flight write per
//!   (device, kind), system-wide
//! - **Consumed interfaces** (`identity`, `gateway`): the credential
//!   resolver and the storage boundary, plus an in-memory reference
//!   store
//!
//! # Message flow
//!
//! A device connects → its identity is resolved (directly from the
//! connection target, or via the auth handshake) → the server emits
//! `connection_established` → each inbound frame is validated, then
//! dispatched through the coordinator to the storage gateway → a
//! per-message ack or error goes back in arrival order. Validation and
//! storage errors are soft; identity failures close the connection
//! with a distinguished code (4001/4004).

pub mod coordinator;
mod error;
pub mod gateway;
pub mod identity;
pub mod protocol;
pub mod session;
pub mod validate;

pub use coordinator::{IngestConfig, IngestionCoordinator};
pub use error::{IngestError, IngestResult, SessionCloseCode};
pub use gateway::{
    memory::MemoryStore, LocationStored, ScreenTimeStored, SiteAccessStored, StorageGateway,
};
pub use identity::IdentityResolver;
pub use protocol::{
    Ack, AckBody, AckStatus, ClientFrame, IngestMessage, LocationPayload, ScreenTimePayload,
    ServerMessage, SiteAccessBatch, SiteAccessEntry,
};
pub use session::{FrameDisposition, Session, SessionState};
pub use validate::{parse_frame, parse_section};
