//! Device identity resolution (consumed interface).

use crate::error::IngestResult;
use async_trait::async_trait;
use guardian_types::DeviceIdentity;

/// Maps an opaque device credential to a confirmed device identity.
///
/// A resolution is valid only for the call that requested it: a device
/// can be deleted between messages, so callers resolve once per
/// connection attempt, handshake attempt, or fallback request and never
/// cache the result. Later writes must either re-resolve or be prepared
/// for the storage gateway to reject a now-unknown identity.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolves a credential, or fails with
    /// [`IngestError::UnknownIdentity`](crate::IngestError::UnknownIdentity)
    /// when no such device exists.
    async fn resolve(&self, credential: &str) -> IngestResult<DeviceIdentity>;
}
