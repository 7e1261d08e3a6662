//! Ingestion coordinator — at most one in-flight write per (device, kind).
//!
//! Two fast-arriving messages for the same device and kind must not
//! interleave partial updates at the gateway, so dispatch serializes
//! them in arrival order. Different devices, and different kinds for
//! the same device, proceed fully in parallel. The coordinator is
//! shared by every connection session and the synchronous fallback
//! path, so the guarantee holds system-wide.

use crate::error::{IngestError, IngestResult};
use crate::gateway::StorageGateway;
use crate::protocol::{Ack, AckBody, IngestMessage};
use guardian_types::{DataKind, DeviceIdentity};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

/// Tuning for dispatch waits.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// How long a dispatch may wait for the per-key lock (ms). A
    /// wedged prior write must not starve a device's later writes
    /// forever; on timeout the message fails with a retryable
    /// `StorageFailure`.
    pub lock_wait_ms: u64,
    /// How long one storage gateway call may run (ms).
    pub storage_wait_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            lock_wait_ms: 10_000,
            storage_wait_ms: 30_000,
        }
    }
}

type LockKey = (DeviceIdentity, DataKind);

/// Arena of per-key write locks.
///
/// Entries hold weak references so the table never grows with dead
/// keys: the lock cell lives exactly as long as some dispatch holds or
/// awaits it, and the entry is swept when the last holder drops.
#[derive(Default)]
struct LockTable {
    cells: Mutex<HashMap<LockKey, Weak<AsyncMutex<()>>>>,
}

impl LockTable {
    /// Returns the live lock cell for a key, creating one if needed.
    fn cell(&self, key: LockKey) -> Arc<AsyncMutex<()>> {
        let mut cells = self.cells.lock().expect("lock table poisoned");
        if let Some(existing) = cells.get(&key).and_then(Weak::upgrade) {
            return existing;
        }
        let cell = Arc::new(AsyncMutex::new(()));
        cells.insert(key, Arc::downgrade(&cell));
        cell
    }

    /// Removes the entry for a key if no one holds its cell anymore.
    fn sweep(&self, key: &LockKey) {
        let mut cells = self.cells.lock().expect("lock table poisoned");
        if let Some(weak) = cells.get(key) {
            if weak.strong_count() == 0 {
                cells.remove(key);
            }
        }
    }

    fn len(&self) -> usize {
        self.cells.lock().expect("lock table poisoned").len()
    }
}

/// Exclusive hold on one (device, kind) key. Released on drop, so no
/// error or cancellation path can leak it.
struct InFlightLock {
    key: LockKey,
    table: Arc<LockTable>,
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for InFlightLock {
    fn drop(&mut self) {
        // Release the cell before sweeping so the entry can be removed
        // when we were the last holder.
        self.guard.take();
        self.table.sweep(&self.key);
    }
}

async fn acquire(
    table: &Arc<LockTable>,
    key: LockKey,
    wait: Duration,
) -> IngestResult<InFlightLock> {
    let cell = table.cell(key.clone());
    match tokio::time::timeout(wait, cell.lock_owned()).await {
        Ok(guard) => Ok(InFlightLock {
            key,
            table: Arc::clone(table),
            guard: Some(guard),
        }),
        Err(_) => {
            table.sweep(&key);
            Err(IngestError::StorageFailure(format!(
                "timed out waiting for in-flight {} write for device {}",
                key.1, key.0
            )))
        }
    }
}

/// Serializes telemetry writes per (device, kind) and turns store
/// outcomes into acknowledgments.
///
/// The lock is cooperative: the gateway remains responsible for its own
/// internal consistency, since it may also be called by paths outside
/// any one session's knowledge.
pub struct IngestionCoordinator {
    gateway: Arc<dyn StorageGateway>,
    locks: Arc<LockTable>,
    config: IngestConfig,
}

impl IngestionCoordinator {
    /// Creates a coordinator with default wait bounds.
    #[must_use]
    pub fn new(gateway: Arc<dyn StorageGateway>) -> Self {
        Self::with_config(gateway, IngestConfig::default())
    }

    /// Creates a coordinator with custom wait bounds.
    #[must_use]
    pub fn with_config(gateway: Arc<dyn StorageGateway>, config: IngestConfig) -> Self {
        Self {
            gateway,
            locks: Arc::new(LockTable::default()),
            config,
        }
    }

    /// Number of live lock-table entries. Diagnostics only; the table
    /// is empty whenever no dispatch is in flight.
    #[must_use]
    pub fn in_flight_keys(&self) -> usize {
        self.locks.len()
    }

    /// Dispatches one validated message: acquire the (device, kind)
    /// lock, perform the kind-specific store operation, release, ack.
    ///
    /// Storage failures and timeouts come back as
    /// [`IngestError::StorageFailure`] — recoverable, reported per
    /// message. A gateway rejection of a now-unknown identity
    /// propagates as the fatal [`IngestError::UnknownIdentity`].
    pub async fn dispatch(
        &self,
        identity: &DeviceIdentity,
        message: IngestMessage,
    ) -> IngestResult<Ack> {
        let kind = message.kind();
        let _held = acquire(
            &self.locks,
            (identity.clone(), kind),
            Duration::from_millis(self.config.lock_wait_ms),
        )
        .await?;

        let store = self.store(identity, message);
        let wait = Duration::from_millis(self.config.storage_wait_ms);
        let result = match tokio::time::timeout(wait, store).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(device = %identity, kind = %kind, "store failed: {e}");
                return Err(e);
            }
            Err(_) => {
                warn!(device = %identity, kind = %kind, "store call timed out");
                return Err(IngestError::StorageFailure(
                    "storage call timed out".to_string(),
                ));
            }
        };

        debug!(device = %identity, kind = %kind, "stored telemetry");
        Ok(Ack { kind, result })
    }

    async fn store(
        &self,
        identity: &DeviceIdentity,
        message: IngestMessage,
    ) -> IngestResult<AckBody> {
        match message {
            IngestMessage::ScreenTime(payload) => {
                let outcome = self.gateway.upsert_screen_time(identity, payload).await?;
                Ok(AckBody::ScreenTime {
                    stored: true,
                    created: outcome.created,
                    date: outcome.date,
                })
            }
            IngestMessage::Location(point) => {
                let outcome = self.gateway.append_location(identity, point).await?;
                Ok(AckBody::Location {
                    stored: true,
                    timestamp: outcome.timestamp,
                })
            }
            IngestMessage::SiteAccess(batch) => {
                let outcome = self.gateway.append_site_access(identity, batch.logs).await?;
                Ok(AckBody::SiteAccess {
                    stored: true,
                    count: outcome.count,
                })
            }
        }
    }
}
