//! Storage gateway (consumed interface) and the in-memory reference store.
//!
//! The gateway is the persistence boundary of the core: screen time is
//! an upsert keyed by (device, date), location and site access are
//! append-only. Implementations own their atomicity — the coordinator's
//! per-key lock is cooperative, not a substitute — and prune records
//! older than the retention horizon as a side effect of each write.

use crate::error::{IngestError, IngestResult};
use crate::protocol::{LocationPayload, ScreenTimePayload, SiteAccessEntry};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use guardian_types::DeviceIdentity;

/// Outcome of a screen-time upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenTimeStored {
    /// True when a new (device, date) record was created, false when an
    /// existing one was updated.
    pub created: bool,
    /// The stored calendar day.
    pub date: NaiveDate,
}

/// Outcome of a location append.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationStored {
    /// The stored fix timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Outcome of a site-access bulk append.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteAccessStored {
    /// Number of entries appended (zero for an empty batch).
    pub count: usize,
}

/// Persistence boundary for telemetry writes.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Creates or updates the screen-time record for (device, date).
    /// Idempotent by key: repeating the same write updates rather than
    /// duplicates.
    async fn upsert_screen_time(
        &self,
        identity: &DeviceIdentity,
        payload: ScreenTimePayload,
    ) -> IngestResult<ScreenTimeStored>;

    /// Appends one location point.
    async fn append_location(
        &self,
        identity: &DeviceIdentity,
        point: LocationPayload,
    ) -> IngestResult<LocationStored>;

    /// Appends a batch of site-access events.
    async fn append_site_access(
        &self,
        identity: &DeviceIdentity,
        entries: Vec<SiteAccessEntry>,
    ) -> IngestResult<SiteAccessStored>;
}

pub mod memory {
    //! In-memory store used by tests and the reference server binary.

    use super::*;
    use crate::identity::IdentityResolver;
    use chrono::Duration;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    /// Retention horizon of the reference system.
    pub const DEFAULT_RETENTION_DAYS: i64 = 365;

    /// An in-memory device registry and telemetry store.
    ///
    /// Implements both consumed interfaces of the core, with the same
    /// semantics the real backend provides: upsert-by-(device, date)
    /// for screen time, appends for the rest, and retention pruning on
    /// every write.
    pub struct MemoryStore {
        devices: Mutex<HashSet<DeviceIdentity>>,
        screen_time: Mutex<HashMap<(DeviceIdentity, NaiveDate), ScreenTimePayload>>,
        locations: Mutex<Vec<(DeviceIdentity, LocationPayload)>>,
        site_access: Mutex<Vec<(DeviceIdentity, SiteAccessEntry)>>,
        retention_days: i64,
    }

    impl MemoryStore {
        /// Creates an empty store with the default retention horizon.
        #[must_use]
        pub fn new() -> Self {
            Self::with_retention_days(DEFAULT_RETENTION_DAYS)
        }

        /// Creates an empty store with a custom retention horizon.
        #[must_use]
        pub fn with_retention_days(retention_days: i64) -> Self {
            Self {
                devices: Mutex::new(HashSet::new()),
                screen_time: Mutex::new(HashMap::new()),
                locations: Mutex::new(Vec::new()),
                site_access: Mutex::new(Vec::new()),
                retention_days,
            }
        }

        /// Registers a device credential as known.
        pub fn register_device(&self, identity: DeviceIdentity) {
            self.devices.lock().expect("devices poisoned").insert(identity);
        }

        /// Removes a device. Subsequent resolutions and writes for it
        /// fail with `UnknownIdentity`.
        pub fn remove_device(&self, identity: &DeviceIdentity) {
            self.devices.lock().expect("devices poisoned").remove(identity);
        }

        /// The stored screen-time payload for (device, date), if any.
        #[must_use]
        pub fn screen_time_for(
            &self,
            identity: &DeviceIdentity,
            date: NaiveDate,
        ) -> Option<ScreenTimePayload> {
            self.screen_time
                .lock()
                .expect("screen_time poisoned")
                .get(&(identity.clone(), date))
                .cloned()
        }

        /// Number of stored location points for a device.
        #[must_use]
        pub fn location_count(&self, identity: &DeviceIdentity) -> usize {
            self.locations
                .lock()
                .expect("locations poisoned")
                .iter()
                .filter(|(id, _)| id == identity)
                .count()
        }

        /// Number of stored site-access entries for a device.
        #[must_use]
        pub fn site_access_count(&self, identity: &DeviceIdentity) -> usize {
            self.site_access
                .lock()
                .expect("site_access poisoned")
                .iter()
                .filter(|(id, _)| id == identity)
                .count()
        }

        fn ensure_known(&self, identity: &DeviceIdentity) -> IngestResult<()> {
            if self.devices.lock().expect("devices poisoned").contains(identity) {
                Ok(())
            } else {
                Err(IngestError::UnknownIdentity)
            }
        }

        /// Drops records older than the retention horizon.
        fn prune(&self) {
            let date_cutoff = Utc::now().date_naive() - Duration::days(self.retention_days);
            let time_cutoff = Utc::now() - Duration::days(self.retention_days);

            self.screen_time
                .lock()
                .expect("screen_time poisoned")
                .retain(|(_, date), _| *date >= date_cutoff);
            self.locations
                .lock()
                .expect("locations poisoned")
                .retain(|(_, point)| point.timestamp >= time_cutoff);
            self.site_access
                .lock()
                .expect("site_access poisoned")
                .retain(|(_, entry)| entry.timestamp >= time_cutoff);
        }
    }

    impl Default for MemoryStore {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl IdentityResolver for MemoryStore {
        async fn resolve(&self, credential: &str) -> IngestResult<DeviceIdentity> {
            let identity = DeviceIdentity::new(credential);
            self.ensure_known(&identity)?;
            Ok(identity)
        }
    }

    #[async_trait]
    impl StorageGateway for MemoryStore {
        async fn upsert_screen_time(
            &self,
            identity: &DeviceIdentity,
            payload: ScreenTimePayload,
        ) -> IngestResult<ScreenTimeStored> {
            self.ensure_known(identity)?;
            let date = payload.date;
            let created = self
                .screen_time
                .lock()
                .expect("screen_time poisoned")
                .insert((identity.clone(), date), payload)
                .is_none();
            self.prune();
            Ok(ScreenTimeStored { created, date })
        }

        async fn append_location(
            &self,
            identity: &DeviceIdentity,
            point: LocationPayload,
        ) -> IngestResult<LocationStored> {
            self.ensure_known(identity)?;
            let timestamp = point.timestamp;
            self.locations
                .lock()
                .expect("locations poisoned")
                .push((identity.clone(), point));
            self.prune();
            Ok(LocationStored { timestamp })
        }

        async fn append_site_access(
            &self,
            identity: &DeviceIdentity,
            entries: Vec<SiteAccessEntry>,
        ) -> IngestResult<SiteAccessStored> {
            self.ensure_known(identity)?;
            let count = entries.len();
            let mut log = self.site_access.lock().expect("site_access poisoned");
            for entry in entries {
                log.push((identity.clone(), entry));
            }
            drop(log);
            self.prune();
            Ok(SiteAccessStored { count })
        }
    }
}
