// ── Device store ──
//
// The single shared map of normalized devices. Exactly two call sites
// mutate it: poll completion (`apply_poll`) and command optimism
// (`apply_optimistic`). Reads are lock-free snapshots.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use super::collection::EntityCollection;
use crate::error::CoreError;
use crate::model::{Device, DeviceId, current_setpoint};
use crate::stream::DeviceStream;

/// Current view of every device the account has reported.
///
/// Devices missing from a later poll are kept; nothing is ever removed.
pub struct DeviceStore {
    devices: EntityCollection<DeviceId, Device>,
    last_write: ArcSwapOption<Instant>,
    last_refresh: watch::Sender<Option<DateTime<Utc>>>,
}

impl DeviceStore {
    pub fn new() -> Self {
        let (last_refresh, _) = watch::channel(None);
        Self {
            devices: EntityCollection::new(),
            last_write: ArcSwapOption::empty(),
            last_refresh,
        }
    }

    // ── Mutation ─────────────────────────────────────────────────────

    /// Replace every polled device and emit one notification.
    pub(crate) fn apply_poll(&self, devices: Vec<Device>) -> usize {
        let count = devices.len();
        let added = self
            .devices
            .upsert_many(devices.into_iter().map(|d| (d.id.clone(), d)));
        self.last_refresh.send_replace(Some(Utc::now()));
        debug!(count, added, total = self.devices.len(), "applied poll");
        count
    }

    /// Modify a local copy ahead of the cloud and record the write time.
    pub(crate) fn apply_optimistic(
        &self,
        id: &DeviceId,
        f: impl FnOnce(&mut Device),
    ) -> Result<Arc<Device>, CoreError> {
        let updated = self
            .devices
            .modify(id, f)
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: id.to_string(),
            })?;
        self.record_write();
        Ok(updated)
    }

    pub(crate) fn record_write(&self) {
        self.last_write.store(Some(Arc::new(Instant::now())));
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn device(&self, id: &DeviceId) -> Option<Arc<Device>> {
        self.devices.get(id)
    }

    pub fn contains(&self, id: &DeviceId) -> bool {
        self.devices.contains(id)
    }

    /// All devices, ordered by id.
    pub fn snapshot(&self) -> Arc<Vec<Arc<Device>>> {
        self.devices.snapshot()
    }

    pub fn subscribe(&self) -> DeviceStream {
        DeviceStream::new(self.devices.subscribe())
    }

    /// Bumped once per applied poll or optimistic write.
    pub fn version(&self) -> u64 {
        self.devices.version()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Wall-clock time of the last successful poll.
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_refresh.borrow()
    }

    pub fn last_write(&self) -> Option<Instant> {
        self.last_write.load_full().map(|at| *at)
    }

    /// Setpoint the device is following, honoring banner control and the
    /// legacy `temp_set` fallback.
    pub fn setpoint_for_current_mode(&self, id: &DeviceId) -> Option<f64> {
        current_setpoint(&*self.device(id)?)
    }
}

impl Default for DeviceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn device(id: &str, temperature: f64) -> Device {
        let mut device = Device::new(id, id.to_uppercase());
        device.temperature = Some(temperature);
        device
    }

    #[test]
    fn poll_keeps_devices_missing_from_later_polls() {
        let store = DeviceStore::new();
        store.apply_poll(vec![device("a", 20.0), device("b", 21.0)]);
        store.apply_poll(vec![device("a", 22.0)]);

        assert_eq!(store.device_count(), 2);
        assert_eq!(store.device(&"a".into()).unwrap().temperature, Some(22.0));
        assert_eq!(store.device(&"b".into()).unwrap().temperature, Some(21.0));
        assert_eq!(store.version(), 2);
        assert!(store.last_refresh().is_some());
    }

    #[test]
    fn optimistic_write_records_timestamp() {
        let store = DeviceStore::new();
        store.apply_poll(vec![device("a", 20.0)]);
        assert!(store.last_write().is_none());

        let updated = store
            .apply_optimistic(&"a".into(), |d| d.mode = Some("manual".into()))
            .unwrap();
        assert_eq!(updated.mode.as_deref(), Some("manual"));
        assert!(store.last_write().is_some());
    }

    #[test]
    fn optimistic_write_on_unknown_device_fails() {
        let store = DeviceStore::new();
        let err = store
            .apply_optimistic(&"ghost".into(), |d| d.online = true)
            .unwrap_err();
        assert!(matches!(err, CoreError::DeviceNotFound { .. }));
        assert!(store.last_write().is_none());
    }

    #[test]
    fn setpoint_for_current_mode_resolves() {
        let store = DeviceStore::new();
        let mut d = Device::new("d1", "Hall");
        d.mode = Some("at_home".into());
        d.setpoints.at_home_setting = Some(20.0);
        store.apply_poll(vec![d]);

        assert_eq!(store.setpoint_for_current_mode(&"d1".into()), Some(20.0));
        assert_eq!(store.setpoint_for_current_mode(&"nope".into()), None);
    }
}
