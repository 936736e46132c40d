// ── Poll synchronizer ──
//
// The polling protocol: overlapping refreshes collapse, refreshes inside
// the throttle floor are absorbed, and a poll that would start right after
// a write waits out the race delay so it does not read back pre-write
// state. Failures are logged and swallowed; stale data stays in place.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backend::AllyBackend;
use crate::config::SyncTuning;
use crate::convert::{decode_device, decode_devices};
use crate::error::CoreError;
use crate::model::{Device, DeviceId};
use crate::store::DeviceStore;

/// What a call to [`Synchronizer::refresh`] ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A poll ran and updated this many devices.
    Polled { devices: usize },
    /// Another refresh was already running; this one was absorbed.
    InFlight,
    /// The previous poll started less than the throttle floor ago.
    Throttled,
    /// The poll failed; previous state was kept.
    Failed,
    /// Shutdown was requested; any result was discarded.
    Cancelled,
}

pub(crate) struct Synchronizer {
    backend: Arc<dyn AllyBackend>,
    store: Arc<DeviceStore>,
    tuning: SyncTuning,
    cancel: CancellationToken,
    /// Held for the duration of a poll; stores the start of the last one.
    gate: Mutex<Option<Instant>>,
}

impl Synchronizer {
    pub(crate) fn new(
        backend: Arc<dyn AllyBackend>,
        store: Arc<DeviceStore>,
        tuning: SyncTuning,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            backend,
            store,
            tuning,
            cancel,
            gate: Mutex::new(None),
        }
    }

    /// Throttled poll of every device. Never fails.
    pub(crate) async fn refresh(&self) -> RefreshOutcome {
        if self.cancel.is_cancelled() {
            return RefreshOutcome::Cancelled;
        }

        let Ok(mut last_start) = self.gate.try_lock() else {
            debug!("refresh already in flight");
            return RefreshOutcome::InFlight;
        };

        let now = Instant::now();
        if last_start.is_some_and(|previous| now.duration_since(previous) < self.tuning.throttle_floor)
        {
            debug!("refresh inside throttle floor");
            return RefreshOutcome::Throttled;
        }
        *last_start = Some(now);

        match self.poll_all().await {
            Ok(Some(devices)) => RefreshOutcome::Polled { devices },
            Ok(None) => RefreshOutcome::Cancelled,
            Err(e) => {
                warn!(error = %e, "device poll failed, keeping previous state");
                RefreshOutcome::Failed
            }
        }
    }

    /// Unthrottled poll used at startup, where failure must reach the
    /// caller.
    pub(crate) async fn initial_refresh(&self) -> Result<usize, CoreError> {
        let mut last_start = self.gate.lock().await;
        *last_start = Some(Instant::now());
        self.poll_all().await?.ok_or(CoreError::Disconnected)
    }

    /// Poll a single device. Not throttled, but waits for a running poll.
    pub(crate) async fn refresh_device(&self, id: &DeviceId) -> Result<Arc<Device>, CoreError> {
        let _gate = self.gate.lock().await;
        self.wait_out_recent_write().await;

        let raw = self
            .backend
            .get_device(id.as_str())
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    CoreError::DeviceNotFound {
                        identifier: id.to_string(),
                    }
                } else {
                    e.into()
                }
            })?;
        if self.cancel.is_cancelled() {
            return Err(CoreError::Disconnected);
        }

        let device = decode_device(&raw);
        let key = device.id.clone();
        self.store.apply_poll(vec![device]);
        self.store
            .device(&key)
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: id.to_string(),
            })
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// `Ok(None)` when cancelled before the result could be applied.
    async fn poll_all(&self) -> Result<Option<usize>, CoreError> {
        if !self.wait_out_recent_write().await {
            return Ok(None);
        }

        let raw = self.backend.list_devices().await?;
        if self.cancel.is_cancelled() {
            debug!("discarding poll result after shutdown");
            return Ok(None);
        }

        Ok(Some(self.store.apply_poll(decode_devices(&raw))))
    }

    /// Sleep for the race delay if a write happened less than that long
    /// ago. Returns `false` if cancelled while waiting.
    async fn wait_out_recent_write(&self) -> bool {
        let delay = self.tuning.race_delay;
        let recent = self
            .store
            .last_write()
            .is_some_and(|at| at.elapsed() < delay);
        if !recent {
            return true;
        }

        debug!(delay_ms = delay.as_millis(), "delaying poll after recent write");
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(delay) => true,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use ally_api::RawStatus;

    use super::*;
    use crate::model::SetpointKey;
    use crate::test_support::{FakeBackend, living_room, raw_device};

    fn setup() -> (Arc<FakeBackend>, Arc<DeviceStore>, Arc<Synchronizer>, CancellationToken) {
        let backend = Arc::new(FakeBackend::new(vec![living_room()]));
        let store = Arc::new(DeviceStore::new());
        let cancel = CancellationToken::new();
        let sync = Arc::new(Synchronizer::new(
            backend.clone(),
            Arc::clone(&store),
            SyncTuning::default(),
            cancel.clone(),
        ));
        (backend, store, sync, cancel)
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_populates_store() {
        let (backend, store, sync, _) = setup();

        assert_eq!(sync.refresh().await, RefreshOutcome::Polled { devices: 1 });

        assert_eq!(backend.list_count(), 1);
        let device = store.device(&DeviceId::new("d1")).unwrap();
        assert_eq!(device.temperature, Some(21.5));
        assert!(store.last_refresh().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_inside_floor_is_throttled() {
        let (backend, _, sync, _) = setup();

        assert_eq!(sync.refresh().await, RefreshOutcome::Polled { devices: 1 });
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(sync.refresh().await, RefreshOutcome::Throttled);
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(sync.refresh().await, RefreshOutcome::Polled { devices: 1 });

        assert_eq!(backend.list_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_refreshes_collapse() {
        let (backend, _, sync, _) = setup();
        backend.set_poll_delay(Duration::from_secs(3));

        let first = tokio::spawn({
            let sync = Arc::clone(&sync);
            async move { sync.refresh().await }
        });
        tokio::task::yield_now().await;

        assert_eq!(sync.refresh().await, RefreshOutcome::InFlight);
        assert_eq!(first.await.unwrap(), RefreshOutcome::Polled { devices: 1 });
        assert_eq!(backend.list_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_right_after_write_waits_race_delay() {
        let (backend, store, sync, _) = setup();

        store.record_write();
        let started = Instant::now();
        assert_eq!(sync.refresh().await, RefreshOutcome::Polled { devices: 1 });

        let polled_at = backend.poll_times()[0];
        assert_eq!(polled_at.duration_since(started), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_long_after_write_is_immediate() {
        let (backend, store, sync, _) = setup();

        store.record_write();
        tokio::time::advance(Duration::from_secs(1)).await;
        let started = Instant::now();
        sync.refresh().await;

        assert_eq!(backend.poll_times()[0], started);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_poll_keeps_previous_state() {
        let (backend, store, sync, _) = setup();
        sync.refresh().await;
        let version = store.version();

        backend.fail_polls(true);
        tokio::time::advance(Duration::from_secs(10)).await;

        assert_eq!(sync.refresh().await, RefreshOutcome::Failed);
        assert_eq!(store.version(), version);
        assert_eq!(store.device_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn devices_missing_from_poll_are_retained() {
        let (backend, store, sync, _) = setup();
        sync.refresh().await;

        backend.set_devices(vec![raw_device(
            "d2",
            vec![RawStatus::new("temp_current", 190)],
        )]);
        tokio::time::advance(Duration::from_secs(10)).await;
        sync.refresh().await;

        assert!(store.contains(&DeviceId::new("d1")));
        assert!(store.contains(&DeviceId::new("d2")));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_overwrites_optimistic_value() {
        let (_, store, sync, _) = setup();
        sync.refresh().await;
        let id = DeviceId::new("d1");

        store
            .apply_optimistic(&id, |d| d.set_setpoint(SetpointKey::AtHomeSetting, 23.0))
            .unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;
        sync.refresh().await;

        assert_eq!(store.setpoint_for_current_mode(&id), Some(20.0));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_refresh_does_nothing() {
        let (backend, _, sync, cancel) = setup();
        cancel.cancel();

        assert_eq!(sync.refresh().await, RefreshOutcome::Cancelled);
        assert_eq!(backend.list_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn result_arriving_after_shutdown_is_discarded() {
        let (backend, store, sync, cancel) = setup();
        backend.set_poll_delay(Duration::from_secs(2));

        let pending = tokio::spawn({
            let sync = Arc::clone(&sync);
            async move { sync.refresh().await }
        });
        tokio::task::yield_now().await;
        cancel.cancel();

        assert_eq!(pending.await.unwrap(), RefreshOutcome::Cancelled);
        assert_eq!(store.device_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_device_ignores_throttle() {
        let (backend, store, sync, _) = setup();
        sync.refresh().await;

        let device = sync.refresh_device(&DeviceId::new("d1")).await.unwrap();

        assert_eq!(device.id.as_str(), "d1");
        assert_eq!(backend.get_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(store.device_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_device_surfaces_errors() {
        let (_, _, sync, _) = setup();

        let err = sync
            .refresh_device(&DeviceId::new("missing"))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::DeviceNotFound { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn initial_refresh_reports_failure() {
        let (backend, _, sync, _) = setup();
        backend.fail_polls(true);

        let err = sync.initial_refresh().await.unwrap_err();

        assert!(err.is_transient());
    }
}
