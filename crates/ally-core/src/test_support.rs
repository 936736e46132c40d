// ── In-memory backend for tests ──

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use ally_api::{CommandPayload, RawDevice, RawStatus};

use crate::backend::AllyBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AuthBehavior {
    Accept,
    Reject,
    TimeOut,
}

/// Scriptable backend that records every call.
pub(crate) struct FakeBackend {
    devices: Mutex<Vec<RawDevice>>,
    auth: Mutex<AuthBehavior>,
    poll_delay: Mutex<Duration>,
    fail_polls: AtomicBool,
    fail_commands: AtomicBool,
    accept_commands: AtomicBool,
    pub auth_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
    poll_times: Mutex<Vec<Instant>>,
    sent: Mutex<Vec<(String, Vec<CommandPayload>)>>,
}

#[allow(clippy::unwrap_used)]
impl FakeBackend {
    pub(crate) fn new(devices: Vec<RawDevice>) -> Self {
        Self {
            devices: Mutex::new(devices),
            auth: Mutex::new(AuthBehavior::Accept),
            poll_delay: Mutex::new(Duration::ZERO),
            fail_polls: AtomicBool::new(false),
            fail_commands: AtomicBool::new(false),
            accept_commands: AtomicBool::new(true),
            auth_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
            poll_times: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn set_devices(&self, devices: Vec<RawDevice>) {
        *self.devices.lock().unwrap() = devices;
    }

    pub(crate) fn set_auth(&self, behavior: AuthBehavior) {
        *self.auth.lock().unwrap() = behavior;
    }

    pub(crate) fn set_poll_delay(&self, delay: Duration) {
        *self.poll_delay.lock().unwrap() = delay;
    }

    pub(crate) fn fail_polls(&self, fail: bool) {
        self.fail_polls.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_commands(&self, fail: bool) {
        self.fail_commands.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn accept_commands(&self, accept: bool) {
        self.accept_commands.store(accept, Ordering::SeqCst);
    }

    pub(crate) fn list_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn poll_times(&self) -> Vec<Instant> {
        self.poll_times.lock().unwrap().clone()
    }

    pub(crate) fn sent(&self) -> Vec<(String, Vec<CommandPayload>)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
#[allow(clippy::unwrap_used)]
impl AllyBackend for FakeBackend {
    async fn authenticate(&self) -> Result<(), ally_api::Error> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = *self.auth.lock().unwrap();
        match behavior {
            AuthBehavior::Accept => Ok(()),
            AuthBehavior::Reject => Err(ally_api::Error::Authentication {
                message: "invalid_client".into(),
            }),
            AuthBehavior::TimeOut => Err(ally_api::Error::Timeout { timeout_secs: 10 }),
        }
    }

    async fn list_devices(&self) -> Result<Vec<RawDevice>, ally_api::Error> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.poll_times.lock().unwrap().push(Instant::now());

        let delay = *self.poll_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.fail_polls.load(Ordering::SeqCst) {
            return Err(ally_api::Error::Http {
                status: 503,
                body: "unavailable".into(),
            });
        }
        Ok(self.devices.lock().unwrap().clone())
    }

    async fn get_device(&self, device_id: &str) -> Result<RawDevice, ally_api::Error> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.devices
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.id == device_id)
            .cloned()
            .ok_or(ally_api::Error::Http {
                status: 404,
                body: String::new(),
            })
    }

    async fn send_commands(
        &self,
        device_id: &str,
        commands: &[CommandPayload],
    ) -> Result<bool, ally_api::Error> {
        self.sent
            .lock()
            .unwrap()
            .push((device_id.to_owned(), commands.to_vec()));
        if self.fail_commands.load(Ordering::SeqCst) {
            return Err(ally_api::Error::Timeout { timeout_secs: 10 });
        }
        Ok(self.accept_commands.load(Ordering::SeqCst))
    }
}

/// `{id, status:[temp_current 215, at_home_setting 200, mode at_home]}`
pub(crate) fn living_room() -> RawDevice {
    RawDevice {
        id: "d1".into(),
        name: "Living room".into(),
        online: true,
        update_time: Some(1_700_000_000),
        model: Some("Danfoss Ally™ Radiator Thermostat".into()),
        status: vec![
            RawStatus::new("temp_current", 215),
            RawStatus::new("at_home_setting", 200),
            RawStatus::new("mode", "at_home"),
        ],
    }
}

pub(crate) fn raw_device(id: &str, status: Vec<RawStatus>) -> RawDevice {
    RawDevice {
        id: id.into(),
        name: id.to_uppercase(),
        online: true,
        update_time: None,
        model: Some("Danfoss Ally™ Radiator Thermostat".into()),
        status,
    }
}
