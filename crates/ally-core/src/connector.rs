// ── Connector ──
//
// Full lifecycle for one Ally account: authentication, the initial poll,
// the periodic poll task, command routing, and cancellation on shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ally_api::{AllyClient, CommandPayload};

use crate::backend::AllyBackend;
use crate::command::{Command, CommandDispatcher, CommandEnvelope, CommandResult};
use crate::config::{ConnectorConfig, SyncTuning};
use crate::error::CoreError;
use crate::model::{AuxSwitch, Device, DeviceId, HeatingControlScaling, OperatingMode, SetpointKey};
use crate::store::DeviceStore;
use crate::stream::{DeviceSnapshot, DeviceStream};
use crate::sync::{RefreshOutcome, Synchronizer};

const COMMAND_CHANNEL_SIZE: usize = 32;

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

// ── Connector ────────────────────────────────────────────────────

/// The entry point for hosts.
///
/// Cheaply cloneable via `Arc<ConnectorInner>`. Reads go straight to the
/// [`DeviceStore`]; writes go through [`execute`](Self::execute) and the
/// command processor task.
#[derive(Clone)]
pub struct Connector {
    inner: Arc<ConnectorInner>,
}

struct ConnectorInner {
    tuning: SyncTuning,
    backend: Arc<dyn AllyBackend>,
    store: Arc<DeviceStore>,
    sync: Arc<Synchronizer>,
    dispatcher: Arc<CommandDispatcher>,
    connection_state: watch::Sender<ConnectionState>,
    command_tx: mpsc::Sender<CommandEnvelope>,
    command_rx: Mutex<Option<mpsc::Receiver<CommandEnvelope>>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Connector {
    /// Build a connector talking to the real cloud. Does NOT connect;
    /// call [`connect()`](Self::connect).
    pub fn new(config: &ConnectorConfig) -> Result<Self, CoreError> {
        let client = AllyClient::new(config.credentials.clone(), &config.transport())?
            .with_refresh_margin(config.tuning.token_refresh_margin);
        Ok(Self::with_backend(Arc::new(client), config.tuning))
    }

    /// Build a connector around any backend.
    pub fn with_backend(backend: Arc<dyn AllyBackend>, tuning: SyncTuning) -> Self {
        let store = Arc::new(DeviceStore::new());
        let cancel = CancellationToken::new();
        let sync = Arc::new(Synchronizer::new(
            Arc::clone(&backend),
            Arc::clone(&store),
            tuning,
            cancel.clone(),
        ));
        let dispatcher = Arc::new(CommandDispatcher::new(
            Arc::clone(&backend),
            Arc::clone(&store),
        ));
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);

        Self {
            inner: Arc::new(ConnectorInner {
                tuning,
                backend,
                store,
                sync,
                dispatcher,
                connection_state,
                command_tx,
                command_rx: Mutex::new(Some(command_rx)),
                cancel,
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn store(&self) -> &Arc<DeviceStore> {
        &self.inner.store
    }

    /// Direct access to the dispatcher, bypassing the command channel.
    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.inner.dispatcher
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Authenticate, run the initial poll, then spawn the poll task and
    /// the command processor.
    ///
    /// Failures are returned unchanged; use
    /// [`CoreError::setup_disposition`] to decide between retrying and
    /// giving up.
    pub async fn connect(&self) -> Result<(), CoreError> {
        self.inner
            .connection_state
            .send_replace(ConnectionState::Connecting);

        if let Err(e) = self.setup().await {
            warn!(error = %e, disposition = ?e.setup_disposition(), "setup failed");
            self.inner.connection_state.send_replace(ConnectionState::Failed);
            return Err(e);
        }

        let mut handles = self.inner.task_handles.lock().await;

        if let Some(rx) = self.inner.command_rx.lock().await.take() {
            handles.push(tokio::spawn(command_processor_task(
                Arc::clone(&self.inner.dispatcher),
                rx,
                self.inner.cancel.clone(),
            )));
        }

        let period = self.inner.tuning.poll_interval;
        if !period.is_zero() {
            handles.push(tokio::spawn(poll_task(
                Arc::clone(&self.inner.sync),
                period,
                self.inner.cancel.clone(),
            )));
        }

        self.inner
            .connection_state
            .send_replace(ConnectionState::Connected);
        info!(devices = self.inner.store.device_count(), "connected to Ally cloud");
        Ok(())
    }

    async fn setup(&self) -> Result<(), CoreError> {
        self.inner.backend.authenticate().await?;
        debug!("access token acquired");
        let devices = self.inner.sync.initial_refresh().await?;
        debug!(devices, "initial poll complete");
        Ok(())
    }

    /// Cancel the background tasks and wait for them to finish.
    ///
    /// A poll already in flight completes but its result is discarded.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }

        self.inner
            .connection_state
            .send_replace(ConnectionState::Disconnected);
        debug!("connector shut down");
    }

    /// Connect, run `f`, shut down. The periodic poll is not started.
    pub async fn oneshot<F, Fut, T>(config: &ConnectorConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Connector) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut config = config.clone();
        config.tuning.poll_interval = Duration::ZERO;

        let connector = Connector::new(&config)?;
        connector.connect().await?;
        let result = f(connector.clone()).await;
        connector.shutdown().await;
        result
    }

    // ── Polling ──────────────────────────────────────────────────

    /// Request a poll. Subject to the in-flight and throttle rules.
    pub async fn refresh(&self) -> RefreshOutcome {
        self.inner.sync.refresh().await
    }

    /// Poll one device now.
    pub async fn refresh_device(&self, id: &DeviceId) -> Result<Arc<Device>, CoreError> {
        self.inner.sync.refresh_device(id).await
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Route a command through the command processor and await the result.
    pub async fn execute(&self, command: Command) -> Result<CommandResult, CoreError> {
        if *self.inner.connection_state.borrow() != ConnectionState::Connected {
            return Err(CoreError::Disconnected);
        }

        let (tx, rx) = oneshot::channel();
        self.inner
            .command_tx
            .send(CommandEnvelope {
                command,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::Disconnected)?;

        rx.await.map_err(|_| CoreError::Disconnected)?
    }

    pub async fn set_temperature(
        &self,
        device_id: DeviceId,
        celsius: f64,
        setpoint: Option<SetpointKey>,
    ) -> Result<CommandResult, CoreError> {
        self.execute(Command::SetTemperature {
            device_id,
            celsius,
            setpoint,
        })
        .await
    }

    pub async fn set_mode(
        &self,
        device_id: DeviceId,
        mode: OperatingMode,
    ) -> Result<CommandResult, CoreError> {
        self.execute(Command::SetMode { device_id, mode }).await
    }

    pub async fn send_raw_commands(
        &self,
        device_id: DeviceId,
        commands: Vec<CommandPayload>,
    ) -> Result<CommandResult, CoreError> {
        self.execute(Command::SendRaw {
            device_id,
            commands,
        })
        .await
    }

    pub async fn set_switch(
        &self,
        device_id: DeviceId,
        switch: AuxSwitch,
        on: bool,
    ) -> Result<CommandResult, CoreError> {
        self.execute(Command::SetSwitch {
            device_id,
            switch,
            on,
        })
        .await
    }

    pub async fn set_heating_control_scaling(
        &self,
        device_id: DeviceId,
        option: HeatingControlScaling,
    ) -> Result<CommandResult, CoreError> {
        self.execute(Command::SetHeatingControlScaling { device_id, option })
            .await
    }

    // ── State observation ────────────────────────────────────────

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    pub fn devices(&self) -> DeviceStream {
        self.inner.store.subscribe()
    }

    pub fn devices_snapshot(&self) -> DeviceSnapshot {
        self.inner.store.snapshot()
    }

    pub fn device(&self, id: &DeviceId) -> Option<Arc<Device>> {
        self.inner.store.device(id)
    }

    pub fn setpoint_for_current_mode(&self, id: &DeviceId) -> Option<f64> {
        self.inner.store.setpoint_for_current_mode(id)
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Tick every `period` and fire a refresh on its own task, so a slow poll
/// never delays the schedule. Overlaps are absorbed by the synchronizer.
async fn poll_task(sync: Arc<Synchronizer>, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // the initial poll already ran

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let sync = Arc::clone(&sync);
                tokio::spawn(async move {
                    let outcome = sync.refresh().await;
                    debug!(?outcome, "scheduled refresh");
                });
            }
        }
    }
}

/// Process commands from the mpsc channel one at a time.
async fn command_processor_task(
    dispatcher: Arc<CommandDispatcher>,
    mut rx: mpsc::Receiver<CommandEnvelope>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let result = dispatcher.dispatch(envelope.command).await;
                let _ = envelope.response_tx.send(result);
            }
        }
    }
}
