// ── Lifecycle controller ──
//
// Drives the managed bridge from the retained toggle signal. The
// controller itself is a plain state machine with `&mut self` operations;
// `ControllerHandle::spawn` moves it into a single task so toggle
// deliveries and monitor teardown requests are applied one at a time.
// Nothing outside that task ever sees the resource slot.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ControllerSettings;
use crate::error::CoreError;
use crate::host::{DeviceRegistry, ManagedResource, ResourceFactory, Teardown};
use crate::signal::{Payload, Readiness, SignalSource, decode_toggle};
use crate::store::{BridgeConfig, ConfigStore};

const CONTROL_CHANNEL_SIZE: usize = 16;

// ── ControllerState ──────────────────────────────────────────────

/// Zero or one live bridge.
pub enum ControllerState {
    Stopped,
    Running(Box<dyn ManagedResource>),
}

impl fmt::Debug for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => f.write_str("Stopped"),
            Self::Running(resource) => write!(f, "Running({})", resource.describe()),
        }
    }
}

/// What a single toggle delivery did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum SignalOutcome {
    Started,
    /// Start was attempted and failed; the controller is still stopped.
    StartFailed,
    Stopped,
    AlreadyRunning,
    AlreadyStopped,
    /// Ignored: automated cleanup retired the controller.
    Retired,
}

// ── LifecycleController ──────────────────────────────────────────

/// Start/stop state machine over the managed bridge.
pub struct LifecycleController {
    settings: ControllerSettings,
    store: ConfigStore,
    factory: Arc<dyn ResourceFactory>,
    registry: Arc<dyn DeviceRegistry>,
    /// Last-known-good configuration.
    config: BridgeConfig,
    state: ControllerState,
    retired: bool,
}

impl LifecycleController {
    pub fn new(
        settings: ControllerSettings,
        store: ConfigStore,
        factory: Arc<dyn ResourceFactory>,
        registry: Arc<dyn DeviceRegistry>,
        initial: BridgeConfig,
    ) -> Self {
        Self {
            settings,
            store,
            factory,
            registry,
            config: initial,
            state: ControllerState::Stopped,
            retired: false,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, ControllerState::Running(_))
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }

    /// The configuration the next start falls back to.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Apply one toggle delivery.
    ///
    /// Compares the requested state with the current one before acting, so
    /// replays of the retained value are no-ops.
    pub async fn on_signal(&mut self, payload: &Payload) -> SignalOutcome {
        if self.retired {
            debug!(topic = %self.settings.topic, "controller retired, ignoring signal");
            return SignalOutcome::Retired;
        }
        let enabled = decode_toggle(payload);

        match (enabled, self.is_running()) {
            (true, false) => {
                info!(topic = %self.settings.topic, "bridge enabled via signal, starting");
                match self.start().await {
                    Ok(()) => SignalOutcome::Started,
                    Err(e) => {
                        error!(
                            kind = e.kind(),
                            disposition = %e.disposition(),
                            error = %e,
                            "cannot start bridge"
                        );
                        SignalOutcome::StartFailed
                    }
                }
            }
            (false, true) => {
                info!(topic = %self.settings.topic, "bridge disabled via signal, stopping");
                self.stop().await;
                SignalOutcome::Stopped
            }
            (true, true) => {
                debug!("bridge enabled, already running");
                SignalOutcome::AlreadyRunning
            }
            (false, false) => {
                info!("bridge disabled, not running");
                SignalOutcome::AlreadyStopped
            }
        }
    }

    /// Start the bridge with freshly read configuration.
    ///
    /// Falls back to the last-known-good configuration when the file is
    /// missing or unreadable. A failed start leaves the controller stopped
    /// and is not retried here; the next `true` delivery tries again.
    pub async fn start(&mut self) -> Result<(), CoreError> {
        if self.retired {
            return Err(CoreError::Retired);
        }
        if self.is_running() {
            debug!("start requested while running, ignoring");
            return Ok(());
        }

        match self.store.load().await {
            Some(fresh) if !fresh.is_empty() => self.config = fresh,
            _ => debug!("using last-known configuration"),
        }

        if self.config.is_empty() {
            return Err(CoreError::ConfigUnavailable {
                path: self.store.path().to_path_buf(),
            });
        }

        let mut resource = self.factory.create(&self.config);
        resource.start().await?;

        info!(
            resource = %resource.describe(),
            slug = self.config.addon_slug().unwrap_or("-"),
            "bridge started"
        );
        self.state = ControllerState::Running(resource);
        Ok(())
    }

    /// Stop the bridge if running, then purge this domain's devices.
    ///
    /// Stop failures are logged and the slot is cleared regardless. The
    /// registry purge runs even when nothing was running.
    pub async fn stop(&mut self) {
        self.stop_resource().await;
        self.purge_registry().await;
    }

    /// Stop and purge like [`stop`](Self::stop), then refuse every later
    /// start. The cached configuration is dropped so nothing can bring the
    /// bridge back after its marker file is gone.
    pub async fn retire(&mut self) {
        if self.retired {
            return;
        }
        self.retired = true;
        self.config = BridgeConfig::default();
        self.stop().await;
        info!("controller retired, further signals are ignored");
    }

    /// Stop the bridge without touching the registry (unload path).
    pub async fn shutdown(&mut self) {
        self.stop_resource().await;
    }

    async fn stop_resource(&mut self) {
        let ControllerState::Running(mut resource) =
            std::mem::replace(&mut self.state, ControllerState::Stopped)
        else {
            return;
        };

        match resource.stop().await {
            Ok(()) => info!(resource = %resource.describe(), "bridge stopped"),
            Err(e) => warn!(
                kind = e.kind(),
                error = %e,
                "bridge did not stop cleanly (state cleared anyway)"
            ),
        }
    }

    /// Remove every registry device in this integration's namespace.
    ///
    /// Best effort: a partially cleaned registry is picked up again by the
    /// next stop. Returns the number of devices removed.
    pub async fn purge_registry(&self) -> usize {
        let domain = self.settings.domain.as_str();
        let devices = match self.registry.devices().await {
            Ok(devices) => devices,
            Err(e) => {
                error!(kind = "RegistryCleanupFailure", error = %e, "failed to list registry devices");
                return 0;
            }
        };

        let owned: Vec<_> = devices.into_iter().filter(|d| d.belongs_to(domain)).collect();
        if owned.is_empty() {
            return 0;
        }

        info!(count = owned.len(), domain, "removing devices from registry");
        let mut removed = 0;
        for device in owned {
            match self.registry.remove_device(&device.id).await {
                Ok(()) => removed += 1,
                Err(e) => error!(
                    kind = "RegistryCleanupFailure",
                    device_id = %device.id,
                    error = %e,
                    "failed to remove device"
                ),
            }
        }
        removed
    }
}

// ── Serial actor ─────────────────────────────────────────────────

enum ControlCommand {
    Signal(Payload),
    Start,
    Stop,
    Retire,
    IsRunning,
}

enum ControlReply {
    Signal(SignalOutcome),
    Start(Result<(), CoreError>),
    Stopped,
    IsRunning(bool),
}

struct ControlEnvelope {
    command: ControlCommand,
    response_tx: oneshot::Sender<ControlReply>,
}

/// Cheaply cloneable handle to a controller running in its own task.
///
/// Every operation is a request/reply round-trip, so callers observe the
/// controller strictly after their request has been applied.
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<ControlEnvelope>,
    subscribed: Arc<AtomicBool>,
}

impl ControllerHandle {
    /// Move `controller` into a task. Cancelling `cancel` stops a running
    /// bridge (without registry purge) and ends the task.
    pub fn spawn(
        controller: LifecycleController,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(CONTROL_CHANNEL_SIZE);
        let task = tokio::spawn(control_task(controller, rx, cancel));
        let handle = Self {
            tx,
            subscribed: Arc::new(AtomicBool::new(false)),
        };
        (handle, task)
    }

    pub async fn signal(&self, payload: Payload) -> Result<SignalOutcome, CoreError> {
        match self.request(ControlCommand::Signal(payload)).await? {
            ControlReply::Signal(outcome) => Ok(outcome),
            _ => Err(unexpected_reply()),
        }
    }

    pub async fn start(&self) -> Result<(), CoreError> {
        match self.request(ControlCommand::Start).await? {
            ControlReply::Start(result) => result,
            _ => Err(unexpected_reply()),
        }
    }

    pub async fn stop(&self) -> Result<(), CoreError> {
        match self.request(ControlCommand::Stop).await? {
            ControlReply::Stopped => Ok(()),
            _ => Err(unexpected_reply()),
        }
    }

    pub async fn retire(&self) -> Result<(), CoreError> {
        match self.request(ControlCommand::Retire).await? {
            ControlReply::Stopped => Ok(()),
            _ => Err(unexpected_reply()),
        }
    }

    pub async fn is_running(&self) -> Result<bool, CoreError> {
        match self.request(ControlCommand::IsRunning).await? {
            ControlReply::IsRunning(running) => Ok(running),
            _ => Err(unexpected_reply()),
        }
    }

    async fn request(&self, command: ControlCommand) -> Result<ControlReply, CoreError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(ControlEnvelope {
                command,
                response_tx,
            })
            .await
            .map_err(|_| CoreError::ControllerUnavailable)?;
        response_rx
            .await
            .map_err(|_| CoreError::ControllerUnavailable)
    }
}

#[async_trait]
impl Teardown for ControllerHandle {
    async fn teardown(&self) {
        if let Err(e) = self.retire().await {
            warn!(kind = e.kind(), error = %e, "teardown request not delivered");
        }
    }
}

fn unexpected_reply() -> CoreError {
    CoreError::Internal("controller replied to a different request".into())
}

async fn control_task(
    mut controller: LifecycleController,
    mut rx: mpsc::Receiver<ControlEnvelope>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let reply = match envelope.command {
                    ControlCommand::Signal(payload) => {
                        ControlReply::Signal(controller.on_signal(&payload).await)
                    }
                    ControlCommand::Start => ControlReply::Start(controller.start().await),
                    ControlCommand::Stop => {
                        controller.stop().await;
                        ControlReply::Stopped
                    }
                    ControlCommand::Retire => {
                        controller.retire().await;
                        ControlReply::Stopped
                    }
                    ControlCommand::IsRunning => ControlReply::IsRunning(controller.is_running()),
                };
                let _ = envelope.response_tx.send(reply);
            }
        }
    }

    controller.shutdown().await;
    debug!("controller task finished");
}

// ── Subscription activation ──────────────────────────────────────

/// Subscribe the controller to the toggle topic once the host is ready.
///
/// Only the first call per handle subscribes; later calls (a re-fired
/// readiness event, a second activation) return immediately. Deliveries are
/// forwarded in arrival order and each is applied before the next is read.
pub async fn activate(
    handle: ControllerHandle,
    source: Arc<dyn SignalSource>,
    readiness: Readiness,
    settings: ControllerSettings,
    cancel: CancellationToken,
) -> Result<(), CoreError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(()),
        () = readiness.wait() => {}
    }

    if handle.subscribed.swap(true, Ordering::SeqCst) {
        debug!(topic = %settings.topic, "already subscribed, ignoring activation");
        return Ok(());
    }

    info!(topic = %settings.topic, qos = settings.qos, "host ready, subscribing to bridge toggle");
    let mut rx = match source.subscribe(&settings.topic, settings.qos).await {
        Ok(rx) => rx,
        Err(e) => {
            handle.subscribed.store(false, Ordering::SeqCst);
            return Err(e);
        }
    };

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            payload = rx.recv() => {
                let Some(payload) = payload else {
                    warn!(topic = %settings.topic, "signal transport closed");
                    break;
                };
                match handle.signal(payload).await {
                    Ok(outcome) => debug!(%outcome, "toggle applied"),
                    Err(e) => {
                        warn!(kind = e.kind(), error = %e, "controller unavailable, dropping subscription");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::host::RegisteredDevice;
    use crate::signal::ChannelSignalSource;

    // ── Fakes ───────────────────────────────────────────────────────

    #[derive(Default)]
    struct Counters {
        created: usize,
        starts: usize,
        stops: usize,
        live: isize,
        max_live: isize,
        last_slug: Option<String>,
    }

    struct FakeFactory {
        counters: Arc<StdMutex<Counters>>,
        fail_start: bool,
        fail_stop: bool,
    }

    impl FakeFactory {
        fn new() -> (Arc<Self>, Arc<StdMutex<Counters>>) {
            Self::with_failures(false, false)
        }

        fn with_failures(fail_start: bool, fail_stop: bool) -> (Arc<Self>, Arc<StdMutex<Counters>>) {
            let counters = Arc::new(StdMutex::new(Counters::default()));
            let factory = Arc::new(Self {
                counters: Arc::clone(&counters),
                fail_start,
                fail_stop,
            });
            (factory, counters)
        }
    }

    impl ResourceFactory for FakeFactory {
        fn create(&self, config: &BridgeConfig) -> Box<dyn ManagedResource> {
            let mut c = self.counters.lock().expect("lock");
            c.created += 1;
            c.last_slug = config.addon_slug().map(str::to_owned);
            Box::new(FakeResource {
                counters: Arc::clone(&self.counters),
                fail_start: self.fail_start,
                fail_stop: self.fail_stop,
            })
        }
    }

    struct FakeResource {
        counters: Arc<StdMutex<Counters>>,
        fail_start: bool,
        fail_stop: bool,
    }

    #[async_trait]
    impl ManagedResource for FakeResource {
        async fn start(&mut self) -> Result<(), CoreError> {
            let mut c = self.counters.lock().expect("lock");
            c.starts += 1;
            if self.fail_start {
                return Err(CoreError::ResourceStart {
                    message: "adapter busy".into(),
                });
            }
            c.live += 1;
            c.max_live = c.max_live.max(c.live);
            Ok(())
        }

        async fn stop(&mut self) -> Result<(), CoreError> {
            let mut c = self.counters.lock().expect("lock");
            c.stops += 1;
            c.live -= 1;
            if self.fail_stop {
                return Err(CoreError::ResourceStop {
                    message: "already dead".into(),
                });
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeRegistry {
        devices: StdMutex<Vec<RegisteredDevice>>,
        fail_list: bool,
    }

    impl FakeRegistry {
        fn with_devices(domains: &[&str]) -> Arc<Self> {
            let devices = domains
                .iter()
                .enumerate()
                .map(|(i, domain)| RegisteredDevice {
                    id: format!("dev{i}"),
                    name: None,
                    identifiers: vec![((*domain).to_owned(), format!("mac{i}"))],
                })
                .collect();
            Arc::new(Self {
                devices: StdMutex::new(devices),
                fail_list: false,
            })
        }

        fn remaining(&self) -> Vec<String> {
            self.devices
                .lock()
                .expect("lock")
                .iter()
                .map(|d| d.id.clone())
                .collect()
        }
    }

    #[async_trait]
    impl DeviceRegistry for FakeRegistry {
        async fn devices(&self) -> Result<Vec<RegisteredDevice>, CoreError> {
            if self.fail_list {
                return Err(CoreError::RegistryCleanup {
                    message: "storage locked".into(),
                });
            }
            Ok(self.devices.lock().expect("lock").clone())
        }

        async fn remove_device(&self, id: &str) -> Result<(), CoreError> {
            self.devices.lock().expect("lock").retain(|d| d.id != id);
            Ok(())
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

    struct Fixture {
        _dir: tempfile::TempDir,
        path: PathBuf,
    }

    fn fixture(contents: Option<&str>) -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ble_config.json");
        if let Some(contents) = contents {
            std::fs::write(&path, contents).expect("write");
        }
        Fixture { _dir: dir, path }
    }

    fn controller(
        fx: &Fixture,
        factory: Arc<dyn ResourceFactory>,
        registry: Arc<dyn DeviceRegistry>,
        initial: BridgeConfig,
    ) -> LifecycleController {
        LifecycleController::new(
            ControllerSettings::default(),
            ConfigStore::new(&fx.path),
            factory,
            registry,
            initial,
        )
    }

    const CONFIG: &str = r#"{"microair_enabled": true, "addon_slug": "abc_librecoach"}"#;

    // ── State machine ───────────────────────────────────────────────

    #[tokio::test]
    async fn duplicate_true_starts_exactly_once() {
        let fx = fixture(Some(CONFIG));
        let (factory, counters) = FakeFactory::new();
        let mut ctrl = controller(&fx, factory, FakeRegistry::with_devices(&[]), BridgeConfig::default());

        assert_eq!(ctrl.on_signal(&Payload::from("true")).await, SignalOutcome::Started);
        assert_eq!(ctrl.on_signal(&Payload::from("true")).await, SignalOutcome::AlreadyRunning);
        assert_eq!(ctrl.on_signal(&Payload::from(" true ")).await, SignalOutcome::AlreadyRunning);

        let c = counters.lock().expect("lock");
        assert_eq!(c.created, 1);
        assert_eq!(c.starts, 1);
        assert_eq!(c.last_slug.as_deref(), Some("abc_librecoach"));
    }

    #[tokio::test]
    async fn duplicate_false_stops_exactly_once() {
        let fx = fixture(Some(CONFIG));
        let (factory, counters) = FakeFactory::new();
        let mut ctrl = controller(&fx, factory, FakeRegistry::with_devices(&[]), BridgeConfig::default());

        assert_eq!(ctrl.on_signal(&Payload::from("false")).await, SignalOutcome::AlreadyStopped);
        ctrl.on_signal(&Payload::from("true")).await;
        assert_eq!(ctrl.on_signal(&Payload::from("false")).await, SignalOutcome::Stopped);
        assert_eq!(ctrl.on_signal(&Payload::from("false")).await, SignalOutcome::AlreadyStopped);
        assert_eq!(ctrl.on_signal(&Payload::Missing).await, SignalOutcome::AlreadyStopped);

        let c = counters.lock().expect("lock");
        assert_eq!(c.stops, 1);
        assert_eq!(c.live, 0);
    }

    #[tokio::test]
    async fn arbitrary_sequences_never_overlap_instances() {
        let fx = fixture(Some(CONFIG));
        let (factory, counters) = FakeFactory::new();
        let mut ctrl = controller(&fx, factory, FakeRegistry::with_devices(&[]), BridgeConfig::default());

        let sequence = [
            "true", "true", "false", "true", "1", "true", "True", "false", "false", "true",
        ];
        let mut expected_running = false;
        for raw in sequence {
            ctrl.on_signal(&Payload::from(raw)).await;
            expected_running = raw.trim() == "true";
            assert_eq!(ctrl.is_running(), expected_running, "after {raw:?}");
        }

        let c = counters.lock().expect("lock");
        assert_eq!(c.max_live, 1);
        assert_eq!(c.live, isize::from(expected_running));
        // Starts happen only on a false -> true edge.
        assert_eq!(c.starts, 4);
        assert_eq!(c.stops, 3);
    }

    #[tokio::test]
    async fn missing_config_at_startup_and_start_stays_stopped() {
        let fx = fixture(None);
        let (factory, counters) = FakeFactory::new();
        let mut ctrl = controller(&fx, factory, FakeRegistry::with_devices(&[]), BridgeConfig::default());

        let err = ctrl.start().await.expect_err("no config");
        assert!(matches!(err, CoreError::ConfigUnavailable { .. }));
        assert_eq!(ctrl.on_signal(&Payload::from("true")).await, SignalOutcome::StartFailed);

        assert!(!ctrl.is_running());
        assert_eq!(counters.lock().expect("lock").created, 0);
    }

    #[tokio::test]
    async fn config_appearing_later_is_picked_up_on_next_signal() {
        let fx = fixture(None);
        let (factory, counters) = FakeFactory::new();
        let mut ctrl = controller(&fx, factory, FakeRegistry::with_devices(&[]), BridgeConfig::default());

        assert_eq!(ctrl.on_signal(&Payload::from("true")).await, SignalOutcome::StartFailed);
        std::fs::write(&fx.path, CONFIG).expect("write");
        assert_eq!(ctrl.on_signal(&Payload::from("true")).await, SignalOutcome::Started);

        assert_eq!(
            counters.lock().expect("lock").last_slug.as_deref(),
            Some("abc_librecoach")
        );
    }

    #[tokio::test]
    async fn unreadable_config_falls_back_to_last_known() {
        let fx = fixture(Some("{ not json"));
        let (factory, counters) = FakeFactory::new();
        let initial: BridgeConfig =
            serde_json::from_value(json!({ "addon_slug": "cached" })).expect("valid");
        let mut ctrl = controller(&fx, factory, FakeRegistry::with_devices(&[]), initial);

        ctrl.start().await.expect("started from cached config");

        assert_eq!(counters.lock().expect("lock").last_slug.as_deref(), Some("cached"));
        assert_eq!(ctrl.config().addon_slug(), Some("cached"));
    }

    #[tokio::test]
    async fn rotated_config_replaces_last_known() {
        let fx = fixture(Some(r#"{"addon_slug": "rotated", "token": "new"}"#));
        let (factory, _) = FakeFactory::new();
        let initial: BridgeConfig =
            serde_json::from_value(json!({ "addon_slug": "old" })).expect("valid");
        let mut ctrl = controller(&fx, factory, FakeRegistry::with_devices(&[]), initial);

        ctrl.start().await.expect("started");

        assert_eq!(ctrl.config().addon_slug(), Some("rotated"));
        assert_eq!(ctrl.config().extra.get("token"), Some(&json!("new")));
    }

    #[tokio::test]
    async fn failed_start_discards_handle_and_next_signal_retries() {
        let fx = fixture(Some(CONFIG));
        let (factory, counters) = FakeFactory::with_failures(true, false);
        let mut ctrl = controller(&fx, factory, FakeRegistry::with_devices(&[]), BridgeConfig::default());

        assert_eq!(ctrl.on_signal(&Payload::from("true")).await, SignalOutcome::StartFailed);
        assert!(!ctrl.is_running());
        assert_eq!(ctrl.on_signal(&Payload::from("true")).await, SignalOutcome::StartFailed);

        let c = counters.lock().expect("lock");
        assert_eq!(c.created, 2);
        assert_eq!(c.live, 0);
    }

    #[tokio::test]
    async fn stop_failure_still_clears_state() {
        let fx = fixture(Some(CONFIG));
        let (factory, counters) = FakeFactory::with_failures(false, true);
        let mut ctrl = controller(&fx, factory, FakeRegistry::with_devices(&[]), BridgeConfig::default());

        ctrl.start().await.expect("started");
        ctrl.stop().await;

        assert!(!ctrl.is_running());
        assert_eq!(counters.lock().expect("lock").stops, 1);
    }

    #[tokio::test]
    async fn stop_purges_only_own_devices_even_when_stopped() {
        let fx = fixture(Some(CONFIG));
        let (factory, counters) = FakeFactory::new();
        let registry = FakeRegistry::with_devices(&["librecoach_ble", "hue", "librecoach_ble"]);
        let mut ctrl = controller(
            &fx,
            factory,
            Arc::clone(&registry) as Arc<dyn DeviceRegistry>,
            BridgeConfig::default(),
        );

        ctrl.stop().await;

        assert_eq!(registry.remaining(), vec!["dev1".to_owned()]);
        assert_eq!(counters.lock().expect("lock").stops, 0);
    }

    #[tokio::test]
    async fn registry_failure_does_not_block_stop() {
        let fx = fixture(Some(CONFIG));
        let (factory, _) = FakeFactory::new();
        let registry = Arc::new(FakeRegistry {
            devices: StdMutex::new(Vec::new()),
            fail_list: true,
        });
        let mut ctrl = controller(&fx, factory, registry, BridgeConfig::default());

        ctrl.start().await.expect("started");
        ctrl.stop().await;

        assert!(!ctrl.is_running());
        assert_eq!(ctrl.purge_registry().await, 0);
    }

    #[tokio::test]
    async fn retired_controller_ignores_replayed_true() {
        let fx = fixture(Some(CONFIG));
        let (factory, counters) = FakeFactory::new();
        let initial: BridgeConfig =
            serde_json::from_value(json!({ "addon_slug": "cached" })).expect("valid");
        let mut ctrl = controller(&fx, factory, FakeRegistry::with_devices(&[]), initial);

        ctrl.on_signal(&Payload::from("true")).await;
        ctrl.retire().await;
        // Cleanup has also deleted the marker file by now.
        std::fs::remove_file(&fx.path).expect("remove");

        assert!(ctrl.is_retired());
        assert!(ctrl.config().is_empty());
        assert_eq!(ctrl.on_signal(&Payload::from("true")).await, SignalOutcome::Retired);
        assert_eq!(ctrl.on_signal(&Payload::from("false")).await, SignalOutcome::Retired);
        assert!(!ctrl.is_running());

        let c = counters.lock().expect("lock");
        assert_eq!(c.starts, 1);
        assert_eq!(c.stops, 1);
        assert_eq!(c.live, 0);
    }

    // ── Actor and activation ────────────────────────────────────────

    #[test]
    fn control_task_future_is_send() {
        fn assert_send<T: Send>(_: &T) {}

        let fx = fixture(Some(CONFIG));
        let (factory, _) = FakeFactory::new();
        let ctrl = controller(&fx, factory, FakeRegistry::with_devices(&[]), BridgeConfig::default());
        let (_tx, rx) = mpsc::channel(1);

        let task = control_task(ctrl, rx, CancellationToken::new());
        assert_send(&task);
    }

    #[tokio::test]
    async fn teardown_and_shutdown_through_handle() {
        let fx = fixture(Some(CONFIG));
        let (factory, counters) = FakeFactory::new();
        let registry = FakeRegistry::with_devices(&["librecoach_ble"]);
        let ctrl = controller(
            &fx,
            factory,
            Arc::clone(&registry) as Arc<dyn DeviceRegistry>,
            BridgeConfig::default(),
        );
        let cancel = CancellationToken::new();
        let (handle, task) = ControllerHandle::spawn(ctrl, cancel.clone());

        handle.start().await.expect("started");
        assert!(handle.is_running().await.expect("reply"));

        handle.teardown().await;
        handle.teardown().await;
        assert!(!handle.is_running().await.expect("reply"));
        assert!(registry.remaining().is_empty());

        // A replayed toggle must not bring the bridge back.
        assert_eq!(
            handle.signal(Payload::from("true")).await.expect("reply"),
            SignalOutcome::Retired
        );
        assert!(matches!(handle.start().await, Err(CoreError::Retired)));
        cancel.cancel();
        task.await.expect("task joined");

        let c = counters.lock().expect("lock");
        assert_eq!(c.live, 0);
        assert_eq!(c.starts, 1);
        assert_eq!(c.stops, 1);
        assert!(matches!(
            handle.is_running().await,
            Err(CoreError::ControllerUnavailable)
        ));
    }

    #[tokio::test]
    async fn activation_waits_for_readiness_and_subscribes_once() {
        let fx = fixture(Some(CONFIG));
        let (factory, counters) = FakeFactory::new();
        let ctrl = controller(&fx, factory, FakeRegistry::with_devices(&[]), BridgeConfig::default());
        let cancel = CancellationToken::new();
        let (handle, _task) = ControllerHandle::spawn(ctrl, cancel.clone());

        let (source, publisher) = ChannelSignalSource::new();
        let source = Arc::new(source);
        let readiness = Readiness::new();

        // Retained value published before the host is ready.
        publisher.publish("true").await.expect("publish");

        let activation = tokio::spawn(activate(
            handle.clone(),
            Arc::clone(&source) as Arc<dyn SignalSource>,
            readiness.clone(),
            ControllerSettings::default(),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(source.subscription_count(), 0);
        assert!(!handle.is_running().await.expect("reply"));

        readiness.fire();
        readiness.fire();

        // Replayed and repeated values.
        publisher.publish("true").await.expect("publish");
        publisher.publish(&b"true"[..]).await.expect("publish");
        wait_until(|| counters.lock().expect("lock").starts == 1).await;

        // Second activation is a no-op.
        activate(
            handle.clone(),
            Arc::clone(&source) as Arc<dyn SignalSource>,
            readiness.clone(),
            ControllerSettings::default(),
            cancel.clone(),
        )
        .await
        .expect("no-op activation");
        assert_eq!(source.subscription_count(), 1);

        publisher.publish("false").await.expect("publish");
        wait_until(|| counters.lock().expect("lock").stops == 1).await;

        cancel.cancel();
        activation.await.expect("joined").expect("activation ok");
        assert_eq!(counters.lock().expect("lock").starts, 1);
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition reached in time");
    }
}
