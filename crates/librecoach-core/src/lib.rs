//! Lifecycle control for the LibreCoach BLE bridge.
//!
//! This crate owns the two pieces of real logic in the integration:
//!
//! - **[`LifecycleController`]**: an idempotent edge detector over a
//!   retained boolean toggle. It starts the managed bridge when the toggle
//!   goes `true` and nothing is running, stops it (and purges registry
//!   devices) when the toggle goes `false`, and ignores repeats. The
//!   controller is moved into a single task behind a [`ControllerHandle`]
//!   so every start/stop is serialized without a lock.
//!
//! - **[`PresenceMonitor`]**: a one-shot background check that the
//!   companion add-on is still installed. Destructive [`SelfCleanup`] only
//!   runs after every attempt confirmed absence from both Supervisor
//!   sources; any error leaves the installation alone.
//!
//! Everything the controller talks to (bridge process, device registry,
//! notification channel, signal transport) is a trait in [`host`], with
//! stock adapters alongside.

pub mod bridge;
pub mod cleanup;
pub mod config;
pub mod controller;
pub mod error;
pub mod host;
pub mod integration;
pub mod monitor;
pub mod notify;
pub mod registry;
pub mod signal;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bridge::{ProcessBridge, ProcessBridgeFactory};
pub use cleanup::{
    Cleanup, CleanupReport, CleanupStep, CleanupSummary, DeclarationEdit, SelfCleanup,
    StrippedConfig, strip_declaration, strip_declaration_file,
};
pub use config::{BridgeCommand, CleanupSettings, ControllerSettings, IntegrationSettings, MonitorSettings};
pub use controller::{ControllerHandle, ControllerState, LifecycleController, SignalOutcome, activate};
pub use error::{CoreError, Disposition};
pub use host::{DeviceRegistry, ManagedResource, Notifier, RegisteredDevice, ResourceFactory, Teardown};
pub use integration::{Integration, IntegrationDeps};
pub use monitor::{MonitorOutcome, PresenceMonitor, PresenceProbe, PresenceVerdict, SupervisorProbe};
pub use notify::{LogNotifier, SupervisorNotifier};
pub use registry::StorageDeviceRegistry;
pub use signal::{ChannelSignalSource, Payload, Readiness, SignalPublisher, SignalSource, decode_toggle};
pub use store::{BridgeConfig, ConfigStore};
