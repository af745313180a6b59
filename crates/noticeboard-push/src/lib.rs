/// Noticeboard Push: web push subscriptions for the notice board client.
///
/// Provides:
/// - One-time service worker bootstrap at the site root
/// - A single owner of the notification permission prompt
/// - Device subscription lifecycle with rollback when the backend refuses it
/// - Per-item (event / notice) subscriptions keyed by device endpoint
/// - Controllers for the settings button and the per-item bell

pub mod backend;
pub mod bootstrap;
pub mod config;
pub mod controller;
pub mod error;
pub mod items;
pub mod logging;
pub mod manager;
#[cfg(any(test, feature = "memory"))]
pub mod memory;
pub mod permission;
pub mod platform;
pub mod service;
pub mod toast;

// Re-export key types for convenience.
pub use backend::{HttpBackend, PushBackend};
pub use bootstrap::ServiceWorkerBootstrap;
pub use config::PushConfig;
pub use controller::{ButtonState, ItemBell, PushController, PushStatus};
pub use error::{BackendError, PlatformError, PushError};
pub use items::ItemSubscriptionIndex;
pub use logging::{MemoryLogger, NullLogger, PushEvent, PushLog, PushLogger, TracingLogger};
pub use manager::{BackendSync, SubscriptionManager, Unsubscribed};
#[cfg(any(test, feature = "memory"))]
pub use memory::{BackendCall, MemoryBackend, MemoryPlatform, Route};
pub use permission::PermissionGate;
pub use platform::{Capability, Platform, SubscribeOptions, WorkerRegistration, push_supported};
pub use service::PushService;
pub use toast::{LogToaster, MemoryToaster, Toast, ToastKind, Toaster};

pub use noticeboard_types::{ItemRef, ItemType, PermissionState, PushSubscription};
