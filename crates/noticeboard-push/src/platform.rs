//! Browser surface the push subsystem runs on: service worker container,
//! Notification permission, and the PushManager of the active registration.

use std::fmt;

use async_trait::async_trait;

use noticeboard_types::{PermissionState, PushSubscription};

use crate::error::PlatformError;

/// Optional runtime capabilities. Missing ones are a precondition, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ServiceWorker,
    PushManager,
    Notification,
}

impl Capability {
    pub const ALL: [Capability; 3] = [Self::ServiceWorker, Self::PushManager, Self::Notification];
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ServiceWorker => "service workers",
            Self::PushManager => "push messaging",
            Self::Notification => "notifications",
        })
    }
}

/// A registered service worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRegistration {
    pub script_url: String,
    pub scope: String,
}

/// Arguments for `PushManager.subscribe()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Every push must surface a visible notification.
    pub user_visible_only: bool,
    /// Raw VAPID public key; restricts who may push to the subscription.
    pub application_server_key: Vec<u8>,
}

/// Browser push surface. A browser adapter implements this; `MemoryPlatform`
/// stands in for it in tests and the probe.
#[async_trait]
pub trait Platform: Send + Sync {
    fn supports(&self, capability: Capability) -> bool;

    /// Synchronous read of the current permission.
    fn permission(&self) -> PermissionState;

    /// Show the native permission prompt and resolve with the resulting state.
    async fn request_permission(&self) -> PermissionState;

    /// Register `script_url` at `scope`. Registering the same worker at the
    /// same scope again resolves to the existing registration.
    async fn register_worker(
        &self,
        script_url: &str,
        scope: &str,
    ) -> Result<WorkerRegistration, PlatformError>;

    /// The active registration (`navigator.serviceWorker.ready`).
    async fn ready(&self) -> Result<WorkerRegistration, PlatformError>;

    async fn get_subscription(
        &self,
        registration: &WorkerRegistration,
    ) -> Result<Option<PushSubscription>, PlatformError>;

    async fn subscribe(
        &self,
        registration: &WorkerRegistration,
        options: &SubscribeOptions,
    ) -> Result<PushSubscription, PlatformError>;

    /// Revoke `subscription`. Resolves `false` if it was already gone.
    async fn unsubscribe(&self, subscription: &PushSubscription) -> Result<bool, PlatformError>;
}

/// Push needs all three capabilities before anything is offered to the user.
pub fn push_supported(platform: &dyn Platform) -> bool {
    Capability::ALL.iter().all(|c| platform.supports(*c))
}

/// Live subscription of the active registration, re-read from the platform.
/// `None` when the runtime has no service worker or push manager.
pub(crate) async fn live_subscription(
    platform: &dyn Platform,
) -> Result<Option<PushSubscription>, PlatformError> {
    if !platform.supports(Capability::ServiceWorker) || !platform.supports(Capability::PushManager) {
        return Ok(None);
    }
    let registration = platform.ready().await?;
    platform.get_subscription(&registration).await
}
