use std::sync::Arc;

use noticeboard_types::ItemRef;

use crate::backend::{HttpBackend, PushBackend};
use crate::bootstrap::ServiceWorkerBootstrap;
use crate::config::PushConfig;
use crate::controller::{ItemBell, PushController};
use crate::error::BackendError;
use crate::items::ItemSubscriptionIndex;
use crate::logging::{PushLogger, TracingLogger};
use crate::manager::SubscriptionManager;
use crate::permission::PermissionGate;
use crate::platform::{Platform, push_supported};
use crate::toast::Toaster;

/// The push components wired to one platform and one backend.
///
/// Build one per page load and hand out clones of the `Arc`s; the VAPID key
/// cache and the worker registration are shared through them.
#[derive(Clone)]
pub struct PushService {
    platform: Arc<dyn Platform>,
    pub bootstrap: Arc<ServiceWorkerBootstrap>,
    pub permissions: PermissionGate,
    pub manager: Arc<SubscriptionManager>,
    pub items: Arc<ItemSubscriptionIndex>,
}

impl PushService {
    pub fn new(
        platform: Arc<dyn Platform>,
        backend: Arc<dyn PushBackend>,
        config: &PushConfig,
        logger: Arc<dyn PushLogger>,
    ) -> Self {
        let bootstrap = Arc::new(ServiceWorkerBootstrap::new(platform.clone(), config, logger.clone()));
        let permissions = PermissionGate::new(platform.clone(), logger.clone());
        let manager = Arc::new(SubscriptionManager::new(
            platform.clone(),
            backend.clone(),
            permissions.clone(),
            config,
            logger.clone(),
        ));
        let items = Arc::new(ItemSubscriptionIndex::new(backend, manager.clone(), logger));

        Self {
            platform,
            bootstrap,
            permissions,
            manager,
            items,
        }
    }

    /// HTTP backend at `config.api_url`, logging through `tracing`.
    pub fn connect(platform: Arc<dyn Platform>, config: &PushConfig) -> Result<Self, BackendError> {
        let backend = HttpBackend::new(&config.api_url)?;
        tracing::debug!(base = %backend.base_url(), "push backend configured");
        Ok(Self::new(platform, Arc::new(backend), config, Arc::new(TracingLogger)))
    }

    /// Service workers, push messaging and notifications are all available.
    pub fn is_supported(&self) -> bool {
        push_supported(self.platform.as_ref())
    }

    pub fn controller(&self, toaster: Arc<dyn Toaster>) -> PushController {
        PushController::new(
            self.is_supported(),
            self.bootstrap.clone(),
            self.manager.clone(),
            toaster,
        )
    }

    pub fn bell(&self, item: ItemRef, toaster: Arc<dyn Toaster>) -> ItemBell {
        ItemBell::new(item, self.is_supported(), self.items.clone(), toaster)
    }
}
