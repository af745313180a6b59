use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;

use noticeboard_crypto::decode_vapid_key;
use noticeboard_types::PushSubscription;

use crate::backend::PushBackend;
use crate::config::PushConfig;
use crate::error::{PlatformError, PushError};
use crate::logging::{PushEvent, PushLog, PushLogger};
use crate::permission::PermissionGate;
use crate::platform::{Capability, Platform, SubscribeOptions, live_subscription};

/// Owns the one device-level push subscription and its backend mirror.
///
/// The VAPID key is cached for the life of the manager. The subscription
/// handle is only a shortcut for `unsubscribe`; every query re-reads the
/// platform, which stays the source of truth when calls overlap or the
/// browser revokes the subscription behind our back.
pub struct SubscriptionManager {
    platform: Arc<dyn Platform>,
    backend: Arc<dyn PushBackend>,
    gate: PermissionGate,
    logger: Arc<dyn PushLogger>,
    user_visible_only: bool,
    vapid_key: OnceCell<String>,
    current: Mutex<Option<PushSubscription>>,
}

/// Result of `SubscriptionManager::unsubscribe`.
#[derive(Debug)]
pub enum Unsubscribed {
    /// There was nothing to revoke.
    NotSubscribed,
    /// Revoked at the platform; the backend is told in the background.
    Revoked {
        endpoint: String,
        backend_sync: BackendSync,
    },
}

impl Unsubscribed {
    pub fn was_subscribed(&self) -> bool {
        matches!(self, Self::Revoked { .. })
    }
}

/// Background `POST /unsubscribe`. Its outcome can be inspected but never
/// decides whether the unsubscribe succeeded.
#[derive(Debug)]
pub struct BackendSync {
    task: JoinHandle<Result<(), PushError>>,
}

impl BackendSync {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn outcome(self) -> Result<(), PushError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(PushError::Task(e.to_string())),
        }
    }
}

impl SubscriptionManager {
    pub fn new(
        platform: Arc<dyn Platform>,
        backend: Arc<dyn PushBackend>,
        gate: PermissionGate,
        config: &PushConfig,
        logger: Arc<dyn PushLogger>,
    ) -> Self {
        Self {
            platform,
            backend,
            gate,
            logger,
            user_visible_only: config.user_visible_only,
            vapid_key: OnceCell::new(),
            current: Mutex::new(None),
        }
    }

    /// Backend VAPID public key, fetched once. Failures are not cached.
    pub async fn vapid_key(&self) -> Result<String, PushError> {
        let key = self
            .vapid_key
            .get_or_try_init(|| async {
                let key = self
                    .backend
                    .vapid_public_key()
                    .await
                    .map_err(PushError::KeyFetch)?;
                if key.trim().is_empty() {
                    return Err(PushError::InvalidVapidKey("server returned an empty key".into()));
                }
                self.logger.log(PushLog::new("vapid_key", PushEvent::VapidKeyCached));
                Ok(key)
            })
            .await;

        match key {
            Ok(key) => Ok(key.clone()),
            Err(e) => {
                self.logger.log(PushLog::error("vapid_key", &e));
                Err(e)
            }
        }
    }

    /// Create the device subscription and record it on the backend.
    ///
    /// Permission → active registration → VAPID key → decode → platform
    /// subscribe → backend upload. If the upload fails, a subscription this
    /// call created is revoked again; one the platform already held is kept.
    /// The platform is re-read after the upload so a subscription revoked by
    /// an overlapping call is never reported as live.
    pub async fn subscribe(&self) -> Result<PushSubscription, PushError> {
        let result = self.try_subscribe().await;
        if let Err(e) = &result {
            self.logger.log(PushLog::error("subscribe", e));
        }
        result
    }

    async fn try_subscribe(&self) -> Result<PushSubscription, PushError> {
        self.require(Capability::ServiceWorker)?;
        self.require(Capability::PushManager)?;

        if !self.gate.request_permission().await? {
            return Err(PushError::PermissionRequired);
        }

        let registration = self
            .platform
            .ready()
            .await
            .map_err(PushError::WorkerRegistration)?;
        let previous = self
            .platform
            .get_subscription(&registration)
            .await
            .map_err(PushError::WorkerRegistration)?
            .map(|s| s.endpoint);

        let key = self.vapid_key().await?;
        let application_server_key =
            decode_vapid_key(&key).map_err(|e| PushError::InvalidVapidKey(format!("{:#}", e)))?;

        let options = SubscribeOptions {
            user_visible_only: self.user_visible_only,
            application_server_key,
        };
        let subscription = self
            .platform
            .subscribe(&registration, &options)
            .await
            .map_err(PushError::PlatformSubscribe)?;

        if let Err(source) = self.backend.subscribe(&subscription).await {
            if previous.as_deref() != Some(subscription.endpoint.as_str()) {
                self.roll_back(&subscription).await;
            }
            return Err(PushError::BackendSync {
                operation: "subscribe",
                source,
            });
        }

        // Recorded before re-reading so an overlapping rollback leaves it alone.
        *self.current.lock() = Some(subscription.clone());

        let live = self
            .platform
            .get_subscription(&registration)
            .await
            .map_err(PushError::WorkerRegistration)?;
        if live.as_ref().map(|s| s.endpoint.as_str()) != Some(subscription.endpoint.as_str()) {
            self.forget_revoked(&subscription).await;
            return Err(PushError::PlatformSubscribe(PlatformError::Revoked));
        }

        self.logger.log(PushLog::new(
            "subscribe",
            PushEvent::DeviceSubscribed {
                endpoint: subscription.endpoint.clone(),
            },
        ));
        Ok(subscription)
    }

    /// Revoke a subscription the backend never recorded, unless another
    /// call has recorded the same endpoint meanwhile.
    async fn roll_back(&self, subscription: &PushSubscription) {
        let recorded_elsewhere = self
            .current
            .lock()
            .as_ref()
            .is_some_and(|s| s.endpoint == subscription.endpoint);
        if recorded_elsewhere {
            return;
        }
        match self.platform.unsubscribe(subscription).await {
            Ok(_) => self.logger.log(PushLog::new(
                "subscribe",
                PushEvent::RolledBack {
                    endpoint: subscription.endpoint.clone(),
                },
            )),
            Err(e) => self
                .logger
                .log(PushLog::error("subscribe", &PushError::PlatformUnsubscribe(e))),
        }
    }

    /// The platform dropped `subscription` while it was being uploaded: clear
    /// the handle and drop the backend record that now points nowhere.
    async fn forget_revoked(&self, subscription: &PushSubscription) {
        {
            let mut current = self.current.lock();
            if current.as_ref().is_some_and(|s| s.endpoint == subscription.endpoint) {
                *current = None;
            }
        }
        match self.backend.unsubscribe(&subscription.endpoint).await {
            Ok(()) => self.logger.log(PushLog::new(
                "subscribe",
                PushEvent::BackendForgot {
                    endpoint: subscription.endpoint.clone(),
                },
            )),
            Err(source) => self.logger.log(PushLog::error(
                "subscribe",
                &PushError::BackendSync {
                    operation: "unsubscribe",
                    source,
                },
            )),
        }
    }

    /// Revoke the device subscription, then tell the backend in the background.
    ///
    /// Idempotent: with no subscription anywhere this is `NotSubscribed`. A
    /// failed backend call is logged and surfaces only through the returned
    /// `BackendSync`; the platform revocation stands either way.
    pub async fn unsubscribe(&self) -> Result<Unsubscribed, PushError> {
        let result = self.try_unsubscribe().await;
        if let Err(e) = &result {
            self.logger.log(PushLog::error("unsubscribe", e));
        }
        result
    }

    async fn try_unsubscribe(&self) -> Result<Unsubscribed, PushError> {
        let cached = self.current.lock().take();
        let subscription = match cached {
            Some(subscription) => subscription,
            None => match live_subscription(self.platform.as_ref())
                .await
                .map_err(PushError::WorkerRegistration)?
            {
                Some(subscription) => subscription,
                None => return Ok(Unsubscribed::NotSubscribed),
            },
        };

        self.platform
            .unsubscribe(&subscription)
            .await
            .map_err(PushError::PlatformUnsubscribe)?;

        let endpoint = subscription.endpoint;
        self.logger.log(PushLog::new(
            "unsubscribe",
            PushEvent::DeviceUnsubscribed {
                endpoint: endpoint.clone(),
            },
        ));

        let backend = self.backend.clone();
        let logger = self.logger.clone();
        let task_endpoint = endpoint.clone();
        let task = tokio::spawn(async move {
            match backend.unsubscribe(&task_endpoint).await {
                Ok(()) => {
                    logger.log(PushLog::new(
                        "unsubscribe",
                        PushEvent::BackendForgot {
                            endpoint: task_endpoint,
                        },
                    ));
                    Ok(())
                }
                Err(source) => {
                    let err = PushError::BackendSync {
                        operation: "unsubscribe",
                        source,
                    };
                    logger.log(PushLog::error("unsubscribe", &err));
                    Err(err)
                }
            }
        });

        Ok(Unsubscribed::Revoked {
            endpoint,
            backend_sync: BackendSync { task },
        })
    }

    /// Live device subscription as the platform reports it right now.
    /// Errors are logged and read as "none".
    pub async fn current_subscription(&self) -> Option<PushSubscription> {
        match live_subscription(self.platform.as_ref()).await {
            Ok(subscription) => subscription,
            Err(e) => {
                self.logger
                    .log(PushLog::error("current_subscription", &PushError::WorkerRegistration(e)));
                None
            }
        }
    }

    /// Whether the platform holds a live subscription. Does not ask the backend.
    pub async fn is_subscribed(&self) -> bool {
        self.current_subscription().await.is_some()
    }

    pub fn permissions(&self) -> &PermissionGate {
        &self.gate
    }

    fn require(&self, capability: Capability) -> Result<(), PushError> {
        if self.platform.supports(capability) {
            Ok(())
        } else {
            Err(PushError::Unsupported(capability))
        }
    }
}
