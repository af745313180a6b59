use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::config::PushConfig;
use crate::error::{PlatformError, PushError};
use crate::logging::{PushEvent, PushLog, PushLogger};
use crate::platform::{Capability, Platform, WorkerRegistration, live_subscription};

/// Registers the push service worker once per process.
pub struct ServiceWorkerBootstrap {
    platform: Arc<dyn Platform>,
    logger: Arc<dyn PushLogger>,
    script_url: String,
    scope: String,
    registration: OnceCell<WorkerRegistration>,
}

impl ServiceWorkerBootstrap {
    pub fn new(platform: Arc<dyn Platform>, config: &PushConfig, logger: Arc<dyn PushLogger>) -> Self {
        Self {
            platform,
            logger,
            script_url: config.worker_script.clone(),
            scope: config.worker_scope.clone(),
            registration: OnceCell::new(),
        }
    }

    /// Register the worker (first call only) and report whether a push
    /// subscription is already active. Never fails: a runtime without
    /// service workers or a failed registration both yield `false`.
    pub async fn initialize(&self) -> bool {
        const OP: &str = "initialize";

        if !self.platform.supports(Capability::ServiceWorker) {
            self.logger.log(PushLog::new(
                OP,
                PushEvent::Unsupported {
                    capability: Capability::ServiceWorker.to_string(),
                },
            ));
            return false;
        }

        let registered = self
            .registration
            .get_or_try_init(|| async {
                let registration = self
                    .platform
                    .register_worker(&self.script_url, &self.scope)
                    .await?;
                self.logger.log(PushLog::new(
                    OP,
                    PushEvent::WorkerRegistered {
                        scope: registration.scope.clone(),
                    },
                ));
                Ok::<_, PlatformError>(registration)
            })
            .await;

        if let Err(e) = registered {
            self.logger.log(PushLog::error(OP, &PushError::WorkerRegistration(e)));
            return false;
        }

        match live_subscription(self.platform.as_ref()).await {
            Ok(subscription) => subscription.is_some(),
            Err(e) => {
                self.logger.log(PushLog::error(OP, &PushError::WorkerRegistration(e)));
                false
            }
        }
    }

    /// Registration made by `initialize`, if it succeeded.
    pub fn registration(&self) -> Option<&WorkerRegistration> {
        self.registration.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemoryLogger;
    use crate::memory::MemoryPlatform;

    fn bootstrap(platform: &Arc<MemoryPlatform>) -> (ServiceWorkerBootstrap, Arc<MemoryLogger>) {
        let logger = Arc::new(MemoryLogger::new());
        let bootstrap = ServiceWorkerBootstrap::new(platform.clone(), &PushConfig::default(), logger.clone());
        (bootstrap, logger)
    }

    #[tokio::test]
    async fn registers_once_at_root_scope() {
        let platform = Arc::new(MemoryPlatform::new());
        let (bootstrap, _) = bootstrap(&platform);

        assert!(!bootstrap.initialize().await);
        assert!(!bootstrap.initialize().await);

        assert_eq!(platform.register_calls(), 1);
        let registration = bootstrap.registration().unwrap();
        assert_eq!(registration.scope, "/");
        assert_eq!(registration.script_url, "/sw.js");
    }

    #[tokio::test]
    async fn missing_service_worker_is_not_an_error() {
        let platform = Arc::new(MemoryPlatform::new().without(Capability::ServiceWorker));
        let (bootstrap, logger) = bootstrap(&platform);

        assert!(!bootstrap.initialize().await);
        assert_eq!(platform.register_calls(), 0);
        assert!(logger.errors().is_empty());
    }

    #[tokio::test]
    async fn registration_failure_degrades_and_retries() {
        let platform = Arc::new(MemoryPlatform::new());
        platform.fail_next_registration(PlatformError::rejected("SecurityError", "insecure origin"));
        let (bootstrap, logger) = bootstrap(&platform);

        assert!(!bootstrap.initialize().await);
        assert!(bootstrap.registration().is_none());
        assert_eq!(logger.errors().len(), 1);
        assert_eq!(logger.errors()[0].operation, "initialize");

        // Failures are not memoised.
        assert!(!bootstrap.initialize().await);
        assert!(bootstrap.registration().is_some());
        assert_eq!(platform.register_calls(), 2);
    }

    #[tokio::test]
    async fn reports_existing_subscription() {
        let platform = Arc::new(MemoryPlatform::new().with_existing_subscription());
        let (bootstrap, _) = bootstrap(&platform);

        assert!(bootstrap.initialize().await);
    }
}
