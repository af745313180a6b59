use std::sync::Arc;

use noticeboard_types::PermissionState;

use crate::error::PushError;
use crate::logging::{PushEvent, PushLog, PushLogger};
use crate::platform::{Capability, Platform};

/// Single owner of the notification permission prompt.
#[derive(Clone)]
pub struct PermissionGate {
    platform: Arc<dyn Platform>,
    logger: Arc<dyn PushLogger>,
}

impl PermissionGate {
    pub fn new(platform: Arc<dyn Platform>, logger: Arc<dyn PushLogger>) -> Self {
        Self { platform, logger }
    }

    /// Current permission; `Default` when the runtime has no Notification API.
    pub fn current_state(&self) -> PermissionState {
        if !self.platform.supports(Capability::Notification) {
            return PermissionState::Default;
        }
        self.platform.permission()
    }

    /// Ask for permission. Prompts only from `Default`; `Denied` is sticky and
    /// never re-prompted.
    pub async fn request_permission(&self) -> Result<bool, PushError> {
        const OP: &str = "request_permission";

        if !self.platform.supports(Capability::Notification) {
            let err = PushError::Unsupported(Capability::Notification);
            self.logger.log(PushLog::error(OP, &err));
            return Err(err);
        }

        match self.platform.permission() {
            PermissionState::Granted => Ok(true),
            PermissionState::Denied => {
                let err = PushError::PermissionDenied;
                self.logger.log(PushLog::error(OP, &err));
                Err(err)
            }
            PermissionState::Default => {
                self.logger.log(PushLog::new(OP, PushEvent::PermissionPrompted));
                let state = self.platform.request_permission().await;
                self.logger.log(PushLog::new(OP, PushEvent::PermissionResolved { state }));
                Ok(state == PermissionState::Granted)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemoryLogger;
    use crate::memory::MemoryPlatform;

    fn gate(platform: &Arc<MemoryPlatform>) -> (PermissionGate, Arc<MemoryLogger>) {
        let logger = Arc::new(MemoryLogger::new());
        (PermissionGate::new(platform.clone(), logger.clone()), logger)
    }

    #[tokio::test]
    async fn granted_returns_without_prompt() {
        let platform = Arc::new(MemoryPlatform::new().with_permission(PermissionState::Granted));
        let (gate, _) = gate(&platform);

        assert!(gate.request_permission().await.unwrap());
        assert_eq!(platform.prompts(), 0);
    }

    #[tokio::test]
    async fn denied_is_sticky_and_never_prompts() {
        let platform = Arc::new(MemoryPlatform::new().with_permission(PermissionState::Denied));
        let (gate, logger) = gate(&platform);

        for _ in 0..3 {
            assert!(matches!(gate.request_permission().await, Err(PushError::PermissionDenied)));
        }
        assert_eq!(platform.prompts(), 0);
        assert_eq!(logger.errors().len(), 3);
    }

    #[tokio::test]
    async fn default_prompts_once_and_reports_choice() {
        let platform = Arc::new(MemoryPlatform::new().answer_prompt_with(PermissionState::Granted));
        let (gate, _) = gate(&platform);

        assert_eq!(gate.current_state(), PermissionState::Default);
        assert!(gate.request_permission().await.unwrap());
        assert_eq!(platform.prompts(), 1);
        assert_eq!(gate.current_state(), PermissionState::Granted);

        // Granted now, so no second prompt.
        assert!(gate.request_permission().await.unwrap());
        assert_eq!(platform.prompts(), 1);
    }

    #[tokio::test]
    async fn declined_prompt_returns_false_then_denies() {
        let platform = Arc::new(MemoryPlatform::new().answer_prompt_with(PermissionState::Denied));
        let (gate, _) = gate(&platform);

        assert!(!gate.request_permission().await.unwrap());
        assert_eq!(gate.current_state(), PermissionState::Denied);
        assert!(matches!(gate.request_permission().await, Err(PushError::PermissionDenied)));
        assert_eq!(platform.prompts(), 1);
    }

    #[tokio::test]
    async fn missing_notification_api() {
        let platform = Arc::new(MemoryPlatform::new().without(Capability::Notification));
        let (gate, _) = gate(&platform);

        assert_eq!(gate.current_state(), PermissionState::Default);
        assert!(matches!(
            gate.request_permission().await,
            Err(PushError::Unsupported(Capability::Notification))
        ));
        assert_eq!(platform.prompts(), 0);
    }
}
