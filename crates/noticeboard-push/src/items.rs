use std::sync::Arc;

use noticeboard_types::{ItemRef, PushSubscription};

use crate::backend::PushBackend;
use crate::error::PushError;
use crate::logging::{PushEvent, PushLog, PushLogger};
use crate::manager::SubscriptionManager;

/// Per-item notification relations, keyed by device endpoint.
///
/// The backend owns these; nothing is cached here.
pub struct ItemSubscriptionIndex {
    backend: Arc<dyn PushBackend>,
    manager: Arc<SubscriptionManager>,
    logger: Arc<dyn PushLogger>,
}

impl ItemSubscriptionIndex {
    pub fn new(
        backend: Arc<dyn PushBackend>,
        manager: Arc<SubscriptionManager>,
        logger: Arc<dyn PushLogger>,
    ) -> Self {
        Self {
            backend,
            manager,
            logger,
        }
    }

    /// Whether `endpoint` gets notifications for `item`. A failed check is
    /// logged and reported as `false`.
    pub async fn is_subscribed_to_item(&self, endpoint: &str, item: &ItemRef) -> bool {
        match self.backend.check_item_subscription(endpoint, item).await {
            Ok(subscribed) => subscribed,
            Err(e) => {
                self.logger.log(PushLog::new(
                    "check_item",
                    PushEvent::Error {
                        message: e.to_string(),
                        item: Some(item.clone()),
                    },
                ));
                false
            }
        }
    }

    pub async fn subscribe_to_item(
        &self,
        subscription: &PushSubscription,
        item: &ItemRef,
    ) -> Result<(), PushError> {
        const OP: &str = "subscribe_item";

        match self.backend.subscribe_item(subscription, item).await {
            Ok(()) => {
                self.logger
                    .log(PushLog::new(OP, PushEvent::ItemSubscribed { item: item.clone() }));
                Ok(())
            }
            Err(source) => {
                let err = PushError::ItemSubscribe {
                    item: item.clone(),
                    source,
                };
                self.logger.log(PushLog::error(OP, &err));
                Err(err)
            }
        }
    }

    pub async fn unsubscribe_from_item(&self, endpoint: &str, item: &ItemRef) -> Result<(), PushError> {
        const OP: &str = "unsubscribe_item";

        match self.backend.unsubscribe_item(endpoint, item).await {
            Ok(()) => {
                self.logger
                    .log(PushLog::new(OP, PushEvent::ItemUnsubscribed { item: item.clone() }));
                Ok(())
            }
            Err(source) => {
                let err = PushError::ItemUnsubscribe {
                    item: item.clone(),
                    source,
                };
                self.logger.log(PushLog::error(OP, &err));
                Err(err)
            }
        }
    }

    /// The live device subscription, creating one if there is none.
    pub async fn ensure_device_subscription(&self) -> Result<PushSubscription, PushError> {
        match self.manager.current_subscription().await {
            Some(subscription) => Ok(subscription),
            None => self.manager.subscribe().await,
        }
    }

    /// Subscribe the device if needed, then attach `item` to it.
    pub async fn enable_item(&self, item: &ItemRef) -> Result<PushSubscription, PushError> {
        let subscription = self.ensure_device_subscription().await?;
        self.subscribe_to_item(&subscription, item).await?;
        Ok(subscription)
    }

    /// Flip the relation for `item` given what the caller currently shows.
    /// Returns the new state. Any failure leaves the relation as it was.
    pub async fn toggle(&self, item: &ItemRef, currently_subscribed: bool) -> Result<bool, PushError> {
        let subscription = self.ensure_device_subscription().await?;
        if currently_subscribed {
            self.unsubscribe_from_item(&subscription.endpoint, item).await?;
            Ok(false)
        } else {
            self.subscribe_to_item(&subscription, item).await?;
            Ok(true)
        }
    }

    pub fn manager(&self) -> &Arc<SubscriptionManager> {
        &self.manager
    }
}
