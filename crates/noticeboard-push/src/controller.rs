//! State holders behind the notification settings button and the per-item
//! bell. Each action reports its outcome as a toast and a boolean; nothing
//! here returns an error to the caller.

use std::sync::Arc;

use parking_lot::Mutex;

use noticeboard_types::{ItemRef, PermissionState};

use crate::bootstrap::ServiceWorkerBootstrap;
use crate::items::ItemSubscriptionIndex;
use crate::manager::SubscriptionManager;
use crate::permission::PermissionGate;
use crate::toast::Toaster;

const NOT_SUPPORTED: &str = "Push notifications are not supported in this browser";

/// Snapshot of what the settings button shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushStatus {
    pub supported: bool,
    pub subscribed: bool,
    pub loading: bool,
    pub permission: PermissionState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    /// Push unsupported; render nothing.
    Hidden,
    Loading,
    /// Permission denied; disabled.
    Blocked,
    On,
    Off,
}

pub struct PushController {
    bootstrap: Arc<ServiceWorkerBootstrap>,
    manager: Arc<SubscriptionManager>,
    gate: PermissionGate,
    toaster: Arc<dyn Toaster>,
    status: Mutex<PushStatus>,
}

impl PushController {
    pub fn new(
        supported: bool,
        bootstrap: Arc<ServiceWorkerBootstrap>,
        manager: Arc<SubscriptionManager>,
        toaster: Arc<dyn Toaster>,
    ) -> Self {
        let gate = manager.permissions().clone();
        let permission = if supported {
            gate.current_state()
        } else {
            PermissionState::Default
        };
        Self {
            bootstrap,
            manager,
            gate,
            toaster,
            status: Mutex::new(PushStatus {
                supported,
                subscribed: false,
                loading: true,
                permission,
            }),
        }
    }

    pub fn status(&self) -> PushStatus {
        *self.status.lock()
    }

    fn update(&self, f: impl FnOnce(&mut PushStatus)) {
        f(&mut self.status.lock());
    }

    fn refresh_permission(&self) {
        let permission = self.gate.current_state();
        self.update(|s| s.permission = permission);
    }

    /// Register the worker and read the current subscription.
    pub async fn init(&self) -> PushStatus {
        if self.status().supported {
            self.bootstrap.initialize().await;
            let subscribed = self.manager.is_subscribed().await;
            self.update(|s| s.subscribed = subscribed);
        }
        self.update(|s| s.loading = false);
        self.status()
    }

    pub async fn subscribe(&self) -> bool {
        if !self.status().supported {
            self.toaster.error(NOT_SUPPORTED);
            return false;
        }

        self.update(|s| s.loading = true);
        let result = self.manager.subscribe().await;
        self.refresh_permission();
        self.update(|s| s.loading = false);

        match result {
            Ok(_) => {
                self.update(|s| s.subscribed = true);
                self.toaster.success("Successfully subscribed to push notifications!");
                true
            }
            Err(e) => {
                self.toaster
                    .error(&e.user_message("Failed to subscribe to push notifications"));
                false
            }
        }
    }

    pub async fn unsubscribe(&self) -> bool {
        if !self.status().supported {
            return false;
        }

        self.update(|s| s.loading = true);
        let result = self.manager.unsubscribe().await;
        self.update(|s| s.loading = false);

        match result {
            Ok(_) => {
                self.update(|s| s.subscribed = false);
                self.toaster.success("Unsubscribed from push notifications");
                true
            }
            Err(_) => {
                self.toaster.error("Failed to unsubscribe from push notifications");
                false
            }
        }
    }

    pub async fn request_permission(&self) -> bool {
        if !self.status().supported {
            self.toaster.error(NOT_SUPPORTED);
            return false;
        }

        let result = self.gate.request_permission().await;
        self.refresh_permission();

        match result {
            Ok(true) => {
                self.toaster.success("Notification permission granted!");
                true
            }
            Ok(false) => {
                self.toaster.error("Notification permission denied");
                false
            }
            Err(e) => {
                self.toaster.error(&e.user_message("Failed to request permission"));
                false
            }
        }
    }

    pub fn button_state(&self) -> ButtonState {
        let status = self.status();
        if !status.supported {
            ButtonState::Hidden
        } else if status.loading {
            ButtonState::Loading
        } else if status.permission == PermissionState::Denied {
            ButtonState::Blocked
        } else if status.subscribed {
            ButtonState::On
        } else {
            ButtonState::Off
        }
    }

    /// Button press. Subscribing prompts for permission first when needed.
    /// Does nothing while hidden, loading, or blocked.
    pub async fn click(&self) -> bool {
        match self.button_state() {
            ButtonState::On => self.unsubscribe().await,
            ButtonState::Off => self.subscribe().await,
            ButtonState::Hidden | ButtonState::Loading | ButtonState::Blocked => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct BellState {
    subscribed: bool,
    loading: bool,
    processing: bool,
}

/// Bell toggle for one event or notice.
pub struct ItemBell {
    item: ItemRef,
    supported: bool,
    index: Arc<ItemSubscriptionIndex>,
    toaster: Arc<dyn Toaster>,
    state: Mutex<BellState>,
}

impl ItemBell {
    pub fn new(
        item: ItemRef,
        supported: bool,
        index: Arc<ItemSubscriptionIndex>,
        toaster: Arc<dyn Toaster>,
    ) -> Self {
        Self {
            item,
            supported,
            index,
            toaster,
            state: Mutex::new(BellState {
                loading: true,
                ..BellState::default()
            }),
        }
    }

    pub fn item(&self) -> &ItemRef {
        &self.item
    }

    /// Ask the backend whether the live device subscription follows this item.
    pub async fn load(&self) -> bool {
        let mut subscribed = false;
        if self.supported && !self.item.item_id.is_empty() {
            if let Some(subscription) = self.index.manager().current_subscription().await {
                subscribed = self
                    .index
                    .is_subscribed_to_item(&subscription.endpoint, &self.item)
                    .await;
            }
        }
        let mut state = self.state.lock();
        state.subscribed = subscribed;
        state.loading = false;
        subscribed
    }

    /// Flip the relation. Returns the state now shown; on failure that is
    /// the unchanged previous state.
    pub async fn toggle(&self) -> bool {
        if !self.supported {
            self.toaster.error(NOT_SUPPORTED);
            return self.is_subscribed();
        }

        let current = {
            let mut state = self.state.lock();
            if state.processing {
                return state.subscribed;
            }
            state.processing = true;
            state.subscribed
        };

        let result = self.index.toggle(&self.item, current).await;

        let mut state = self.state.lock();
        state.processing = false;
        match result {
            Ok(subscribed) => {
                state.subscribed = subscribed;
                let verb = if subscribed { "Subscribed to" } else { "Unsubscribed from" };
                self.toaster.success(&format!(
                    "{} notifications for this {}",
                    verb, self.item.item_type
                ));
            }
            Err(e) => {
                self.toaster.error(&e.user_message("Failed to update subscription"));
            }
        }
        state.subscribed
    }

    pub fn is_visible(&self) -> bool {
        self.supported && !self.state.lock().loading
    }

    pub fn is_subscribed(&self) -> bool {
        self.state.lock().subscribed
    }

    pub fn is_processing(&self) -> bool {
        self.state.lock().processing
    }

    pub fn title(&self) -> String {
        if self.is_subscribed() {
            format!("Unsubscribe from {} notifications", self.item.item_type)
        } else {
            format!("Subscribe to {} notifications", self.item.item_type)
        }
    }
}
