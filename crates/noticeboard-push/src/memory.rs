//! In-process `Platform` and `PushBackend`.
//!
//! `MemoryPlatform` behaves like a browser with a push service attached:
//! one registration per scope, one subscription per registration, a
//! permission that only moves through the prompt. `MemoryBackend` keeps the
//! device and item relations the real backend would. Both count calls and
//! accept injected failures.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::RngCore;
use uuid::Uuid;

use noticeboard_crypto::{APPLICATION_SERVER_KEY_LEN, encode_vapid_key, is_uncompressed_p256};
use noticeboard_types::{ItemRef, PermissionState, PushKeys, PushSubscription};

use crate::backend::PushBackend;
use crate::error::{BackendError, PlatformError};
use crate::platform::{Capability, Platform, SubscribeOptions, WorkerRegistration};

const PUSH_SERVICE_ORIGIN: &str = "https://push.example.net/send";

fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    rand::rng().fill_bytes(&mut buf);
    buf
}

/// A random uncompressed-P-256-shaped public key in transport form.
pub fn random_vapid_key() -> String {
    let mut key = random_bytes(APPLICATION_SERVER_KEY_LEN);
    key[0] = 0x04;
    encode_vapid_key(&key)
}

fn new_subscription() -> PushSubscription {
    let mut p256dh = random_bytes(APPLICATION_SERVER_KEY_LEN);
    p256dh[0] = 0x04;
    PushSubscription {
        endpoint: format!("{}/{}", PUSH_SERVICE_ORIGIN, Uuid::new_v4()),
        expiration_time: None,
        keys: PushKeys {
            p256dh: encode_vapid_key(&p256dh),
            auth: encode_vapid_key(&random_bytes(16)),
        },
    }
}

// ── Platform ────────────────────────────────────────────────────────────

struct PlatformState {
    missing: HashSet<Capability>,
    permission: PermissionState,
    prompt_answer: PermissionState,
    prompts: usize,
    registrations: Vec<WorkerRegistration>,
    register_calls: usize,
    registration_failure: Option<PlatformError>,
    subscription: Option<(PushSubscription, Vec<u8>)>,
    subscribe_calls: usize,
    subscribe_failure: Option<PlatformError>,
    unsubscribe_calls: usize,
    unsubscribe_failure: Option<PlatformError>,
    last_options: Option<SubscribeOptions>,
}

/// Browser stand-in. Starts with every capability, permission `default`,
/// and a user who accepts the prompt.
pub struct MemoryPlatform {
    state: Mutex<PlatformState>,
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PlatformState {
                missing: HashSet::new(),
                permission: PermissionState::Default,
                prompt_answer: PermissionState::Granted,
                prompts: 0,
                registrations: Vec::new(),
                register_calls: 0,
                registration_failure: None,
                subscription: None,
                subscribe_calls: 0,
                subscribe_failure: None,
                unsubscribe_calls: 0,
                unsubscribe_failure: None,
                last_options: None,
            }),
        }
    }

    pub fn without(self, capability: Capability) -> Self {
        self.state.lock().missing.insert(capability);
        self
    }

    pub fn with_permission(self, permission: PermissionState) -> Self {
        self.state.lock().permission = permission;
        self
    }

    /// What the user picks when the prompt is shown.
    pub fn answer_prompt_with(self, answer: PermissionState) -> Self {
        self.state.lock().prompt_answer = answer;
        self
    }

    /// A browser that subscribed during an earlier page load: permission is
    /// granted and the push manager already holds a subscription.
    pub fn with_existing_subscription(self) -> Self {
        {
            let mut state = self.state.lock();
            state.permission = PermissionState::Granted;
            state.subscription = Some((new_subscription(), Vec::new()));
        }
        self
    }

    pub fn fail_next_registration(&self, err: PlatformError) {
        self.state.lock().registration_failure = Some(err);
    }

    pub fn fail_next_subscribe(&self, err: PlatformError) {
        self.state.lock().subscribe_failure = Some(err);
    }

    pub fn fail_next_unsubscribe(&self, err: PlatformError) {
        self.state.lock().unsubscribe_failure = Some(err);
    }

    /// The push service drops the subscription without telling anyone.
    pub fn revoke_silently(&self) {
        self.state.lock().subscription = None;
    }

    pub fn subscription(&self) -> Option<PushSubscription> {
        self.state.lock().subscription.as_ref().map(|(s, _)| s.clone())
    }

    pub fn prompts(&self) -> usize {
        self.state.lock().prompts
    }

    pub fn register_calls(&self) -> usize {
        self.state.lock().register_calls
    }

    pub fn registrations(&self) -> Vec<WorkerRegistration> {
        self.state.lock().registrations.clone()
    }

    pub fn subscribe_calls(&self) -> usize {
        self.state.lock().subscribe_calls
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.state.lock().unsubscribe_calls
    }

    /// Options passed to the most recent platform subscribe call.
    pub fn last_subscribe_options(&self) -> Option<SubscribeOptions> {
        self.state.lock().last_options.clone()
    }
}

#[async_trait]
impl Platform for MemoryPlatform {
    fn supports(&self, capability: Capability) -> bool {
        !self.state.lock().missing.contains(&capability)
    }

    fn permission(&self) -> PermissionState {
        self.state.lock().permission
    }

    async fn request_permission(&self) -> PermissionState {
        let mut state = self.state.lock();
        state.prompts += 1;
        if state.permission == PermissionState::Default {
            state.permission = state.prompt_answer;
        }
        state.permission
    }

    async fn register_worker(
        &self,
        script_url: &str,
        scope: &str,
    ) -> Result<WorkerRegistration, PlatformError> {
        let mut state = self.state.lock();
        state.register_calls += 1;
        if state.missing.contains(&Capability::ServiceWorker) {
            return Err(PlatformError::Unavailable(Capability::ServiceWorker));
        }
        if let Some(err) = state.registration_failure.take() {
            return Err(err);
        }
        if let Some(existing) = state.registrations.iter().find(|r| r.scope == scope) {
            return Ok(existing.clone());
        }
        let registration = WorkerRegistration {
            script_url: script_url.to_string(),
            scope: scope.to_string(),
        };
        state.registrations.push(registration.clone());
        Ok(registration)
    }

    async fn ready(&self) -> Result<WorkerRegistration, PlatformError> {
        let state = self.state.lock();
        if state.missing.contains(&Capability::ServiceWorker) {
            return Err(PlatformError::Unavailable(Capability::ServiceWorker));
        }
        state
            .registrations
            .first()
            .cloned()
            .ok_or(PlatformError::NoRegistration)
    }

    async fn get_subscription(
        &self,
        _registration: &WorkerRegistration,
    ) -> Result<Option<PushSubscription>, PlatformError> {
        let state = self.state.lock();
        if state.missing.contains(&Capability::PushManager) {
            return Err(PlatformError::Unavailable(Capability::PushManager));
        }
        Ok(state.subscription.as_ref().map(|(s, _)| s.clone()))
    }

    async fn subscribe(
        &self,
        _registration: &WorkerRegistration,
        options: &SubscribeOptions,
    ) -> Result<PushSubscription, PlatformError> {
        let mut state = self.state.lock();
        state.subscribe_calls += 1;
        state.last_options = Some(options.clone());

        if state.missing.contains(&Capability::PushManager) {
            return Err(PlatformError::Unavailable(Capability::PushManager));
        }
        if let Some(err) = state.subscribe_failure.take() {
            return Err(err);
        }
        if state.permission != PermissionState::Granted {
            return Err(PlatformError::rejected(
                "NotAllowedError",
                "Registration failed - permission denied",
            ));
        }
        if !is_uncompressed_p256(&options.application_server_key) {
            return Err(PlatformError::rejected(
                "InvalidAccessError",
                "applicationServerKey is not valid",
            ));
        }

        let subscription = match state.subscription.take() {
            // Keyless entries come from an earlier page load; adopt them.
            Some((existing, key)) if key.is_empty() || key == options.application_server_key => existing,
            Some(other) => {
                state.subscription = Some(other);
                return Err(PlatformError::rejected(
                    "InvalidStateError",
                    "A subscription with a different applicationServerKey already exists",
                ));
            }
            None => new_subscription(),
        };
        state.subscription = Some((subscription.clone(), options.application_server_key.clone()));
        Ok(subscription)
    }

    async fn unsubscribe(&self, subscription: &PushSubscription) -> Result<bool, PlatformError> {
        let mut state = self.state.lock();
        state.unsubscribe_calls += 1;
        if let Some(err) = state.unsubscribe_failure.take() {
            return Err(err);
        }
        let matches = state
            .subscription
            .as_ref()
            .is_some_and(|(s, _)| s.endpoint == subscription.endpoint);
        if matches {
            state.subscription = None;
        }
        Ok(matches)
    }
}

// ── Backend ─────────────────────────────────────────────────────────────

/// Backend routes, for call accounting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    VapidPublicKey,
    Subscribe,
    Unsubscribe,
    SubscribeItem,
    UnsubscribeItem,
    CheckSubscription,
}

/// A request the backend received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    VapidPublicKey,
    Subscribe { endpoint: String },
    Unsubscribe { endpoint: String },
    SubscribeItem { endpoint: String, item: ItemRef },
    UnsubscribeItem { endpoint: String, item: ItemRef },
    CheckSubscription { endpoint: String, item: ItemRef },
}

impl BackendCall {
    pub fn route(&self) -> Route {
        match self {
            Self::VapidPublicKey => Route::VapidPublicKey,
            Self::Subscribe { .. } => Route::Subscribe,
            Self::Unsubscribe { .. } => Route::Unsubscribe,
            Self::SubscribeItem { .. } => Route::SubscribeItem,
            Self::UnsubscribeItem { .. } => Route::UnsubscribeItem,
            Self::CheckSubscription { .. } => Route::CheckSubscription,
        }
    }
}

struct BackendState {
    public_key: String,
    devices: HashMap<String, PushSubscription>,
    items: HashSet<(String, ItemRef)>,
    calls: Vec<BackendCall>,
    failures: HashMap<Route, (u16, Option<String>)>,
    one_shot: HashMap<Route, (u16, Option<String>)>,
}

/// Backend stand-in holding device and item subscriptions.
pub struct MemoryBackend {
    state: Mutex<BackendState>,
    yield_before_reply: bool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_public_key(random_vapid_key())
    }

    pub fn with_public_key(public_key: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(BackendState {
                public_key: public_key.into(),
                devices: HashMap::new(),
                items: HashSet::new(),
                calls: Vec::new(),
                failures: HashMap::new(),
                one_shot: HashMap::new(),
            }),
            yield_before_reply: false,
        }
    }

    /// Suspend once per request before answering, so calls awaited together
    /// interleave the way network round trips do.
    pub fn with_async_replies(mut self) -> Self {
        self.yield_before_reply = true;
        self
    }

    pub fn public_key(&self) -> String {
        self.state.lock().public_key.clone()
    }

    /// Make `route` answer `status` (with an optional error message) until
    /// `recover` is called.
    pub fn fail(&self, route: Route, status: u16, message: Option<&str>) {
        self.state
            .lock()
            .failures
            .insert(route, (status, message.map(str::to_string)));
    }

    /// Fail only the next request to `route`.
    pub fn fail_once(&self, route: Route, status: u16, message: Option<&str>) {
        self.state
            .lock()
            .one_shot
            .insert(route, (status, message.map(str::to_string)));
    }

    pub fn recover(&self, route: Route) {
        let mut state = self.state.lock();
        state.failures.remove(&route);
        state.one_shot.remove(&route);
    }

    async fn reply_later(&self) {
        if self.yield_before_reply {
            tokio::task::yield_now().await;
        }
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().calls.clone()
    }

    pub fn calls_to(&self, route: Route) -> usize {
        self.state.lock().calls.iter().filter(|c| c.route() == route).count()
    }

    pub fn has_device(&self, endpoint: &str) -> bool {
        self.state.lock().devices.contains_key(endpoint)
    }

    pub fn device_count(&self) -> usize {
        self.state.lock().devices.len()
    }

    pub fn has_item(&self, endpoint: &str, item: &ItemRef) -> bool {
        self.state
            .lock()
            .items
            .contains(&(endpoint.to_string(), item.clone()))
    }

    pub fn item_count(&self) -> usize {
        self.state.lock().items.len()
    }

    fn record(&self, call: BackendCall) -> Result<parking_lot::MutexGuard<'_, BackendState>, BackendError> {
        let mut state = self.state.lock();
        let route = call.route();
        state.calls.push(call);
        if let Some((status, message)) = state.one_shot.remove(&route) {
            return Err(BackendError::status(status, message.as_deref()));
        }
        if let Some((status, message)) = state.failures.get(&route) {
            return Err(BackendError::status(*status, message.as_deref()));
        }
        Ok(state)
    }
}

#[async_trait]
impl PushBackend for MemoryBackend {
    async fn vapid_public_key(&self) -> Result<String, BackendError> {
        self.reply_later().await;
        let state = self.record(BackendCall::VapidPublicKey)?;
        Ok(state.public_key.clone())
    }

    async fn subscribe(&self, subscription: &PushSubscription) -> Result<(), BackendError> {
        self.reply_later().await;
        let mut state = self.record(BackendCall::Subscribe {
            endpoint: subscription.endpoint.clone(),
        })?;
        state
            .devices
            .insert(subscription.endpoint.clone(), subscription.clone());
        Ok(())
    }

    async fn unsubscribe(&self, endpoint: &str) -> Result<(), BackendError> {
        self.reply_later().await;
        let mut state = self.record(BackendCall::Unsubscribe {
            endpoint: endpoint.to_string(),
        })?;
        state.devices.remove(endpoint);
        state.items.retain(|(e, _)| e != endpoint);
        Ok(())
    }

    async fn subscribe_item(
        &self,
        subscription: &PushSubscription,
        item: &ItemRef,
    ) -> Result<(), BackendError> {
        self.reply_later().await;
        let mut state = self.record(BackendCall::SubscribeItem {
            endpoint: subscription.endpoint.clone(),
            item: item.clone(),
        })?;
        state
            .devices
            .entry(subscription.endpoint.clone())
            .or_insert_with(|| subscription.clone());
        state.items.insert((subscription.endpoint.clone(), item.clone()));
        Ok(())
    }

    async fn unsubscribe_item(&self, endpoint: &str, item: &ItemRef) -> Result<(), BackendError> {
        self.reply_later().await;
        let mut state = self.record(BackendCall::UnsubscribeItem {
            endpoint: endpoint.to_string(),
            item: item.clone(),
        })?;
        state.items.remove(&(endpoint.to_string(), item.clone()));
        Ok(())
    }

    async fn check_item_subscription(
        &self,
        endpoint: &str,
        item: &ItemRef,
    ) -> Result<bool, BackendError> {
        self.reply_later().await;
        let state = self.record(BackendCall::CheckSubscription {
            endpoint: endpoint.to_string(),
            item: item.clone(),
        })?;
        Ok(state.items.contains(&(endpoint.to_string(), item.clone())))
    }
}
