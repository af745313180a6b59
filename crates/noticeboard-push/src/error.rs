use thiserror::Error;

use noticeboard_types::ItemRef;

use crate::platform::Capability;

/// Failure reported by the browser side: worker registration, push manager,
/// or the push service behind it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("runtime does not provide {0}")]
    Unavailable(Capability),

    #[error("no active service worker registration")]
    NoRegistration,

    #[error("subscription was revoked before it could be used")]
    Revoked,

    /// A rejected platform promise, named like the DOMException it carries.
    #[error("{name}: {message}")]
    Rejected { name: String, message: String },
}

impl PlatformError {
    pub fn rejected(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Failure talking to the `/api/push` backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("invalid backend url: {0}")]
    InvalidUrl(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server responded with status {status}{}", .message.as_deref().map(|m| format!(": {}", m)).unwrap_or_default())]
    Status { status: u16, message: Option<String> },
}

impl BackendError {
    pub fn status(status: u16, message: Option<&str>) -> Self {
        Self::Status {
            status,
            message: message.map(str::to_string),
        }
    }

    /// Message the server put in its error body, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum PushError {
    #[error("This browser does not support {0}")]
    Unsupported(Capability),

    #[error("Notification permission denied")]
    PermissionDenied,

    #[error("Notification permission not granted")]
    PermissionRequired,

    #[error("failed to fetch VAPID public key: {0}")]
    KeyFetch(#[source] BackendError),

    #[error("invalid VAPID public key: {0}")]
    InvalidVapidKey(String),

    #[error("service worker is not available: {0}")]
    WorkerRegistration(#[source] PlatformError),

    #[error("push subscription failed: {0}")]
    PlatformSubscribe(#[source] PlatformError),

    #[error("push unsubscribe failed: {0}")]
    PlatformUnsubscribe(#[source] PlatformError),

    /// The platform side succeeded but the backend mirror call did not.
    #[error("{operation} was not recorded by the server: {source}")]
    BackendSync {
        operation: &'static str,
        #[source]
        source: BackendError,
    },

    #[error("failed to subscribe to {item}: {source}")]
    ItemSubscribe {
        item: ItemRef,
        #[source]
        source: BackendError,
    },

    #[error("failed to unsubscribe from {item}: {source}")]
    ItemUnsubscribe {
        item: ItemRef,
        #[source]
        source: BackendError,
    },

    #[error("background task failed: {0}")]
    Task(String),
}

impl PushError {
    /// Whether re-invoking the same operation can succeed without the user
    /// changing anything outside the app.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unsupported(_)
            | Self::PermissionDenied
            | Self::PermissionRequired
            | Self::InvalidVapidKey(_) => false,
            Self::KeyFetch(_)
            | Self::WorkerRegistration(_)
            | Self::PlatformSubscribe(_)
            | Self::PlatformUnsubscribe(_)
            | Self::BackendSync { .. }
            | Self::ItemSubscribe { .. }
            | Self::ItemUnsubscribe { .. }
            | Self::Task(_) => true,
        }
    }

    /// Text for a user-facing toast. Server-provided messages win; capability
    /// and permission errors describe themselves; everything else gets `default`.
    pub fn user_message(&self, default: &str) -> String {
        match self {
            Self::Unsupported(_) | Self::PermissionDenied | Self::PermissionRequired => self.to_string(),
            Self::KeyFetch(source)
            | Self::BackendSync { source, .. }
            | Self::ItemSubscribe { source, .. }
            | Self::ItemUnsubscribe { source, .. } => source
                .server_message()
                .map(str::to_string)
                .unwrap_or_else(|| default.to_string()),
            _ => default.to_string(),
        }
    }

    /// Item the failed operation was about, for log context.
    pub fn item(&self) -> Option<&ItemRef> {
        match self {
            Self::ItemSubscribe { item, .. } | Self::ItemUnsubscribe { item, .. } => Some(item),
            _ => None,
        }
    }
}
