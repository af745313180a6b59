//! Structured logging for the push subsystem.
//!
//! Every component reports lifecycle steps and failures as `PushLog`
//! entries tagged with the operation that produced them.

use std::fmt;

use parking_lot::Mutex;

use noticeboard_types::{ItemRef, PermissionState};

use crate::error::PushError;

/// Structured log entry for a push operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushLog {
    pub operation: &'static str,
    pub event: PushEvent,
}

impl PushLog {
    pub fn new(operation: &'static str, event: PushEvent) -> Self {
        Self { operation, event }
    }

    pub fn error(operation: &'static str, err: &PushError) -> Self {
        Self {
            operation,
            event: PushEvent::Error {
                message: err.to_string(),
                item: err.item().cloned(),
            },
        }
    }
}

/// Push lifecycle events that can be logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    /// Runtime lacks something push needs
    Unsupported { capability: String },
    /// Service worker registered (or already was)
    WorkerRegistered { scope: String },
    /// Native permission prompt shown
    PermissionPrompted,
    /// Prompt answered
    PermissionResolved { state: PermissionState },
    /// VAPID key fetched from the backend and cached
    VapidKeyCached,
    /// Device subscription created and recorded by the backend
    DeviceSubscribed { endpoint: String },
    /// Device subscription revoked at the platform
    DeviceUnsubscribed { endpoint: String },
    /// Platform subscription revoked after the backend refused it
    RolledBack { endpoint: String },
    /// Backend forgot the device subscription
    BackendForgot { endpoint: String },
    ItemSubscribed { item: ItemRef },
    ItemUnsubscribed { item: ItemRef },
    /// Error occurred
    Error {
        message: String,
        item: Option<ItemRef>,
    },
}

impl fmt::Display for PushEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported { capability } => write!(f, "unsupported capability={}", capability),
            Self::WorkerRegistered { scope } => write!(f, "worker_registered scope={}", scope),
            Self::PermissionPrompted => write!(f, "permission_prompted"),
            Self::PermissionResolved { state } => write!(f, "permission_resolved state={}", state),
            Self::VapidKeyCached => write!(f, "vapid_key_cached"),
            Self::DeviceSubscribed { endpoint } => write!(f, "device_subscribed endpoint={}", endpoint),
            Self::DeviceUnsubscribed { endpoint } => {
                write!(f, "device_unsubscribed endpoint={}", endpoint)
            }
            Self::RolledBack { endpoint } => write!(f, "rolled_back endpoint={}", endpoint),
            Self::BackendForgot { endpoint } => write!(f, "backend_forgot endpoint={}", endpoint),
            Self::ItemSubscribed { item } => write!(f, "item_subscribed item={}", item),
            Self::ItemUnsubscribed { item } => write!(f, "item_unsubscribed item={}", item),
            Self::Error { message, item: Some(item) } => write!(f, "error item={}: {}", item, message),
            Self::Error { message, item: None } => write!(f, "error: {}", message),
        }
    }
}

/// Sink for push log entries.
pub trait PushLogger: Send + Sync {
    fn log(&self, entry: PushLog);
}

/// Logger that uses the `tracing` crate.
pub struct TracingLogger;

impl PushLogger for TracingLogger {
    fn log(&self, entry: PushLog) {
        match &entry.event {
            PushEvent::Error { .. } | PushEvent::RolledBack { .. } => {
                tracing::warn!(operation = entry.operation, "{}", entry.event);
            }
            PushEvent::WorkerRegistered { .. }
            | PushEvent::DeviceSubscribed { .. }
            | PushEvent::DeviceUnsubscribed { .. }
            | PushEvent::ItemSubscribed { .. }
            | PushEvent::ItemUnsubscribed { .. } => {
                tracing::info!(operation = entry.operation, "{}", entry.event);
            }
            _ => {
                tracing::debug!(operation = entry.operation, "{}", entry.event);
            }
        }
    }
}

/// No-op logger that discards all log entries.
pub struct NullLogger;

impl PushLogger for NullLogger {
    fn log(&self, _entry: PushLog) {}
}

/// Logger that keeps every entry in memory.
#[derive(Default)]
pub struct MemoryLogger {
    entries: Mutex<Vec<PushLog>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<PushLog> {
        self.entries.lock().clone()
    }

    pub fn errors(&self) -> Vec<PushLog> {
        self.entries
            .lock()
            .iter()
            .filter(|e| matches!(e.event, PushEvent::Error { .. }))
            .cloned()
            .collect()
    }
}

impl PushLogger for MemoryLogger {
    fn log(&self, entry: PushLog) {
        self.entries.lock().push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_carries_item() {
        let event = PushEvent::Error {
            message: "server responded with status 500".into(),
            item: Some(ItemRef::event("E1")),
        };
        assert_eq!(event.to_string(), "error item=event/E1: server responded with status 500");
    }

    #[test]
    fn memory_logger_filters_errors() {
        let logger = MemoryLogger::new();
        logger.log(PushLog {
            operation: "subscribe",
            event: PushEvent::PermissionPrompted,
        });
        logger.log(PushLog {
            operation: "subscribe",
            event: PushEvent::Error {
                message: "boom".into(),
                item: None,
            },
        });
        assert_eq!(logger.entries().len(), 2);
        let errors = logger.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].operation, "subscribe");
    }

    #[test]
    fn null_logger_accepts_everything() {
        let logger: Box<dyn PushLogger> = Box::new(NullLogger);
        logger.log(PushLog::error("subscribe", &PushError::PermissionDenied));
        logger.log(PushLog::new("initialize", PushEvent::VapidKeyCached));
    }
}
