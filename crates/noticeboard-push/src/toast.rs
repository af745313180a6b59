use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
}

/// Short user-facing notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
}

/// Where user-facing notices go.
pub trait Toaster: Send + Sync {
    fn show(&self, toast: Toast);

    fn success(&self, message: &str) {
        self.show(Toast {
            kind: ToastKind::Success,
            message: message.to_string(),
        });
    }

    fn error(&self, message: &str) {
        self.show(Toast {
            kind: ToastKind::Error,
            message: message.to_string(),
        });
    }
}

/// Writes toasts to the `tracing` log.
pub struct LogToaster;

impl Toaster for LogToaster {
    fn show(&self, toast: Toast) {
        match toast.kind {
            ToastKind::Success => tracing::info!(target: "noticeboard::toast", "{}", toast.message),
            ToastKind::Error => tracing::warn!(target: "noticeboard::toast", "{}", toast.message),
        }
    }
}

/// Keeps every toast for inspection.
#[derive(Default)]
pub struct MemoryToaster {
    toasts: Mutex<Vec<Toast>>,
}

impl MemoryToaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.lock().clone()
    }

    pub fn last(&self) -> Option<Toast> {
        self.toasts.lock().last().cloned()
    }

    pub fn errors(&self) -> Vec<String> {
        self.toasts
            .lock()
            .iter()
            .filter(|t| t.kind == ToastKind::Error)
            .map(|t| t.message.clone())
            .collect()
    }
}

impl Toaster for MemoryToaster {
    fn show(&self, toast: Toast) {
        self.toasts.lock().push(toast);
    }
}
