//! User-facing toast notifications
//!
//! Services surface every mutation outcome through this seam so the UI
//! layer can render non-blocking toasts. Failures to notify never fail
//! the operation that produced them.

use tracing::{error, info};

/// Toast severity, mapped to the UI's default/destructive variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
}

/// A short user-visible notification
#[derive(Debug, Clone)]
pub struct Toast {
    pub title: String,
    pub message: Option<String>,
    pub severity: Severity,
}

impl Toast {
    pub fn success(title: &str) -> Self {
        Self {
            title: title.to_string(),
            message: None,
            severity: Severity::Success,
        }
    }

    pub fn success_with_message(title: &str, message: &str) -> Self {
        Self {
            title: title.to_string(),
            message: Some(message.to_string()),
            severity: Severity::Success,
        }
    }

    pub fn error(title: &str, message: &str) -> Self {
        Self {
            title: title.to_string(),
            message: Some(message.to_string()),
            severity: Severity::Error,
        }
    }
}

/// Sink for user-facing toasts. Implementations must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);
}

/// Default sink: toasts go to the log
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, toast: Toast) {
        match toast.severity {
            Severity::Error => error!(
                "Toast: {} - {}",
                toast.title,
                toast.message.as_deref().unwrap_or("")
            ),
            _ => info!(
                "Toast: {} - {}",
                toast.title,
                toast.message.as_deref().unwrap_or("")
            ),
        }
    }
}

/// Collects toasts for assertions in tests
#[cfg(test)]
pub struct RecordingNotifier {
    pub toasts: parking_lot::Mutex<Vec<Toast>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            toasts: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn titles(&self) -> Vec<String> {
        self.toasts.lock().iter().map(|t| t.title.clone()).collect()
    }
}

#[cfg(test)]
impl Notifier for RecordingNotifier {
    fn notify(&self, toast: Toast) {
        self.toasts.lock().push(toast);
    }
}
