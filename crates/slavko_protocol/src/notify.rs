//! Toast-style notification seam.
//!
//! Subscribers that react to protocol events surface one-line notices to
//! the user through this trait. Consumers are pure: nothing feeds back
//! into the core.

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

impl ToastLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToastLevel::Info => "info",
            ToastLevel::Success => "success",
            ToastLevel::Error => "error",
        }
    }
}

/// One-line notification sink.
pub trait Notifier: Send + Sync {
    fn toast(&self, level: ToastLevel, message: &str);
}

/// Routes notifications into the tracing pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn toast(&self, level: ToastLevel, message: &str) {
        match level {
            ToastLevel::Error => tracing::warn!(target: "toast", "{message}"),
            _ => tracing::info!(target: "toast", "{message}"),
        }
    }
}

/// Swallows notifications. Useful in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn toast(&self, _level: ToastLevel, _message: &str) {}
}
