//! User-facing notifications.
//!
//! Notifications are best effort. Without a sink the only difference is that
//! nothing is surfaced beyond the log.

use tracing::{error, info, warn};

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    /// Something completed.
    Success,
    /// Something completed with problems.
    Warning,
    /// Something failed.
    Error,
}

/// Receives notifications.
pub trait Notifier: Send + Sync {
    /// Surfaces `message` at `level`.
    fn notify(&self, level: NotificationLevel, message: &str);
}

/// Forwards notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, level: NotificationLevel, message: &str) {
        match level {
            NotificationLevel::Success => info!("{message}"),
            NotificationLevel::Warning => warn!("{message}"),
            NotificationLevel::Error => error!("{message}"),
        }
    }
}
