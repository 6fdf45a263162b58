//! Desktop notification delivery.
//!
//! Notifications are handed to the desktop's own tooling: `notify-send` on
//! Linux and `osascript` on macOS. Other platforms get no-op stubs. Delivery
//! is fire-and-forget; failures are logged and never returned to callers.

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "linux")]
pub use linux::*;
#[cfg(target_os = "macos")]
pub use macos::*;

use procwatch::{Notification, NotificationSink};
use tracing::debug;

// No-op stubs for platforms without a notification backend
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub fn send_notification(_id: &str, _title: &str, _body: &str) {}
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub fn withdraw_notification(_id: &str) {}

/// [`NotificationSink`] backed by the platform notification service.
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopNotifier;

impl NotificationSink for DesktopNotifier {
    fn send(&self, notification: &Notification) {
        debug!(
            "Notification {} activates {} for page {}",
            notification.id,
            notification.default_action.name(),
            notification.default_action.target()
        );
        send_notification(
            &notification.id,
            &notification.title,
            notification.body.as_deref().unwrap_or_default(),
        );
    }

    fn withdraw(&self, id: &str) {
        withdraw_notification(id);
    }
}
