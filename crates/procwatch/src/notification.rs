//! Desktop notifications raised by the watcher.

use crate::page::PageId;
use settings::constants::watch::NOTIFICATION_ID_PREFIX;

/// What activating a notification should do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageAction {
    /// Bring the page (and its window) to the front.
    FocusPage(PageId),
}

impl PageAction {
    /// Application action name, as registered by the host.
    pub fn name(&self) -> &'static str {
        match self {
            Self::FocusPage(_) => "app.focus-page",
        }
    }

    pub fn target(&self) -> PageId {
        match self {
            Self::FocusPage(page) => *page,
        }
    }
}

/// A user-visible notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    /// Stable key; sending again with the same id replaces the old one.
    pub id: String,
    pub title: String,
    pub body: Option<String>,
    pub default_action: PageAction,
}

/// Delivery of notifications, implemented by the application shell.
#[cfg_attr(test, mockall::automock)]
pub trait NotificationSink {
    fn send(&self, notification: &Notification);
    fn withdraw(&self, id: &str);
}

/// Notification id for "command completed" on `page`.
pub fn completion_notification_id(page: PageId) -> String {
    format!("{}-{}", NOTIFICATION_ID_PREFIX, page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn completion_id_includes_page() {
        assert_eq!(
            completion_notification_id(PageId::new(3)),
            "command-completed-3"
        );
    }

    #[test]
    fn focus_action_targets_page() {
        let action = PageAction::FocusPage(PageId::new(9));
        assert_eq!(action.name(), "app.focus-page");
        assert_eq!(action.target(), PageId::new(9));
    }
}
