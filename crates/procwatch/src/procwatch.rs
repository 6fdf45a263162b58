//! Per-page child process tracking for terminal tabs.
//!
//! Each page (tab) runs a shell. The host registers that shell's pid with
//! [`ProcessWatcher::add_watch`]; a [`PollScheduler`] then samples the process
//! table periodically and keeps, for every page:
//!
//! - the processes started directly by its shell,
//! - whether any of them runs as another user ([`PageStatusFlags::PRIVILEGED`]),
//! - whether any of them looks like a remote login ([`PageStatusFlags::REMOTE`]).
//!
//! When the last tracked process of a page that is not in front exits, a
//! "command completed" notification is raised through the host's
//! [`NotificationSink`].

mod notification;
mod page;
mod record;
mod registry;
mod schedule;
mod snapshot;
mod watcher;

#[cfg(test)]
mod test_utils;

pub use notification::{completion_notification_id, Notification, NotificationSink, PageAction};
pub use page::{PageId, PageSink, PageStatus, PageStatusFlags, PopOutcome};
pub use record::ProcessRecord;
pub use registry::{DescendantEntry, WatchEntry, WatchRegistry};
pub use schedule::{PollScheduler, RepeatingTask};
pub use snapshot::{
    default_source, NullProcessSource, ProcessId, ProcessSnapshot, ProcessSource, RawProcessInfo,
    SystemProcessSource,
};
pub use watcher::{ProcessWatcher, TickReport, WatchOptions};
