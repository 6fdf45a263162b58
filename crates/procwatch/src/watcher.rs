//! The reconciliation step that ties the process table to pages.
//!
//! [`ProcessWatcher::tick`] compares a fresh snapshot against what is already
//! known. A process is attributed to a page when its **immediate parent** is
//! that page's shell, or a descendant recorded on an earlier tick. Ancestry
//! therefore advances one level per tick: a child and grandchild appearing
//! together are attributed on consecutive ticks. Processes that vanish from
//! the table are popped from their page.

use crate::notification::{completion_notification_id, Notification, NotificationSink, PageAction};
use crate::page::{PageId, PageSink, PageStatus, PageStatusFlags};
use crate::record::ProcessRecord;
use crate::registry::WatchRegistry;
use crate::snapshot::{ProcessId, ProcessSnapshot, ProcessSource};
use rustc_hash::FxBuildHasher;
use settings::constants::watch;
use settings::WatchConfig;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

type IndexMap<K, V> = indexmap::IndexMap<K, V, FxBuildHasher>;

/// Runtime knobs for the watcher and its scheduler.
#[derive(Clone, Debug, PartialEq)]
pub struct WatchOptions {
    pub focused_interval: Duration,
    pub unfocused_interval: Duration,
    pub remote_prefixes: Vec<String>,
    pub notify_on_completion: bool,
    pub notification_title: String,
}

impl WatchOptions {
    pub fn interval_for(&self, focused: bool) -> Duration {
        if focused {
            self.focused_interval
        } else {
            self.unfocused_interval
        }
    }
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            focused_interval: watch::FOCUSED_INTERVAL,
            unfocused_interval: watch::UNFOCUSED_INTERVAL,
            remote_prefixes: watch::REMOTE_PREFIXES
                .iter()
                .map(|prefix| prefix.to_string())
                .collect(),
            notify_on_completion: true,
            notification_title: watch::NOTIFICATION_TITLE.to_string(),
        }
    }
}

impl From<&WatchConfig> for WatchOptions {
    fn from(config: &WatchConfig) -> Self {
        Self {
            focused_interval: config.focused_interval(),
            unfocused_interval: config.unfocused_interval(),
            remote_prefixes: config.remote_prefixes.clone(),
            notify_on_completion: config.notify_on_completion,
            notification_title: config.notification_title.clone(),
        }
    }
}

/// What one tick changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub spawned: Vec<ProcessId>,
    pub exited: Vec<ProcessId>,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.spawned.is_empty() && self.exited.is_empty()
    }
}

struct PageSlot {
    sink: Rc<dyn PageSink>,
    status: PageStatus,
}

/// Owner of the registry, the page arena and the process source.
///
/// Lives on the UI thread; nothing in here is locked.
pub struct ProcessWatcher {
    source: Arc<dyn ProcessSource>,
    notifier: Rc<dyn NotificationSink>,
    registry: WatchRegistry,
    pages: IndexMap<PageId, PageSlot>,
    options: WatchOptions,
    remote_prefixes: Arc<[String]>,
}

impl ProcessWatcher {
    pub fn new(
        source: Arc<dyn ProcessSource>,
        notifier: Rc<dyn NotificationSink>,
        options: WatchOptions,
    ) -> Self {
        if !source.is_supported() {
            debug!("Process source unsupported, watcher is inert");
        }

        let remote_prefixes: Arc<[String]> = Arc::from(options.remote_prefixes.clone());

        Self {
            source,
            notifier,
            registry: WatchRegistry::new(),
            pages: IndexMap::default(),
            options,
            remote_prefixes,
        }
    }

    pub fn options(&self) -> &WatchOptions {
        &self.options
    }

    pub fn registry(&self) -> &WatchRegistry {
        &self.registry
    }

    /// Make `page` known without watching anything for it yet.
    pub fn add_page(&mut self, page: Rc<dyn PageSink>) {
        let id = page.id();
        match self.pages.get_mut(&id) {
            Some(slot) => slot.sink = page,
            None => {
                self.pages.insert(
                    id,
                    PageSlot {
                        sink: page,
                        status: PageStatus::new(self.remote_prefixes.clone()),
                    },
                );
            }
        }
    }

    /// Start watching `pid`, the shell spawned for `page`.
    ///
    /// Must be called once per spawned shell. A pid that is already watched is
    /// rejected with a warning and `false`.
    pub fn add_watch(&mut self, pid: ProcessId, page: Rc<dyn PageSink>) -> bool {
        let process = ProcessRecord::create(pid, self.source.clone());
        if !self.registry.add_watch(pid, page.id(), process) {
            return false;
        }

        self.add_page(page);
        true
    }

    /// Stop watching `pid`. Its descendants stay attributed to the page.
    pub fn remove_watch(&mut self, pid: ProcessId) -> bool {
        self.registry.remove_watch(pid)
    }

    /// Tear down everything belonging to `page`: its roots, its descendants
    /// and its pending completion notification.
    pub fn remove_page(&mut self, page: PageId) {
        let dropped = self.registry.forget_page(page);
        if !dropped.is_empty() {
            debug!("Forgot {} children of page {}", dropped.len(), page);
        }

        if self.pages.shift_remove(&page).is_none() {
            warn!("Unknown page {}", page);
            return;
        }

        self.notifier.withdraw(&completion_notification_id(page));
    }

    /// Resolve the target of a "focus page" action.
    pub fn lookup_page(&self, page: PageId) -> Option<Rc<dyn PageSink>> {
        self.pages.get(&page).map(|slot| slot.sink.clone())
    }

    pub fn page_status(&self, page: PageId) -> Option<PageStatusFlags> {
        self.pages.get(&page).map(|slot| slot.status.status())
    }

    /// Processes currently running under `page`, oldest first. Excludes the
    /// shell itself.
    pub fn page_children(&self, page: PageId) -> Vec<ProcessRecord> {
        self.pages
            .get(&page)
            .map(|slot| slot.status.children().cloned().collect())
            .unwrap_or_default()
    }

    pub fn page_ids(&self) -> impl Iterator<Item = PageId> + '_ {
        self.pages.keys().copied()
    }

    /// One reconciliation pass against the live process table.
    pub fn tick(&mut self) -> TickReport {
        let snapshot = match self.source.capture() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Failed to read process table: {:#}", e);
                ProcessSnapshot::new()
            }
        };

        self.reconcile(&snapshot)
    }

    /// Apply `snapshot`: push newly seen children of watched shells, then pop
    /// descendants that are no longer listed.
    pub fn reconcile(&mut self, snapshot: &ProcessSnapshot) -> TickReport {
        let mut report = TickReport::default();

        for (pid, info) in snapshot.iter() {
            let Some(parent) = info.parent_pid else {
                continue;
            };
            if self.registry.is_descendant(pid) {
                continue;
            }
            // Far more processes exist than children of shells, so this misses
            // almost always.
            let Some(page) = self.owner_of_parent(parent, &report.spawned) else {
                continue;
            };

            let process = ProcessRecord::from_info(pid, *info, self.source.clone());
            debug!("Hello {}!", pid);

            self.registry.insert_descendant(pid, page, process.clone());
            self.push_child(page, process);
            report.spawned.push(pid);
        }

        // Collect first: the descendant table can't change while it is walked.
        let dead: Vec<ProcessId> = self
            .registry
            .descendants()
            .filter(|(pid, _)| !snapshot.contains(*pid))
            .map(|(pid, _)| pid)
            .collect();

        for pid in dead {
            let Some(entry) = self.registry.descendant(pid).cloned() else {
                continue;
            };
            debug!("{} marked as dead", pid);

            self.pop_child(entry.page, &entry.process);
            self.registry.remove_descendant(pid);
            report.exited.push(pid);
        }

        report
    }

    /// Page owning `parent`, ignoring descendants found during this tick.
    fn owner_of_parent(&self, parent: ProcessId, spawned: &[ProcessId]) -> Option<PageId> {
        if let Some(watch) = self.registry.find_watch_entry(parent) {
            return Some(watch.page);
        }
        if spawned.contains(&parent) {
            return None;
        }
        self.registry.lookup_owner_for_descendant(parent)
    }

    fn push_child(&mut self, page: PageId, process: ProcessRecord) {
        let Some(slot) = self.pages.get_mut(&page) else {
            warn!("Child {} for unknown page {}", process.pid(), page);
            return;
        };

        if let Some(status) = slot.status.push_child(process) {
            debug!("Page {} now {}", page, status);
            slot.sink.status_changed(status);
        }
    }

    fn pop_child(&mut self, page: PageId, process: &ProcessRecord) {
        let Some(slot) = self.pages.get_mut(&page) else {
            debug!("Child {} of departed page {}", process.pid(), page);
            return;
        };

        let outcome = slot.status.pop_child(process);
        if let Some(status) = outcome.status_changed {
            debug!("Page {} now {}", page, status);
            slot.sink.status_changed(status);
        }

        if !outcome.drained || !self.options.notify_on_completion || slot.sink.is_active() {
            return;
        }

        let notification = Notification {
            id: completion_notification_id(page),
            title: self.options.notification_title.clone(),
            body: process.command_line().map(str::to_owned),
            default_action: PageAction::FocusPage(page),
        };
        self.notifier.send(&notification);
    }
}
