//! Shared fixtures for the watcher scenario tests.

// Not every scenario file uses every helper.
#![allow(dead_code)]

use parking_lot::Mutex;
use procwatch::{
    Notification, NotificationSink, PageId, PageSink, PageStatusFlags, ProcessId,
    ProcessSnapshot, ProcessSource, ProcessWatcher, RawProcessInfo, WatchOptions,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

pub fn pid(raw: u32) -> ProcessId {
    ProcessId::new(raw)
}

// ============================================================================
// Scripted process table
// ============================================================================

#[derive(Default)]
pub struct ScriptedTable {
    table: Mutex<ProcessSnapshot>,
    command_lines: Mutex<HashMap<ProcessId, String>>,
}

impl ScriptedTable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add `raw` as a child of `parent`.
    pub fn spawn(&self, raw: u32, parent: u32) {
        self.table
            .lock()
            .insert(pid(raw), RawProcessInfo::new(parent, false));
    }

    pub fn spawn_privileged(&self, raw: u32, parent: u32) {
        self.table
            .lock()
            .insert(pid(raw), RawProcessInfo::new(parent, true));
    }

    pub fn spawn_command(&self, raw: u32, parent: u32, command: &str) {
        self.spawn(raw, parent);
        self.command_lines
            .lock()
            .insert(pid(raw), command.to_string());
    }

    pub fn exit(&self, raw: u32) {
        self.table.lock().remove(pid(raw));
    }
}

impl ProcessSource for ScriptedTable {
    fn capture(&self) -> anyhow::Result<ProcessSnapshot> {
        Ok(self.table.lock().clone())
    }

    fn inspect(&self, pid: ProcessId) -> Option<RawProcessInfo> {
        self.table.lock().get(pid).copied()
    }

    fn command_line(&self, pid: ProcessId) -> Option<String> {
        self.command_lines.lock().get(&pid).cloned()
    }
}

// ============================================================================
// Host doubles
// ============================================================================

pub struct TestPage {
    id: PageId,
    active: Cell<bool>,
    statuses: RefCell<Vec<PageStatusFlags>>,
}

impl TestPage {
    pub fn active(id: u32) -> Rc<Self> {
        Self::with_active(id, true)
    }

    pub fn background(id: u32) -> Rc<Self> {
        Self::with_active(id, false)
    }

    fn with_active(id: u32, active: bool) -> Rc<Self> {
        Rc::new(Self {
            id: PageId::new(id),
            active: Cell::new(active),
            statuses: RefCell::new(Vec::new()),
        })
    }

    pub fn set_active(&self, active: bool) {
        self.active.set(active);
    }

    pub fn statuses(&self) -> Vec<PageStatusFlags> {
        self.statuses.borrow().clone()
    }
}

impl PageSink for TestPage {
    fn id(&self) -> PageId {
        self.id
    }

    fn is_active(&self) -> bool {
        self.active.get()
    }

    fn status_changed(&self, status: PageStatusFlags) {
        self.statuses.borrow_mut().push(status);
    }
}

#[derive(Default)]
pub struct TestNotifier {
    pub sent: RefCell<Vec<Notification>>,
    pub withdrawn: RefCell<Vec<String>>,
}

impl NotificationSink for TestNotifier {
    fn send(&self, notification: &Notification) {
        self.sent.borrow_mut().push(notification.clone());
    }

    fn withdraw(&self, id: &str) {
        self.withdrawn.borrow_mut().push(id.to_string());
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub table: Arc<ScriptedTable>,
    pub notifier: Rc<TestNotifier>,
    pub watcher: ProcessWatcher,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(WatchOptions::default())
    }

    pub fn with_options(options: WatchOptions) -> Self {
        let table = ScriptedTable::new();
        let notifier = Rc::new(TestNotifier::default());
        let watcher = ProcessWatcher::new(table.clone(), notifier.clone(), options);
        Self {
            table,
            notifier,
            watcher,
        }
    }

    /// Spawn a shell for `page` and watch it.
    pub fn open_page(&mut self, shell: u32, page: Rc<TestPage>) {
        self.table.spawn(shell, 1);
        assert!(self.watcher.add_watch(pid(shell), page));
    }

    pub fn owner_of(&self, raw: u32) -> Option<PageId> {
        self.watcher
            .registry()
            .lookup_owner_for_descendant(pid(raw))
    }

    pub fn sent_ids(&self) -> Vec<String> {
        self.notifier
            .sent
            .borrow()
            .iter()
            .map(|notification| notification.id.clone())
            .collect()
    }
}
