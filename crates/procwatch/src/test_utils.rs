//! Fakes for unit tests: a scripted process table, a page that records what
//! it was told, and a notifier that keeps what it was asked to show.

#![cfg(test)]

use crate::notification::{Notification, NotificationSink};
use crate::page::{PageId, PageSink, PageStatusFlags};
use crate::snapshot::{ProcessId, ProcessSnapshot, ProcessSource, RawProcessInfo};
use anyhow::{bail, Result};
use parking_lot::Mutex;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub fn pid(raw: u32) -> ProcessId {
    ProcessId::new(raw)
}

pub fn info(parent: u32, privileged: bool) -> RawProcessInfo {
    RawProcessInfo::new(parent, privileged)
}

// ============================================================================
// Process table
// ============================================================================

/// Process source whose table is edited by the test.
#[derive(Default)]
pub struct FakeProcessSource {
    table: Mutex<ProcessSnapshot>,
    command_lines: Mutex<HashMap<ProcessId, String>>,
    fail: AtomicBool,
    captures: AtomicUsize,
    command_line_lookups: AtomicUsize,
}

impl FakeProcessSource {
    pub fn with_table<I>(entries: I) -> Arc<Self>
    where
        I: IntoIterator<Item = (u32, RawProcessInfo)>,
    {
        let source = Self::default();
        *source.table.lock() = entries
            .into_iter()
            .map(|(raw, info)| (pid(raw), info))
            .collect();
        Arc::new(source)
    }

    pub fn insert(&self, raw: u32, info: RawProcessInfo) {
        self.table.lock().insert(pid(raw), info);
    }

    pub fn remove(&self, raw: u32) {
        self.table.lock().remove(pid(raw));
    }

    pub fn set_command_line(&self, raw: u32, command: &str) {
        self.command_lines
            .lock()
            .insert(pid(raw), command.to_string());
    }

    /// Make every following capture fail (or succeed again).
    pub fn fail_captures(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }

    pub fn command_line_lookups(&self) -> usize {
        self.command_line_lookups.load(Ordering::SeqCst)
    }
}

impl ProcessSource for FakeProcessSource {
    fn capture(&self) -> Result<ProcessSnapshot> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            bail!("scripted capture failure");
        }
        Ok(self.table.lock().clone())
    }

    fn inspect(&self, pid: ProcessId) -> Option<RawProcessInfo> {
        self.table.lock().get(pid).copied()
    }

    fn command_line(&self, pid: ProcessId) -> Option<String> {
        self.command_line_lookups.fetch_add(1, Ordering::SeqCst);
        self.command_lines.lock().get(&pid).cloned()
    }
}

// ============================================================================
// Pages and notifications
// ============================================================================

/// Page that remembers every status it was handed.
pub struct RecordingPage {
    id: PageId,
    active: Cell<bool>,
    statuses: RefCell<Vec<PageStatusFlags>>,
}

impl RecordingPage {
    /// Active by default, like a freshly opened tab.
    pub fn new(id: u32) -> Rc<Self> {
        Rc::new(Self {
            id: PageId::new(id),
            active: Cell::new(true),
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

impl PageSink for RecordingPage {
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
pub struct RecordingNotifier {
    sent: RefCell<Vec<Notification>>,
    withdrawn: RefCell<Vec<String>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.borrow().clone()
    }

    pub fn withdrawn(&self) -> Vec<String> {
        self.withdrawn.borrow().clone()
    }
}

impl NotificationSink for RecordingNotifier {
    fn send(&self, notification: &Notification) {
        self.sent.borrow_mut().push(notification.clone());
    }

    fn withdraw(&self, id: &str) {
        self.withdrawn.borrow_mut().push(id.to_string());
    }
}
