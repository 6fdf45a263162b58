//! Pages without a UI: one per watched shell, reporting through the log.

use procwatch::{PageId, PageSink, PageStatusFlags, ProcessId};
use std::cell::Cell;
use tracing::info;

pub struct HeadlessPage {
    id: PageId,
    shell: ProcessId,
    active: Cell<bool>,
    status: Cell<PageStatusFlags>,
}

impl HeadlessPage {
    pub fn new(id: PageId, shell: ProcessId, active: bool) -> Self {
        Self {
            id,
            shell,
            active: Cell::new(active),
            status: Cell::new(PageStatusFlags::NONE),
        }
    }

    pub fn shell(&self) -> ProcessId {
        self.shell
    }

    pub fn status(&self) -> PageStatusFlags {
        self.status.get()
    }
}

impl PageSink for HeadlessPage {
    fn id(&self) -> PageId {
        self.id
    }

    fn is_active(&self) -> bool {
        self.active.get()
    }

    fn status_changed(&self, status: PageStatusFlags) {
        self.status.set(status);
        info!("Page {} (shell {}) is now {}", self.id, self.shell, status);
    }
}
