//! Per-page child tracking and status aggregation.

use crate::record::ProcessRecord;
use crate::snapshot::ProcessId;
use rustc_hash::FxBuildHasher;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;
use tracing::debug;

type IndexMap<K, V> = indexmap::IndexMap<K, V, FxBuildHasher>;
type IndexSet<T> = indexmap::IndexSet<T, FxBuildHasher>;

/// Stable identifier of a terminal page (tab).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageId(u32);

impl PageId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Aggregate status of a page's descendants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PageStatusFlags(u8);

impl PageStatusFlags {
    pub const NONE: Self = Self(0);
    /// Some descendant runs as another user.
    pub const PRIVILEGED: Self = Self(1 << 0);
    /// Some descendant looks like a remote login session.
    pub const REMOTE: Self = Self(1 << 1);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for PageStatusFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for PageStatusFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for PageStatusFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (
            self.contains(Self::PRIVILEGED),
            self.contains(Self::REMOTE),
        ) {
            (false, false) => write!(f, "none"),
            (true, false) => write!(f, "privileged"),
            (false, true) => write!(f, "remote"),
            (true, true) => write!(f, "privileged|remote"),
        }
    }
}

/// The UI side of a page, as seen by the watcher.
///
/// Implementations live on the UI thread and need not be `Send`. Calls arrive
/// synchronously from inside a poll tick; implementations must not call back
/// into the watcher from them.
pub trait PageSink {
    fn id(&self) -> PageId;

    /// Whether this page is the one the user is looking at.
    fn is_active(&self) -> bool;

    /// The aggregate status changed.
    fn status_changed(&self, status: PageStatusFlags);
}

/// Result of removing a child from a page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PopOutcome {
    /// New status, if it differs from the previous one.
    pub status_changed: Option<PageStatusFlags>,
    /// The removed child was the page's last one.
    pub drained: bool,
}

/// Child sets and derived status of one page.
///
/// Membership in the privileged and remote sets is decided once, when the
/// child is pushed.
#[derive(Debug)]
pub struct PageStatus {
    children: IndexMap<ProcessId, ProcessRecord>,
    privileged: IndexSet<ProcessId>,
    remote: IndexSet<ProcessId>,
    status: PageStatusFlags,
    remote_prefixes: Arc<[String]>,
}

impl PageStatus {
    pub fn new(remote_prefixes: Arc<[String]>) -> Self {
        Self {
            children: IndexMap::default(),
            privileged: IndexSet::default(),
            remote: IndexSet::default(),
            status: PageStatusFlags::NONE,
            remote_prefixes,
        }
    }

    pub fn status(&self) -> PageStatusFlags {
        self.status
    }

    /// Records of every current child, oldest first. Excludes the shell.
    pub fn children(&self) -> impl Iterator<Item = &ProcessRecord> + '_ {
        self.children.values()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn privileged_count(&self) -> usize {
        self.privileged.len()
    }

    pub fn remote_count(&self) -> usize {
        self.remote.len()
    }

    /// Add a child. Returns the new status if it changed.
    pub fn push_child(&mut self, process: ProcessRecord) -> Option<PageStatusFlags> {
        let pid = process.pid();

        if process.is_remote(&self.remote_prefixes) {
            self.remote.insert(pid);
            debug!("Now {} remote", self.remote.len());
        }

        if process.is_privileged() {
            self.privileged.insert(pid);
            debug!("Now {} privileged", self.privileged.len());
        }

        self.children.insert(pid, process);

        self.recompute()
    }

    /// Remove a child by pid.
    pub fn pop_child(&mut self, process: &ProcessRecord) -> PopOutcome {
        let pid = process.pid();

        let was_child = self.children.shift_remove(&pid).is_some();
        if !was_child {
            debug!("{} is not a child of this page", pid);
        }

        if self.remote.shift_remove(&pid) {
            debug!("{} remote remaining", self.remote.len());
        }
        if self.privileged.shift_remove(&pid) {
            debug!("{} privileged remaining", self.privileged.len());
        }

        PopOutcome {
            status_changed: self.recompute(),
            drained: was_child && self.children.is_empty(),
        }
    }

    fn recompute(&mut self) -> Option<PageStatusFlags> {
        let mut status = PageStatusFlags::NONE;
        if !self.privileged.is_empty() {
            status |= PageStatusFlags::PRIVILEGED;
        }
        if !self.remote.is_empty() {
            status |= PageStatusFlags::REMOTE;
        }

        if status == self.status {
            return None;
        }

        self.status = status;
        Some(status)
    }
}
