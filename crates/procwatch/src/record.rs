//! Tracked process descriptions.

use crate::snapshot::{ProcessId, ProcessSource, RawProcessInfo};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// One tracked OS process.
///
/// Cheap to clone; every clone shares the same metadata and the same cached
/// command line. Parent and privilege are fixed at creation: if the process is
/// later reparented (daemonised) the record keeps the original parent.
///
/// Equality and hashing use only the pid.
#[derive(Clone)]
pub struct ProcessRecord {
    inner: Arc<RecordInner>,
}

struct RecordInner {
    pid: ProcessId,
    parent_pid: Option<ProcessId>,
    is_privileged: bool,
    command_line: OnceLock<Option<String>>,
    source: Arc<dyn ProcessSource>,
}

impl ProcessRecord {
    /// Resolve `pid` against the live table.
    ///
    /// A pid that has already exited yields a record with no parent and no
    /// privilege rather than an error.
    pub fn create(pid: ProcessId, source: Arc<dyn ProcessSource>) -> Self {
        let info = source.inspect(pid).unwrap_or_else(|| {
            debug!("{} gone before it could be inspected", pid);
            RawProcessInfo::default()
        });
        Self::from_info(pid, info, source)
    }

    /// Build from metadata already captured in a snapshot.
    pub fn from_info(pid: ProcessId, info: RawProcessInfo, source: Arc<dyn ProcessSource>) -> Self {
        Self {
            inner: Arc::new(RecordInner {
                pid,
                parent_pid: info.parent_pid,
                is_privileged: info.is_privileged,
                command_line: OnceLock::new(),
                source,
            }),
        }
    }

    pub fn pid(&self) -> ProcessId {
        self.inner.pid
    }

    pub fn parent_pid(&self) -> Option<ProcessId> {
        self.inner.parent_pid
    }

    pub fn is_privileged(&self) -> bool {
        self.inner.is_privileged
    }

    /// Command line, resolved on first call and cached (including absence).
    pub fn command_line(&self) -> Option<&str> {
        self.inner
            .command_line
            .get_or_init(|| {
                self.inner
                    .source
                    .command_line(self.inner.pid)
                    .filter(|command| !command.is_empty())
            })
            .as_deref()
    }

    /// Remote-login heuristic: the command line starts with one of `prefixes`.
    ///
    /// Only as good as the prefixes; `ssh` run through a wrapper is missed and
    /// a binary that happens to be called `ssh` is not.
    pub fn is_remote<S: AsRef<str>>(&self, prefixes: &[S]) -> bool {
        self.command_line().is_some_and(|command| {
            prefixes
                .iter()
                .any(|prefix| command.starts_with(prefix.as_ref()))
        })
    }
}

impl PartialEq for ProcessRecord {
    fn eq(&self, other: &Self) -> bool {
        self.inner.pid == other.inner.pid
    }
}

impl Eq for ProcessRecord {}

impl Hash for ProcessRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.pid.hash(state);
    }
}

impl fmt::Debug for ProcessRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessRecord")
            .field("pid", &self.inner.pid)
            .field("parent_pid", &self.inner.parent_pid)
            .field("is_privileged", &self.inner.is_privileged)
            .field("command_line", &self.inner.command_line.get())
            .finish()
    }
}
