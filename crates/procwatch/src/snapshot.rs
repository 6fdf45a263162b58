//! Reads of the OS process table.
//!
//! A [`ProcessSnapshot`] is one pass over every process on the system,
//! reduced to the two facts the watcher needs: who the parent is, and whether
//! the process runs as a different user than we do. The OS is reached through
//! the [`ProcessSource`] trait so the watcher can be driven by a scripted table
//! in tests, and can degrade to [`NullProcessSource`] on platforms `sysinfo`
//! does not support.

use anyhow::{bail, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use sysinfo::{Pid, Process, ProcessRefreshKind, ProcessesToUpdate, System, Uid, UpdateKind};
use tracing::{debug, warn};

/// Platform process identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(u32);

impl ProcessId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl From<u32> for ProcessId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl From<Pid> for ProcessId {
    fn from(pid: Pid) -> Self {
        Self(pid.as_u32())
    }
}

impl From<ProcessId> for Pid {
    fn from(pid: ProcessId) -> Self {
        Pid::from_u32(pid.0)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What one snapshot knows about a process.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawProcessInfo {
    /// `None` for the init process and for entries whose parent is unknown.
    pub parent_pid: Option<ProcessId>,
    /// Effective user differs from ours. `false` when it cannot be read.
    pub is_privileged: bool,
}

impl RawProcessInfo {
    pub fn new(parent_pid: impl Into<ProcessId>, is_privileged: bool) -> Self {
        Self {
            parent_pid: Some(parent_pid.into()),
            is_privileged,
        }
    }
}

/// Ordered pid → metadata map captured in a single pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessSnapshot {
    processes: BTreeMap<ProcessId, RawProcessInfo>,
}

impl ProcessSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pid: ProcessId, info: RawProcessInfo) {
        self.processes.insert(pid, info);
    }

    pub fn remove(&mut self, pid: ProcessId) -> Option<RawProcessInfo> {
        self.processes.remove(&pid)
    }

    pub fn get(&self, pid: ProcessId) -> Option<&RawProcessInfo> {
        self.processes.get(&pid)
    }

    pub fn contains(&self, pid: ProcessId) -> bool {
        self.processes.contains_key(&pid)
    }

    /// Iterate in ascending pid order.
    pub fn iter(&self) -> impl Iterator<Item = (ProcessId, &RawProcessInfo)> + '_ {
        self.processes.iter().map(|(pid, info)| (*pid, info))
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}

impl FromIterator<(ProcessId, RawProcessInfo)> for ProcessSnapshot {
    fn from_iter<I: IntoIterator<Item = (ProcessId, RawProcessInfo)>>(iter: I) -> Self {
        Self {
            processes: iter.into_iter().collect(),
        }
    }
}

/// Access to the live process table.
pub trait ProcessSource: Send + Sync {
    /// Read the whole table. Errors are transient and the caller treats them
    /// as an empty observation.
    fn capture(&self) -> Result<ProcessSnapshot>;

    /// Look up a single process. `None` if it is already gone.
    fn inspect(&self, pid: ProcessId) -> Option<RawProcessInfo>;

    /// Full command line, arguments joined by a single space.
    fn command_line(&self, pid: ProcessId) -> Option<String>;

    /// `false` when the platform cannot enumerate processes at all.
    fn is_supported(&self) -> bool {
        true
    }
}

/// Process table backed by `sysinfo`.
pub struct SystemProcessSource {
    system: Mutex<System>,
    current_user: Option<Uid>,
}

impl SystemProcessSource {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_processes_specifics(ProcessesToUpdate::All, true, table_refresh_kind());

        let current_user = sysinfo::get_current_pid()
            .ok()
            .and_then(|pid| system.process(pid))
            .and_then(effective_user)
            .cloned();

        if current_user.is_none() {
            warn!("Could not determine current user, privilege detection disabled");
        }

        Self {
            system: Mutex::new(system),
            current_user,
        }
    }

    fn describe(&self, process: &Process) -> RawProcessInfo {
        let is_privileged = match (effective_user(process), &self.current_user) {
            (Some(user), Some(current)) => user != current,
            _ => false,
        };

        RawProcessInfo {
            parent_pid: process.parent().map(ProcessId::from),
            is_privileged,
        }
    }
}

impl Default for SystemProcessSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSource for SystemProcessSource {
    fn capture(&self) -> Result<ProcessSnapshot> {
        let mut system = self.system.lock();
        system.refresh_processes_specifics(ProcessesToUpdate::All, true, table_refresh_kind());

        let snapshot: ProcessSnapshot = system
            .processes()
            .iter()
            // Linux reports threads as tasks of their process; they are not children.
            .filter(|(_, process)| process.thread_kind().is_none())
            .map(|(pid, process)| (ProcessId::from(*pid), self.describe(process)))
            .collect();

        // Our own process is always listed, so an empty table is a failed read.
        if snapshot.is_empty() {
            bail!("process table read returned no entries");
        }

        Ok(snapshot)
    }

    fn inspect(&self, pid: ProcessId) -> Option<RawProcessInfo> {
        let mut system = self.system.lock();
        let target = [Pid::from(pid)];
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&target),
            true,
            table_refresh_kind(),
        );

        system.process(Pid::from(pid)).map(|p| self.describe(p))
    }

    fn command_line(&self, pid: ProcessId) -> Option<String> {
        let mut system = self.system.lock();
        let target = [Pid::from(pid)];
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&target),
            true,
            ProcessRefreshKind::new().with_cmd(UpdateKind::OnlyIfNotSet),
        );

        let process = system.process(Pid::from(pid))?;
        let command = process
            .cmd()
            .iter()
            .map(|arg| arg.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");

        if command.is_empty() {
            debug!("No command line for {}", pid);
            None
        } else {
            Some(command)
        }
    }
}

fn table_refresh_kind() -> ProcessRefreshKind {
    ProcessRefreshKind::new().with_user(UpdateKind::OnlyIfNotSet)
}

fn effective_user(process: &Process) -> Option<&Uid> {
    process.effective_user_id().or_else(|| process.user_id())
}

/// Source for platforms without process enumeration: always empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProcessSource;

impl ProcessSource for NullProcessSource {
    fn capture(&self) -> Result<ProcessSnapshot> {
        Ok(ProcessSnapshot::new())
    }

    fn inspect(&self, _pid: ProcessId) -> Option<RawProcessInfo> {
        None
    }

    fn command_line(&self, _pid: ProcessId) -> Option<String> {
        None
    }

    fn is_supported(&self) -> bool {
        false
    }
}

/// Pick the best source for this platform.
pub fn default_source() -> Arc<dyn ProcessSource> {
    if sysinfo::IS_SUPPORTED_SYSTEM {
        Arc::new(SystemProcessSource::new())
    } else {
        warn!("Process listing unsupported on this platform, child tracking disabled");
        Arc::new(NullProcessSource)
    }
}
