//! Watched shells and the descendants attributed to them.

use crate::page::PageId;
use crate::record::ProcessRecord;
use crate::snapshot::ProcessId;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// A page's shell, registered when it was spawned.
#[derive(Clone, Debug)]
pub struct WatchEntry {
    pub page: PageId,
    pub process: ProcessRecord,
}

/// A process observed under a watched shell.
#[derive(Clone, Debug)]
pub struct DescendantEntry {
    pub page: PageId,
    pub process: ProcessRecord,
}

/// Root and descendant tables.
///
/// Pages are referenced by id only; the registry never keeps a page alive.
/// A descendant stays attributed to its page after the shell itself exits,
/// until the descendant exits too.
#[derive(Debug, Default)]
pub struct WatchRegistry {
    roots: BTreeMap<ProcessId, WatchEntry>,
    descendants: BTreeMap<ProcessId, DescendantEntry>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `pid` as the shell of `page`. A pid that is already a root is
    /// left untouched and `false` is returned.
    pub fn add_watch(&mut self, pid: ProcessId, page: PageId, process: ProcessRecord) -> bool {
        if let Some(existing) = self.roots.get(&pid) {
            warn!(
                "Process {} already watched for page {}, ignoring page {}",
                pid, existing.page, page
            );
            return false;
        }

        self.roots.insert(pid, WatchEntry { page, process });
        debug!("Started watching {}", pid);
        true
    }

    pub fn remove_watch(&mut self, pid: ProcessId) -> bool {
        if self.roots.remove(&pid).is_some() {
            debug!("Stopped watching {}", pid);
            true
        } else {
            warn!("Unknown process {}", pid);
            false
        }
    }

    pub fn find_watch_entry(&self, pid: ProcessId) -> Option<&WatchEntry> {
        self.roots.get(&pid)
    }

    pub fn lookup_owner_for_descendant(&self, pid: ProcessId) -> Option<PageId> {
        self.descendants.get(&pid).map(|entry| entry.page)
    }

    pub fn is_descendant(&self, pid: ProcessId) -> bool {
        self.descendants.contains_key(&pid)
    }

    pub fn descendant(&self, pid: ProcessId) -> Option<&DescendantEntry> {
        self.descendants.get(&pid)
    }

    pub fn insert_descendant(&mut self, pid: ProcessId, page: PageId, process: ProcessRecord) {
        self.descendants
            .insert(pid, DescendantEntry { page, process });
    }

    pub fn remove_descendant(&mut self, pid: ProcessId) -> Option<DescendantEntry> {
        self.descendants.remove(&pid)
    }

    pub fn roots(&self) -> impl Iterator<Item = (ProcessId, &WatchEntry)> + '_ {
        self.roots.iter().map(|(pid, entry)| (*pid, entry))
    }

    pub fn descendants(&self) -> impl Iterator<Item = (ProcessId, &DescendantEntry)> + '_ {
        self.descendants.iter().map(|(pid, entry)| (*pid, entry))
    }

    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    pub fn descendant_count(&self) -> usize {
        self.descendants.len()
    }

    /// Drop every root and descendant owned by `page`, returning the dropped
    /// descendants.
    pub fn forget_page(&mut self, page: PageId) -> Vec<DescendantEntry> {
        self.roots.retain(|pid, entry| {
            let keep = entry.page != page;
            if !keep {
                debug!("Stopped watching {}", pid);
            }
            keep
        });

        let dead: Vec<ProcessId> = self
            .descendants
            .iter()
            .filter(|(_, entry)| entry.page == page)
            .map(|(pid, _)| *pid)
            .collect();

        dead.into_iter()
            .filter_map(|pid| self.descendants.remove(&pid))
            .collect()
    }
}
