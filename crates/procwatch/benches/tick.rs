//! Criterion benchmarks for the watcher tick.
//!
//! Run with: `cargo bench -p procwatch`
//!
//! A tick walks the whole process table, so its cost is dominated by table
//! size rather than by the handful of watched shells.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use procwatch::{
    Notification, NotificationSink, PageId, PageSink, PageStatusFlags, ProcessId,
    ProcessSnapshot, ProcessSource, ProcessWatcher, RawProcessInfo, WatchOptions,
};
use std::rc::Rc;
use std::sync::Arc;

const SHELLS: u32 = 8;
const CHILDREN_PER_SHELL: u32 = 4;

struct FixedTable(ProcessSnapshot);

impl ProcessSource for FixedTable {
    fn capture(&self) -> anyhow::Result<ProcessSnapshot> {
        Ok(self.0.clone())
    }

    fn inspect(&self, pid: ProcessId) -> Option<RawProcessInfo> {
        self.0.get(pid).copied()
    }

    fn command_line(&self, _pid: ProcessId) -> Option<String> {
        None
    }
}

struct Page(PageId);

impl PageSink for Page {
    fn id(&self) -> PageId {
        self.0
    }

    fn is_active(&self) -> bool {
        true
    }

    fn status_changed(&self, _status: PageStatusFlags) {}
}

struct Quiet;

impl NotificationSink for Quiet {
    fn send(&self, _notification: &Notification) {}
    fn withdraw(&self, _id: &str) {}
}

/// `size` unrelated processes plus a few shells with children.
fn synthetic_table(size: u32) -> ProcessSnapshot {
    let mut table: ProcessSnapshot = (2..size + 2)
        .map(|raw| (ProcessId::new(raw), RawProcessInfo::new(1u32, false)))
        .collect();

    for shell in 0..SHELLS {
        let shell_pid = 1_000_000 + shell * 100;
        table.insert(ProcessId::new(shell_pid), RawProcessInfo::new(1u32, false));
        for child in 1..=CHILDREN_PER_SHELL {
            table.insert(
                ProcessId::new(shell_pid + child),
                RawProcessInfo::new(shell_pid, child % 2 == 0),
            );
        }
    }

    table
}

fn watcher_for(table: ProcessSnapshot) -> ProcessWatcher {
    let mut watcher = ProcessWatcher::new(
        Arc::new(FixedTable(table)),
        Rc::new(Quiet),
        WatchOptions::default(),
    );
    for shell in 0..SHELLS {
        watcher.add_watch(
            ProcessId::new(1_000_000 + shell * 100),
            Rc::new(Page(PageId::new(shell))),
        );
    }
    watcher
}

fn bench_steady_state(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_steady_state");

    for size in [100u32, 1_000, 10_000] {
        let table = synthetic_table(size);
        let mut watcher = watcher_for(table.clone());
        // First tick discovers the children; later ticks change nothing.
        watcher.tick();

        group.throughput(Throughput::Elements(table.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &table, |b, table| {
            b.iter(|| black_box(watcher.reconcile(black_box(table))))
        });
    }

    group.finish();
}

fn bench_churn(c: &mut Criterion) {
    let full = synthetic_table(1_000);
    let shells_only: ProcessSnapshot = full
        .iter()
        .filter(|(pid, _)| pid.as_u32() < 1_000_000 || (pid.as_u32() - 1_000_000) % 100 == 0)
        .map(|(pid, info)| (pid, *info))
        .collect();

    c.bench_function("tick_spawn_and_exit", |b| {
        let mut watcher = watcher_for(full.clone());
        b.iter(|| {
            black_box(watcher.reconcile(&full));
            black_box(watcher.reconcile(&shells_only));
        })
    });
}

criterion_group!(benches, bench_steady_state, bench_churn);
criterion_main!(benches);
