//! Periodic driving of [`ProcessWatcher::tick`].
//!
//! Polling is faster while one of our windows has focus and slower otherwise.
//! Everything here runs on the current thread and must be called from inside
//! a [`tokio::task::LocalSet`].

use crate::watcher::{ProcessWatcher, WatchOptions};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

/// A closure run every `period` on the local task set until cancelled.
///
/// The first run happens one period after creation. A slow run delays the
/// following ones instead of bunching them up.
pub struct RepeatingTask {
    handle: JoinHandle<()>,
    period: Duration,
}

impl RepeatingTask {
    pub fn spawn<F>(period: Duration, mut f: F) -> Self
    where
        F: FnMut() + 'static,
    {
        let start = Instant::now() + period;
        let handle = tokio::task::spawn_local(async move {
            let mut ticker = time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                f();
            }
        });

        Self { handle, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Owns the shared watcher and the single polling task.
pub struct PollScheduler {
    watcher: Rc<RefCell<ProcessWatcher>>,
    focused_interval: Duration,
    unfocused_interval: Duration,
    active_windows: usize,
    task: Option<RepeatingTask>,
}

impl PollScheduler {
    /// Starts out unfocused and idle; nothing is polled before [`Self::start`].
    pub fn new(watcher: Rc<RefCell<ProcessWatcher>>) -> Self {
        let options: WatchOptions = watcher.borrow().options().clone();

        Self {
            watcher,
            focused_interval: options.interval_for(true),
            unfocused_interval: options.interval_for(false),
            active_windows: 0,
            task: None,
        }
    }

    pub fn watcher(&self) -> &Rc<RefCell<ProcessWatcher>> {
        &self.watcher
    }

    pub fn is_focused(&self) -> bool {
        self.active_windows > 0
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Period of the polling task, or the one it would use once started.
    pub fn interval(&self) -> Duration {
        if self.is_focused() {
            self.focused_interval
        } else {
            self.unfocused_interval
        }
    }

    pub fn start(&mut self) {
        self.reschedule();
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            debug!("Stopped polling");
            task.cancel();
        }
    }

    /// Replace the focus count with a plain on/off state.
    ///
    /// Always replaces the running task, even if the interval is unchanged.
    pub fn set_focus_active(&mut self, active: bool) {
        self.active_windows = usize::from(active);
        if self.is_running() {
            self.reschedule();
        }
    }

    /// One of our windows gained focus.
    pub fn push_active(&mut self) {
        self.active_windows += 1;
        if self.active_windows == 1 && self.is_running() {
            self.reschedule();
        }
    }

    /// One of our windows lost focus.
    pub fn pop_active(&mut self) {
        match self.active_windows {
            0 => warn!("Focus released more often than acquired"),
            1 => {
                self.active_windows = 0;
                if self.is_running() {
                    self.reschedule();
                }
            }
            _ => self.active_windows -= 1,
        }
    }

    fn reschedule(&mut self) {
        // Cancel first so two tasks never overlap.
        self.stop();

        let period = self.interval();
        let watcher = self.watcher.clone();
        self.task = Some(RepeatingTask::spawn(period, move || poll(&watcher)));
        debug!("Polling every {:?}", period);
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn poll(watcher: &RefCell<ProcessWatcher>) {
    let Ok(mut watcher) = watcher.try_borrow_mut() else {
        warn!("Process watcher busy, skipping tick");
        return;
    };

    let report = watcher.tick();
    if !report.is_empty() {
        trace!(
            "Tick: {} spawned, {} exited",
            report.spawned.len(),
            report.exited.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{info, FakeProcessSource, RecordingNotifier};
    use std::sync::Arc;
    use tokio::task::LocalSet;
    use tokio::time::sleep;
    use tracing_test::traced_test;

    fn scheduler() -> (PollScheduler, Arc<FakeProcessSource>) {
        let source = FakeProcessSource::with_table([(100, info(1, false))]);
        let watcher = ProcessWatcher::new(
            source.clone(),
            Rc::new(RecordingNotifier::default()),
            WatchOptions::default(),
        );
        (PollScheduler::new(Rc::new(RefCell::new(watcher))), source)
    }

    #[tokio::test(start_paused = true)]
    async fn repeating_task_runs_every_period() {
        LocalSet::new()
            .run_until(async {
                let count = Rc::new(RefCell::new(0));
                let counter = count.clone();
                let task = RepeatingTask::spawn(Duration::from_millis(100), move || {
                    *counter.borrow_mut() += 1;
                });
                assert_eq!(task.period(), Duration::from_millis(100));

                sleep(Duration::from_millis(50)).await;
                assert_eq!(*count.borrow(), 0);

                sleep(Duration::from_millis(260)).await;
                assert_eq!(*count.borrow(), 3);

                task.cancel();
                sleep(Duration::from_millis(500)).await;
                assert_eq!(*count.borrow(), 3);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_polled_before_start() {
        LocalSet::new()
            .run_until(async {
                let (mut scheduler, source) = scheduler();
                scheduler.set_focus_active(true);

                sleep(Duration::from_secs(5)).await;
                assert_eq!(source.captures(), 0);
                assert!(!scheduler.is_running());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn focus_changes_reschedule() {
        LocalSet::new()
            .run_until(async {
                let (mut scheduler, source) = scheduler();
                scheduler.set_focus_active(true);
                scheduler.start();
                assert_eq!(scheduler.interval(), Duration::from_millis(500));

                sleep(Duration::from_millis(1010)).await;
                assert_eq!(source.captures(), 2);

                scheduler.set_focus_active(false);
                assert_eq!(scheduler.interval(), Duration::from_millis(2000));

                sleep(Duration::from_millis(1900)).await;
                assert_eq!(source.captures(), 2);

                sleep(Duration::from_millis(200)).await;
                assert_eq!(source.captures(), 3);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_polling() {
        LocalSet::new()
            .run_until(async {
                let (mut scheduler, source) = scheduler();
                scheduler.start();

                sleep(Duration::from_millis(2100)).await;
                assert_eq!(source.captures(), 1);

                scheduler.stop();
                assert!(!scheduler.is_running());
                sleep(Duration::from_secs(10)).await;
                assert_eq!(source.captures(), 1);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn focus_count_tracks_windows() {
        LocalSet::new()
            .run_until(async {
                let (mut scheduler, _) = scheduler();
                scheduler.start();

                scheduler.push_active();
                scheduler.push_active();
                assert_eq!(scheduler.interval(), Duration::from_millis(500));

                scheduler.pop_active();
                assert!(scheduler.is_focused());
                assert_eq!(
                    scheduler.task.as_ref().map(RepeatingTask::period),
                    Some(Duration::from_millis(500))
                );

                scheduler.pop_active();
                assert!(!scheduler.is_focused());
                assert_eq!(
                    scheduler.task.as_ref().map(RepeatingTask::period),
                    Some(Duration::from_millis(2000))
                );
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn busy_watcher_skips_tick() {
        LocalSet::new()
            .run_until(async {
                let (mut scheduler, source) = scheduler();
                scheduler.set_focus_active(true);
                scheduler.start();

                let watcher = scheduler.watcher().clone();
                let guard = watcher.borrow_mut();
                sleep(Duration::from_millis(600)).await;
                drop(guard);

                assert_eq!(source.captures(), 0);
                assert!(logs_contain("skipping tick"));

                sleep(Duration::from_millis(500)).await;
                assert_eq!(source.captures(), 1);
            })
            .await;
    }

    #[test]
    #[traced_test]
    fn unbalanced_pop_warns() {
        let (mut scheduler, _) = scheduler();
        scheduler.pop_active();
        assert!(!scheduler.is_focused());
        assert!(logs_contain("Focus released more often than acquired"));
    }
}
