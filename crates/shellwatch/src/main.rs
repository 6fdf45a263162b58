//! shellwatch - watch shells for privileged, remote and finished commands
//!
//! Each pid given on the command line (default: the invoking shell) becomes a
//! headless page. Status transitions are logged, and a desktop notification
//! is raised when the last command of a background page finishes.

mod headless;

use anyhow::{bail, Context, Result};
use headless::HeadlessPage;
use once_cell::sync::Lazy;
use platform::DesktopNotifier;
use procwatch::{PageId, PageSink, PollScheduler, ProcessId, ProcessWatcher, WatchOptions};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;
use tokio::task::LocalSet;
use tracing::{debug, error, info};

/// Application startup time for performance monitoring
static STARTUP_TIME: Lazy<Instant> = Lazy::new(Instant::now);

const USAGE: &str = "usage: shellwatch [PID...]";

/// Check if debug mode is enabled via environment variable.
fn is_debug_mode() -> bool {
    std::env::var("SHELLWATCH_DEBUG").is_ok()
}

/// Initialize the logging system.
fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default_filter = if is_debug_mode() {
        "shellwatch=trace,procwatch=trace,platform=debug,info"
    } else {
        "shellwatch=info,procwatch=info,warn"
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_line_number(true))
        .with(filter)
        .init();

    if is_debug_mode() {
        info!(
            "shellwatch v{} starting up (DEBUG MODE ENABLED)",
            env!("CARGO_PKG_VERSION")
        );
        info!("Set RUST_LOG for custom log levels, e.g. RUST_LOG=procwatch=trace");
    } else {
        info!("shellwatch v{} starting up", env!("CARGO_PKG_VERSION"));
    }
}

/// Parse the pid arguments. An empty list means "the invoking shell".
fn parse_pids<I, S>(args: I) -> Result<Vec<ProcessId>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut pids = Vec::new();
    for arg in args {
        let arg = arg.as_ref();
        if arg == "-h" || arg == "--help" {
            bail!(USAGE);
        }
        let raw: u32 = arg
            .parse()
            .with_context(|| format!("Invalid pid {:?}\n{}", arg, USAGE))?;
        if raw == 0 {
            bail!("Invalid pid 0\n{}", USAGE);
        }
        let pid = ProcessId::new(raw);
        if !pids.contains(&pid) {
            pids.push(pid);
        }
    }
    Ok(pids)
}

#[cfg(unix)]
fn invoking_shell() -> Result<ProcessId> {
    Ok(ProcessId::new(std::os::unix::process::parent_id()))
}

#[cfg(not(unix))]
fn invoking_shell() -> Result<ProcessId> {
    bail!("No pid given and the parent process is unknown on this platform\n{}", USAGE)
}

/// Pages in argument order, numbered from 1. The first one is in front.
fn build_pages(pids: &[ProcessId]) -> Vec<Rc<HeadlessPage>> {
    pids.iter()
        .zip(1u32..)
        .map(|(pid, id)| Rc::new(HeadlessPage::new(PageId::new(id), *pid, id == 1)))
        .collect()
}

async fn watch(pids: Vec<ProcessId>, options: WatchOptions) -> Result<()> {
    let watcher = Rc::new(RefCell::new(ProcessWatcher::new(
        procwatch::default_source(),
        Rc::new(DesktopNotifier),
        options,
    )));

    let pages = build_pages(&pids);
    for page in &pages {
        if watcher.borrow_mut().add_watch(page.shell(), page.clone()) {
            debug!("Page {} watches shell {}", page.id(), page.shell());
        }
    }

    let mut scheduler = PollScheduler::new(watcher.clone());
    scheduler.set_focus_active(true);
    scheduler.start();

    info!(
        "Watching {} shell(s), ready in {:?}",
        watcher.borrow().registry().root_count(),
        STARTUP_TIME.elapsed()
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    info!("Interrupted, shutting down");
    scheduler.stop();

    let mut watcher = watcher.borrow_mut();
    let ids: Vec<PageId> = watcher.page_ids().collect();
    for id in ids {
        let running = watcher.page_children(id);
        if !running.is_empty() {
            debug!("Page {} still has {} process(es)", id, running.len());
        }
        watcher.remove_page(id);
    }

    Ok(())
}

fn run() -> Result<()> {
    let mut pids = parse_pids(std::env::args().skip(1))?;
    if pids.is_empty() {
        pids.push(invoking_shell()?);
    }

    if let Some(path) = settings::ensure_config_file() {
        debug!("Using config {:?}", path);
    }
    let config = settings::load_config();
    let options = WatchOptions::from(&config.process_watch);
    debug!("Watch options: {:?}", options);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build async runtime")?;

    LocalSet::new().block_on(&runtime, watch(pids, options))
}

fn main() {
    let _ = *STARTUP_TIME;

    init_logging();

    if let Err(e) = run() {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn no_arguments_means_no_explicit_pids() {
        assert!(parse_pids(Vec::<String>::new()).unwrap().is_empty());
    }

    #[test]
    fn pids_keep_order_without_duplicates() {
        let pids = parse_pids(["300", "100", "300"]).unwrap();
        assert_eq!(pids, vec![ProcessId::new(300), ProcessId::new(100)]);
    }

    #[test_case("abc" ; "not a number")]
    #[test_case("-5" ; "negative")]
    #[test_case("0" ; "zero")]
    #[test_case("--help" ; "help flag")]
    fn bad_arguments_are_rejected(arg: &str) {
        let err = parse_pids([arg]).unwrap_err();
        assert!(format!("{:#}", err).contains(USAGE));
    }

    #[test]
    fn first_page_is_active() {
        let pages = build_pages(&[ProcessId::new(10), ProcessId::new(20)]);

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].id(), PageId::new(1));
        assert!(pages[0].is_active());
        assert_eq!(pages[1].id(), PageId::new(2));
        assert_eq!(pages[1].shell(), ProcessId::new(20));
        assert!(!pages[1].is_active());
    }
}
