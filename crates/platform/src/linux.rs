//! Linux notifications through the freedesktop notification service.
//!
//! `notify-send` does the delivery. Its `--print-id` output is remembered per
//! notification key so a later withdrawal can close it over D-Bus with
//! `gdbus`. Both tools run on a helper thread so the caller never waits on
//! the session bus.

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::process::Command;
use std::thread;
use tracing::{debug, info, warn};

const APP_NAME: &str = "shellwatch";

/// Notification key → id assigned by the notification server.
static SERVER_IDS: Lazy<Mutex<HashMap<String, u32>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Send a desktop notification. A previous notification with the same `id`
/// is replaced.
pub fn send_notification(id: &str, title: &str, body: &str) {
    let args = notify_send_args(id, title, body);
    let key = id.to_string();
    let title = title.to_string();

    let spawned = thread::Builder::new()
        .name("notify-send".into())
        .spawn(move || match run_notify_send(&args) {
            Ok(server_id) => {
                info!("Notification sent: {}", title);
                if let Some(server_id) = server_id {
                    SERVER_IDS.lock().insert(key, server_id);
                }
            }
            Err(e) => warn!("Failed to send notification: {:#}", e),
        });

    if let Err(e) = spawned {
        warn!("Failed to spawn notification thread: {}", e);
    }
}

/// Close the notification sent under `id`, if the server told us its id.
pub fn withdraw_notification(id: &str) {
    let Some(server_id) = SERVER_IDS.lock().remove(id) else {
        debug!("No live notification for {}", id);
        return;
    };

    let spawned = thread::Builder::new()
        .name("notify-close".into())
        .spawn(move || {
            if let Err(e) = close_notification(server_id) {
                debug!("Failed to withdraw notification {}: {:#}", server_id, e);
            }
        });

    if let Err(e) = spawned {
        warn!("Failed to spawn notification thread: {}", e);
    }
}

fn notify_send_args(id: &str, title: &str, body: &str) -> Vec<String> {
    let mut args = vec![
        format!("--app-name={}", APP_NAME),
        "--print-id".to_string(),
        "--hint".to_string(),
        format!("string:x-canonical-private-synchronous:{}", id),
        "--".to_string(),
        title.to_string(),
    ];
    if !body.is_empty() {
        args.push(body.to_string());
    }
    args
}

fn run_notify_send(args: &[String]) -> Result<Option<u32>> {
    let output = Command::new("notify-send")
        .args(args)
        .output()
        .context("Failed to run notify-send")?;

    if !output.status.success() {
        bail!(
            "notify-send exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(parse_server_id(&String::from_utf8_lossy(&output.stdout)))
}

fn close_notification(server_id: u32) -> Result<()> {
    let status = Command::new("gdbus")
        .args([
            "call",
            "--session",
            "--dest",
            "org.freedesktop.Notifications",
            "--object-path",
            "/org/freedesktop/Notifications",
            "--method",
            "org.freedesktop.Notifications.CloseNotification",
        ])
        .arg(server_id.to_string())
        .output()
        .context("Failed to run gdbus")?
        .status;

    if !status.success() {
        bail!("gdbus exited with {}", status);
    }
    Ok(())
}

/// Older `notify-send` builds ignore `--print-id` and print nothing.
fn parse_server_id(stdout: &str) -> Option<u32> {
    stdout.lines().next()?.trim().parse().ok()
}
