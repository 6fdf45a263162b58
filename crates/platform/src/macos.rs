//! macOS notifications via AppleScript.
//!
//! `display notification` has no identifiers, so a newer notification for the
//! same page does not replace the old one and withdrawal is a no-op.

use std::process::Command;
use tracing::{debug, info, warn};

/// Send a user notification via osascript.
pub fn send_notification(_id: &str, title: &str, body: &str) {
    let script = format!(
        "display notification \"{}\" with title \"{}\"",
        escape(body),
        escape(title),
    );

    match Command::new("osascript").args(["-e", &script]).spawn() {
        Ok(_) => info!("Notification sent: {}", title),
        Err(e) => warn!("Failed to send notification: {}", e),
    }
}

pub fn withdraw_notification(id: &str) {
    debug!("Cannot withdraw notification {} on macOS", id);
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_quotes_and_backslashes() {
        assert_eq!(escape(r#"say "hi" \o/"#), r#"say \"hi\" \\o/"#);
    }
}
