//! Centralized configuration constants for shellwatch.
//!
//! Compile-time defaults, grouped by the component that reads them.

/// Process watcher configuration.
pub mod watch {
    use std::time::Duration;

    /// Poll interval while any window holds focus.
    pub const FOCUSED_INTERVAL: Duration = Duration::from_millis(500);
    /// Poll interval while no window holds focus.
    pub const UNFOCUSED_INTERVAL: Duration = Duration::from_millis(2000);
    /// Lower bound for user-configured intervals.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(50);

    /// Prefix of the per-page "command completed" notification id.
    /// The page id is appended: `command-completed-3`.
    pub const NOTIFICATION_ID_PREFIX: &str = "command-completed";
    /// Title of the "command completed" notification.
    pub const NOTIFICATION_TITLE: &str = "Command completed";

    /// Command-line prefixes that mark a child as a remote login session.
    pub const REMOTE_PREFIXES: &[&str] = &["ssh "];
}

/// Settings file validation limits.
pub mod settings {
    /// Maximum settings file size in bytes (64 KB).
    /// Settings files should be tiny; anything larger is suspicious.
    pub const MAX_FILE_SIZE: u64 = 64 * 1024;

    /// Maximum length for string fields (notification title, remote prefixes).
    pub const MAX_STRING_LENGTH: usize = 256;
}
