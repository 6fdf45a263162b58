//! TOML config file support.
//!
//! Config location: `~/.config/shellwatch/config.toml`

use crate::constants::{settings as limits, watch};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Process watcher section (`[process-watch]`).
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct WatchConfig {
    /// Poll interval in milliseconds while a window is focused.
    pub focused_interval_ms: u64,
    /// Poll interval in milliseconds while nothing is focused.
    pub unfocused_interval_ms: u64,
    /// Command-line prefixes that mark a child as a remote session.
    pub remote_prefixes: Vec<String>,
    /// Send a desktop notification when a background page's command finishes.
    pub notify_on_completion: bool,
    /// Title used for completion notifications.
    pub notification_title: String,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            focused_interval_ms: watch::FOCUSED_INTERVAL.as_millis() as u64,
            unfocused_interval_ms: watch::UNFOCUSED_INTERVAL.as_millis() as u64,
            remote_prefixes: watch::REMOTE_PREFIXES
                .iter()
                .map(|prefix| prefix.to_string())
                .collect(),
            notify_on_completion: true,
            notification_title: watch::NOTIFICATION_TITLE.to_string(),
        }
    }
}

impl WatchConfig {
    /// Poll interval while focused.
    pub fn focused_interval(&self) -> Duration {
        Duration::from_millis(self.focused_interval_ms)
    }

    /// Poll interval while unfocused.
    pub fn unfocused_interval(&self) -> Duration {
        Duration::from_millis(self.unfocused_interval_ms)
    }

    /// Clamp out-of-range values, logging each correction.
    pub fn validated(mut self) -> Self {
        let min_ms = watch::MIN_INTERVAL.as_millis() as u64;

        if self.focused_interval_ms < min_ms {
            tracing::warn!(
                "focused-interval-ms {} below minimum, using {}",
                self.focused_interval_ms,
                min_ms
            );
            self.focused_interval_ms = min_ms;
        }
        if self.unfocused_interval_ms < min_ms {
            tracing::warn!(
                "unfocused-interval-ms {} below minimum, using {}",
                self.unfocused_interval_ms,
                min_ms
            );
            self.unfocused_interval_ms = min_ms;
        }

        let before = self.remote_prefixes.len();
        self.remote_prefixes
            .retain(|prefix| !prefix.is_empty() && prefix.len() <= limits::MAX_STRING_LENGTH);
        if self.remote_prefixes.len() != before {
            tracing::warn!(
                "Ignored {} empty or oversized remote prefixes",
                before - self.remote_prefixes.len()
            );
        }

        if self.notification_title.is_empty()
            || self.notification_title.len() > limits::MAX_STRING_LENGTH
        {
            tracing::warn!("Invalid notification-title, using default");
            self.notification_title = watch::NOTIFICATION_TITLE.to_string();
        }

        self
    }
}

/// User-facing config parsed from TOML.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Process watcher settings.
    pub process_watch: WatchConfig,
}

/// Default config file content with comments (generated on first launch).
const DEFAULT_CONFIG: &str = r#"# shellwatch configuration

[process-watch]
# Poll interval while a window has focus (milliseconds)
focused-interval-ms = 500

# Poll interval while no window has focus (milliseconds)
unfocused-interval-ms = 2000

# Children whose command line starts with one of these are shown as remote
remote-prefixes = ["ssh "]

# Notify when the last command in a background tab finishes
notify-on-completion = true

# notification-title = "Command completed"
"#;

/// Return the config file path.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("shellwatch").join("config.toml"))
}

/// Ensure the config file exists, creating a default if missing.
/// Returns the path to the config file.
pub fn ensure_config_file() -> Option<PathBuf> {
    let path = config_path()?;
    if !path.exists() {
        let parent = path.parent()?;
        std::fs::create_dir_all(parent).ok()?;
        std::fs::write(&path, DEFAULT_CONFIG).ok()?;
        tracing::info!("Created default config at {:?}", path);
    }
    Some(path)
}

/// Load and parse the config file. Returns default on any error.
pub fn load_config() -> Config {
    match config_path() {
        Some(path) => load_config_from(&path),
        None => Config::default(),
    }
}

/// Load and parse a specific config file. Returns default on any error.
pub fn load_config_from(path: &Path) -> Config {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to read config: {}", e);
            }
            return Config::default();
        }
    };

    // Size guard
    if content.len() > limits::MAX_FILE_SIZE as usize {
        tracing::warn!(
            "Config file too large ({} bytes), using defaults",
            content.len()
        );
        return Config::default();
    }

    match toml::from_str::<Config>(&content) {
        Ok(cfg) => Config {
            process_watch: cfg.process_watch.validated(),
        },
        Err(e) => {
            tracing::warn!("Failed to parse config.toml: {}", e);
            Config::default()
        }
    }
}
