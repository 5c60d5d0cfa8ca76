//! Configuration loading for the importer
//!
//! Resolution priority for every setting:
//! 1. Command-line argument (applied by the binary after loading)
//! 2. Environment variable (`MEDIASYNC_*`)
//! 3. TOML config file
//! 4. Compiled default
//!
//! A missing TOML file is not an error; a malformed one is.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit TOML config file
pub const CONFIG_PATH_ENV: &str = "MEDIASYNC_CONFIG";

pub const ENV_MOUNT_POINTS: &str = "MEDIASYNC_MOUNT_POINTS";
pub const ENV_ARCHIVE_ROOT: &str = "MEDIASYNC_ARCHIVE_ROOT";
pub const ENV_POLL_INTERVAL: &str = "MEDIASYNC_POLL_INTERVAL_SECS";
pub const ENV_ERROR_BACKOFF: &str = "MEDIASYNC_ERROR_BACKOFF_SECS";
pub const ENV_HOOKS_DIR: &str = "MEDIASYNC_HOOKS_DIR";
pub const ENV_METADATA_TOOL: &str = "MEDIASYNC_METADATA_TOOL";
pub const ENV_TOOL_TIMEOUT: &str = "MEDIASYNC_TOOL_TIMEOUT_SECS";
pub const ENV_VERIFY_EXISTING: &str = "MEDIASYNC_VERIFY_EXISTING";
pub const ENV_NOTIFICATIONS: &str = "MEDIASYNC_NOTIFICATIONS";
pub const ENV_NTFY_SERVER: &str = "MEDIASYNC_NTFY_SERVER";
pub const ENV_NTFY_TOPIC: &str = "MEDIASYNC_NTFY_TOPIC";
pub const ENV_NOTIFY_EACH_FILE: &str = "MEDIASYNC_NOTIFY_EACH_FILE";
pub const ENV_LOG_LEVEL: &str = "MEDIASYNC_LOG_LEVEL";

/// Compiled fallback values
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub mount_points: Vec<PathBuf>,
    pub archive_root: PathBuf,
    pub poll_interval_secs: u64,
    pub error_backoff_secs: u64,
    pub metadata_tool: PathBuf,
    pub tool_timeout_secs: u64,
    pub ntfy_server: String,
    pub log_level: String,
}

impl CompiledDefaults {
    /// Defaults for the current platform
    ///
    /// The archive lands in the user's picture directory; removable media is
    /// expected under the usual automount location.
    pub fn for_current_platform() -> Self {
        let mount_points = if cfg!(target_os = "macos") {
            vec![PathBuf::from("/Volumes")]
        } else {
            vec![PathBuf::from("/media/pi")]
        };

        let archive_root = dirs::picture_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join("Pictures")))
            .unwrap_or_else(|| PathBuf::from("./Pictures"));

        Self {
            mount_points,
            archive_root,
            poll_interval_secs: 10,
            error_backoff_secs: 60,
            metadata_tool: PathBuf::from("exiftool"),
            tool_timeout_secs: 30,
            ntfy_server: "https://ntfy.sh".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Logging section of the TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter directive, e.g. `info` or `mediasync_importer=debug`
    pub level: Option<String>,
}

/// Notification section of the TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlNotifications {
    pub enabled: Option<bool>,
    pub server: Option<String>,
    pub topic: Option<String>,
    pub notify_each_file: Option<bool>,
}

/// On-disk TOML schema; every field is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub mount_points: Option<Vec<PathBuf>>,
    pub archive_root: Option<PathBuf>,
    pub poll_interval_secs: Option<u64>,
    pub error_backoff_secs: Option<u64>,
    pub hooks_dir: Option<PathBuf>,
    pub metadata_tool: Option<PathBuf>,
    pub tool_timeout_secs: Option<u64>,
    pub verify_existing: Option<bool>,
    #[serde(default)]
    pub notifications: TomlNotifications,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Resolved notification settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub server: String,
    pub topic: Option<String>,
    /// Send a message per imported file in addition to batch summaries
    pub notify_each_file: bool,
}

impl NotificationSettings {
    /// Notifications are sent only when enabled and both server and topic
    /// are set. Anything else silently disables them.
    pub fn is_active(&self) -> bool {
        self.enabled
            && !self.server.trim().is_empty()
            && self.topic.as_deref().map(|t| !t.trim().is_empty()).unwrap_or(false)
    }

    /// Full endpoint URL (`{server}/{topic}`) when active
    pub fn endpoint(&self) -> Option<String> {
        if !self.is_active() {
            return None;
        }
        let topic = self.topic.as_deref()?.trim().trim_start_matches('/');
        Some(format!("{}/{}", self.server.trim().trim_end_matches('/'), topic))
    }
}

/// Fully resolved importer configuration
///
/// Built once at startup and handed to each component's constructor.
#[derive(Debug, Clone)]
pub struct ImporterConfig {
    /// Directories under which removable cards are mounted
    pub mount_points: Vec<PathBuf>,
    /// Top of the date-partitioned archive
    pub archive_root: PathBuf,
    pub poll_interval: Duration,
    /// Sleep used after a cycle that hit an enumeration error
    pub error_backoff: Duration,
    pub hooks_dir: Option<PathBuf>,
    pub metadata_tool: PathBuf,
    /// Upper bound for any external process (metadata tool, hooks)
    pub tool_timeout: Duration,
    /// Hash a pre-existing destination before trusting it
    pub verify_existing: bool,
    pub notifications: NotificationSettings,
    pub log_level: String,
}

impl ImporterConfig {
    /// Load from the TOML file (if any) and the process environment
    ///
    /// Not validated: command-line overrides go on top first, then the
    /// caller runs [`ImporterConfig::validate`].
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let toml_config = match resolve_config_file(config_path) {
            Some(path) => load_toml_config(&path)?,
            None => {
                info!("No config file found, using environment and compiled defaults");
                TomlConfig::default()
            }
        };

        Self::resolve(
            toml_config,
            CompiledDefaults::for_current_platform(),
            |key| std::env::var(key).ok(),
        )
    }

    /// Merge environment over TOML over defaults
    ///
    /// `env` looks up a variable by name; empty values count as unset.
    pub fn resolve<F>(toml: TomlConfig, defaults: CompiledDefaults, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let mount_points = match lookup(ENV_MOUNT_POINTS) {
            Some(value) => std::env::split_paths(&value).collect(),
            None => toml.mount_points.unwrap_or(defaults.mount_points),
        };

        let archive_root = lookup(ENV_ARCHIVE_ROOT)
            .map(PathBuf::from)
            .or(toml.archive_root)
            .unwrap_or(defaults.archive_root);

        let poll_interval_secs = match lookup(ENV_POLL_INTERVAL) {
            Some(v) => parse_u64(ENV_POLL_INTERVAL, &v)?,
            None => toml.poll_interval_secs.unwrap_or(defaults.poll_interval_secs),
        };

        let error_backoff_secs = match lookup(ENV_ERROR_BACKOFF) {
            Some(v) => parse_u64(ENV_ERROR_BACKOFF, &v)?,
            None => toml.error_backoff_secs.unwrap_or(defaults.error_backoff_secs),
        };

        let hooks_dir = lookup(ENV_HOOKS_DIR).map(PathBuf::from).or(toml.hooks_dir);

        let metadata_tool = lookup(ENV_METADATA_TOOL)
            .map(PathBuf::from)
            .or(toml.metadata_tool)
            .unwrap_or(defaults.metadata_tool);

        let tool_timeout_secs = match lookup(ENV_TOOL_TIMEOUT) {
            Some(v) => parse_u64(ENV_TOOL_TIMEOUT, &v)?,
            None => toml.tool_timeout_secs.unwrap_or(defaults.tool_timeout_secs),
        };

        let verify_existing = match lookup(ENV_VERIFY_EXISTING) {
            Some(v) => parse_bool(ENV_VERIFY_EXISTING, &v)?,
            None => toml.verify_existing.unwrap_or(true),
        };

        let notifications = NotificationSettings {
            enabled: match lookup(ENV_NOTIFICATIONS) {
                Some(v) => parse_bool(ENV_NOTIFICATIONS, &v)?,
                None => toml.notifications.enabled.unwrap_or(false),
            },
            server: lookup(ENV_NTFY_SERVER)
                .or(toml.notifications.server)
                .unwrap_or(defaults.ntfy_server),
            topic: lookup(ENV_NTFY_TOPIC).or(toml.notifications.topic),
            notify_each_file: match lookup(ENV_NOTIFY_EACH_FILE) {
                Some(v) => parse_bool(ENV_NOTIFY_EACH_FILE, &v)?,
                None => toml.notifications.notify_each_file.unwrap_or(true),
            },
        };

        let log_level = lookup(ENV_LOG_LEVEL)
            .or(toml.logging.level)
            .unwrap_or(defaults.log_level);

        Ok(Self {
            mount_points,
            archive_root,
            poll_interval: Duration::from_secs(poll_interval_secs),
            error_backoff: Duration::from_secs(error_backoff_secs),
            hooks_dir,
            metadata_tool,
            tool_timeout: Duration::from_secs(tool_timeout_secs),
            verify_existing,
            notifications,
            log_level,
        })
    }

    /// Reject configurations the scan loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.mount_points.is_empty() {
            return Err(Error::Config("at least one mount point is required".to_string()));
        }
        if self.archive_root.as_os_str().is_empty() {
            return Err(Error::Config("archive root must not be empty".to_string()));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::Config("poll interval must be greater than zero".to_string()));
        }
        if self.tool_timeout.is_zero() {
            return Err(Error::Config("tool timeout must be greater than zero".to_string()));
        }
        if self.mount_points.iter().any(|m| self.archive_root.starts_with(m)) {
            warn!(
                archive_root = %self.archive_root.display(),
                "Archive root lies under a mount point; archived files may be rescanned"
            );
        }
        Ok(())
    }
}

/// Pick the TOML file to read
///
/// Explicit path, then `MEDIASYNC_CONFIG`, then the user config directory,
/// then `/etc/mediasync/importer.toml`.
pub fn resolve_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let user_config = dirs::config_dir().map(|d| d.join("mediasync").join("importer.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/mediasync/importer.toml");
    if system_config.exists() {
        return Some(system_config);
    }

    None
}

/// Read a TOML config file
///
/// A missing file logs a warning and yields defaults.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let config: TomlConfig = toml::from_str(&content)?;
            info!("Loaded config file: {}", path.display());
            Ok(config)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Config file not found: {} (using defaults)", path.display());
            Ok(TomlConfig::default())
        }
        Err(e) => Err(Error::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))),
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| Error::Config(format!("{} must be a whole number of seconds: {}", key, e)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!("{} must be true or false, got '{}'", key, other))),
    }
}
