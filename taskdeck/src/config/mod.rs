//! Configuration for the `Taskdeck` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/taskdeck/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

use crate::auth::Identity;
use crate::tasks::views::{ParseStatusFilterError, StatusFilter};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// `default_filter` is not a known filter name.
    #[error("invalid default filter: {0}")]
    InvalidFilter(#[from] ParseStatusFilterError),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    remote: RemoteFileConfig,
    session: SessionFileConfig,
    ui: UiFileConfig,
}

/// `[remote]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct RemoteFileConfig {
    latency_ms: Option<u64>,
    subscription_buffer: Option<usize>,
}

/// `[session]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SessionFileConfig {
    user: Option<String>,
    email: Option<String>,
}

/// `[ui]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct UiFileConfig {
    default_filter: Option<String>,
    timestamp_format: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -- Remote --
    /// Simulated round-trip latency of the in-process store.
    pub latency: Duration,
    /// Snapshots buffered per subscription.
    pub subscription_buffer: usize,

    // -- Session --
    /// Uid of a persisted session to restore on start.
    pub session_user: Option<String>,
    /// Email belonging to the restored session.
    pub session_email: Option<String>,

    // -- UI --
    /// Filter used by `ls` without arguments.
    pub default_filter: StatusFilter,
    /// Due date display format string (chrono).
    pub timestamp_format: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            latency: Duration::ZERO,
            subscription_buffer: 16,
            session_user: None,
            session_email: None,
            default_filter: StatusFilter::All,
            timestamp_format: "%Y-%m-%d %H:%M".to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an
    /// error. Otherwise the default path (`~/.config/taskdeck/config.toml`)
    /// is tried and silently ignored if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed,
    /// or if it names an unknown default filter.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Self::resolve(cli, &file)
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let default_filter = match cli
            .filter
            .as_deref()
            .or(file.ui.default_filter.as_deref())
        {
            Some(name) => name.parse()?,
            None => defaults.default_filter,
        };

        Ok(Self {
            latency: cli
                .latency_ms
                .or(file.remote.latency_ms)
                .map_or(defaults.latency, Duration::from_millis),
            subscription_buffer: file
                .remote
                .subscription_buffer
                .unwrap_or(defaults.subscription_buffer),
            session_user: cli.user.clone().or_else(|| file.session.user.clone()),
            session_email: cli.email.clone().or_else(|| file.session.email.clone()),
            default_filter,
            timestamp_format: cli
                .timestamp_format
                .clone()
                .or_else(|| file.ui.timestamp_format.clone())
                .unwrap_or(defaults.timestamp_format),
        })
    }

    /// The persisted session to restore, if a user is configured.
    #[must_use]
    pub fn restored_identity(&self) -> Option<Identity> {
        let uid = self.session_user.clone().filter(|uid| !uid.is_empty())?;
        Some(Identity {
            uid,
            email: self.session_email.clone(),
        })
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Task list with live sync")]
pub struct CliArgs {
    /// Uid of a persisted session to restore.
    #[arg(long, env = "TASKDECK_USER")]
    pub user: Option<String>,

    /// Email of the restored session.
    #[arg(long, env = "TASKDECK_EMAIL")]
    pub email: Option<String>,

    /// Path to config file (default: `~/.config/taskdeck/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Simulated store latency in milliseconds.
    #[arg(long)]
    pub latency_ms: Option<u64>,

    /// Default listing filter (all, active, completed).
    #[arg(long)]
    pub filter: Option<String>,

    /// Due date display format (chrono format string).
    #[arg(long)]
    pub timestamp_format: Option<String>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TASKDECK_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/taskdeck.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("taskdeck").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
