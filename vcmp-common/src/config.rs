//! Configuration loading and resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (handled by clap's `env` attribute in the binary)
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing config file is not an error: the service logs a warning and
//! starts with defaults.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default idle period before a room auto-disconnects (5 minutes)
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;

/// Default number of queue entries shown by the `queue` command
pub const DEFAULT_QUEUE_DISPLAY_LIMIT: usize = 10;

/// Default HTTP port (liveness check and command intake)
pub const DEFAULT_PORT: u16 = 8080;

/// Default upper bound on a single media lookup
pub const DEFAULT_RESOLVER_TIMEOUT_SECS: u64 = 30;

/// Fully resolved scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Interface to bind the HTTP server to
    pub bind_addr: String,
    /// HTTP port
    pub port: u16,
    /// Seconds a room may stay idle before it is left
    pub idle_timeout_secs: u64,
    /// Maximum number of entries rendered for the queue listing
    pub queue_display_limit: usize,
    /// Prefix that marks a chat message as a command
    pub command_prefix: String,
    /// Executable used for media resolution
    pub resolver_program: String,
    /// Seconds a single media lookup may take
    pub resolver_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            queue_display_limit: DEFAULT_QUEUE_DISPLAY_LIMIT,
            command_prefix: "!".to_string(),
            resolver_program: "yt-dlp".to_string(),
            resolver_timeout_secs: DEFAULT_RESOLVER_TIMEOUT_SECS,
        }
    }
}

impl SchedulerConfig {
    /// Idle timeout as a Duration
    pub fn idle_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn resolver_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.resolver_timeout_secs)
    }

    /// Reject values the scheduler cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.idle_timeout_secs == 0 {
            return Err(Error::Config(
                "idle_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.queue_display_limit == 0 {
            return Err(Error::Config(
                "queue_display_limit must be greater than zero".to_string(),
            ));
        }
        if self.resolver_timeout_secs == 0 {
            return Err(Error::Config(
                "resolver_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.command_prefix.is_empty() {
            return Err(Error::Config("command_prefix must not be empty".to_string()));
        }
        Ok(())
    }
}

/// On-disk TOML configuration. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TomlConfig {
    pub bind_addr: Option<String>,
    pub port: Option<u16>,
    pub idle_timeout_secs: Option<u64>,
    pub queue_display_limit: Option<usize>,
    pub command_prefix: Option<String>,
    pub resolver_program: Option<String>,
    pub resolver_timeout_secs: Option<u64>,
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        debug!("Loaded config file {}", path.display());
        Ok(config)
    }

    /// Load the config file if one can be found, falling back to defaults.
    ///
    /// An explicit path that fails to parse is reported as an error; a
    /// missing file only produces a warning.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) => p,
                None => {
                    debug!("No config file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        Self::load(&path)
    }
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind_addr: Option<String>,
    pub port: Option<u16>,
    pub idle_timeout_secs: Option<u64>,
    pub queue_display_limit: Option<usize>,
    pub command_prefix: Option<String>,
    pub resolver_program: Option<String>,
    pub resolver_timeout_secs: Option<u64>,
}

/// Merge overrides, file values, and defaults into a validated config
pub fn resolve(overrides: &ConfigOverrides, file: &TomlConfig) -> Result<SchedulerConfig> {
    let defaults = SchedulerConfig::default();

    let config = SchedulerConfig {
        bind_addr: overrides
            .bind_addr
            .clone()
            .or_else(|| file.bind_addr.clone())
            .unwrap_or(defaults.bind_addr),
        port: overrides.port.or(file.port).unwrap_or(defaults.port),
        idle_timeout_secs: overrides
            .idle_timeout_secs
            .or(file.idle_timeout_secs)
            .unwrap_or(defaults.idle_timeout_secs),
        queue_display_limit: overrides
            .queue_display_limit
            .or(file.queue_display_limit)
            .unwrap_or(defaults.queue_display_limit),
        command_prefix: overrides
            .command_prefix
            .clone()
            .or_else(|| file.command_prefix.clone())
            .unwrap_or(defaults.command_prefix),
        resolver_program: overrides
            .resolver_program
            .clone()
            .or_else(|| file.resolver_program.clone())
            .unwrap_or(defaults.resolver_program),
        resolver_timeout_secs: overrides
            .resolver_timeout_secs
            .or(file.resolver_timeout_secs)
            .unwrap_or(defaults.resolver_timeout_secs),
    };

    config.validate()?;
    Ok(config)
}

/// Locate the default config file for the platform
///
/// Linux tries `~/.config/vcmp/config.toml` then `/etc/vcmp/config.toml`;
/// other platforms use the user config directory only.
fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("vcmp").join("config.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/vcmp/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}
