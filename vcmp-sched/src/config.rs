//! Command-line arguments and configuration loading for vcmp-sched
//!
//! Every argument can also come from an environment variable; both override
//! the TOML file, which overrides compiled defaults.

use crate::error::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use vcmp_common::config::{resolve, ConfigOverrides, SchedulerConfig, TomlConfig};

/// Command-line arguments for vcmp-sched
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "vcmp-sched")]
#[command(about = "Per-room music playback scheduler for voice channels")]
#[command(version)]
pub struct Args {
    /// Path to a TOML config file
    #[arg(short, long, env = "VCMP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to bind the HTTP API to
    #[arg(long, env = "VCMP_BIND_ADDR")]
    pub bind_addr: Option<String>,

    /// Port for the HTTP API
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Seconds of inactivity before a room is left
    #[arg(long, env = "VCMP_IDLE_TIMEOUT_SECS")]
    pub idle_timeout_secs: Option<u64>,

    /// Number of entries shown by the queue command
    #[arg(long, env = "VCMP_QUEUE_DISPLAY_LIMIT")]
    pub queue_display_limit: Option<usize>,

    /// Prefix that marks a chat message as a command
    #[arg(long, env = "VCMP_COMMAND_PREFIX")]
    pub command_prefix: Option<String>,

    /// Media resolver executable (yt-dlp compatible)
    #[arg(long, env = "VCMP_RESOLVER_PROGRAM")]
    pub resolver_program: Option<String>,

    /// Seconds a single media lookup may take
    #[arg(long, env = "VCMP_RESOLVER_TIMEOUT_SECS")]
    pub resolver_timeout_secs: Option<u64>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            bind_addr: self.bind_addr.clone(),
            port: self.port,
            idle_timeout_secs: self.idle_timeout_secs,
            queue_display_limit: self.queue_display_limit,
            command_prefix: self.command_prefix.clone(),
            resolver_program: self.resolver_program.clone(),
            resolver_timeout_secs: self.resolver_timeout_secs,
        }
    }
}

/// Resolve the effective configuration for `args`
pub fn load(args: &Args) -> Result<SchedulerConfig> {
    let file = TomlConfig::load_or_default(args.config.as_deref())?;
    let config = resolve(&args.overrides(), &file)?;

    info!(
        "Configuration: bind {}:{}, idle timeout {}s, prefix '{}', resolver '{}' ({}s timeout)",
        config.bind_addr,
        config.port,
        config.idle_timeout_secs,
        config.command_prefix,
        config.resolver_program,
        config.resolver_timeout_secs
    );
    Ok(config)
}
