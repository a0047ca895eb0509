//! Unit tests for configuration loading and graceful degradation
//!
//! Tests cover:
//! - Missing TOML files fall back to defaults
//! - Explicit config files are parsed
//! - Malformed config files are reported
//! - Priority order: overrides > file > defaults
//!
//! Note: Uses serial_test to keep tests that touch the filesystem layout
//! from racing each other.

use serial_test::serial;
use std::io::Write;
use vcmp_common::config::{resolve, ConfigOverrides, SchedulerConfig, TomlConfig};
use vcmp_common::Error;

#[test]
#[serial]
fn test_missing_explicit_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    let file = TomlConfig::load_or_default(Some(&missing)).unwrap();
    assert_eq!(file, TomlConfig::default());

    let config = resolve(&ConfigOverrides::default(), &file).unwrap();
    assert_eq!(config, SchedulerConfig::default());
}

#[test]
#[serial]
fn test_explicit_file_is_parsed() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
port = 9100
idle_timeout_secs = 120
queue_display_limit = 5
command_prefix = "?"
resolver_timeout_secs = 45
"#
    )
    .unwrap();

    let toml = TomlConfig::load_or_default(Some(file.path())).unwrap();
    let config = resolve(&ConfigOverrides::default(), &toml).unwrap();

    assert_eq!(config.port, 9100);
    assert_eq!(config.idle_timeout_secs, 120);
    assert_eq!(config.queue_display_limit, 5);
    assert_eq!(config.command_prefix, "?");
    assert_eq!(config.resolver_timeout(), std::time::Duration::from_secs(45));
    // Unset keys keep compiled defaults
    assert_eq!(config.resolver_program, "yt-dlp");
    assert_eq!(config.bind_addr, "0.0.0.0");
}

#[test]
#[serial]
fn test_malformed_file_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "port = \"not a number\"").unwrap();

    let result = TomlConfig::load_or_default(Some(file.path()));
    assert!(matches!(result, Err(Error::Toml(_))));
}

#[test]
fn test_override_priority() {
    let file = TomlConfig {
        queue_display_limit: Some(3),
        resolver_program: Some("/opt/yt-dlp".to_string()),
        ..Default::default()
    };
    let overrides = ConfigOverrides {
        queue_display_limit: Some(20),
        ..Default::default()
    };

    let config = resolve(&overrides, &file).unwrap();
    assert_eq!(config.queue_display_limit, 20);
    assert_eq!(config.resolver_program, "/opt/yt-dlp");
}

#[test]
fn test_empty_prefix_rejected() {
    let overrides = ConfigOverrides {
        command_prefix: Some(String::new()),
        ..Default::default()
    };
    assert!(matches!(
        resolve(&overrides, &TomlConfig::default()),
        Err(Error::Config(_))
    ));
}
