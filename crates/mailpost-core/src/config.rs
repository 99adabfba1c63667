//! Configuration resolution
//!
//! Resolves the filesystem locations the agent talks to, with priority:
//! 1. Per-key environment overrides (`MAILPOST_USER_DB`, `MAILPOST_NET_ROOT`,
//!    `MAILPOST_SPOOL_DIR`, `MAILPOST_MAIL_DAEMON`)
//! 2. An explicit config file (`--config`)
//! 3. Global config (`~/.config/mailpost/config.toml`)
//! 4. Defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Filesystem locations
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Filesystem locations the agent reads and writes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// User database, one `name:pw:uid:gid:gecos:home:shell` line per user
    pub user_db: PathBuf,

    /// Known-host root; `<net_root>/<host>` existing means the host is reachable
    pub net_root: PathBuf,

    /// Outbound spool directory scanned by the transport daemon
    pub spool_dir: PathBuf,

    /// Transport daemon executable, spawned on "send network mail now"
    pub mail_daemon: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            user_db: PathBuf::from("/etc/passwd"),
            net_root: PathBuf::from("/dev/net"),
            spool_dir: PathBuf::from("/usr/netmail"),
            mail_daemon: PathBuf::from("/usr/bin/maildaemon"),
        }
    }
}

/// Resolve configuration from all sources
///
/// An explicit config file must parse; a global config that fails to parse
/// is reported with a warning and ignored. Environment overrides are applied
/// last and win over both.
pub fn resolve_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = if let Some(path) = explicit {
        load_config_file(path)?
    } else {
        match global_config_path() {
            Some(path) if path.exists() => load_config_file(&path).unwrap_or_else(|e| {
                warn!("Failed to parse config at {path:?}: {e}");
                Config::default()
            }),
            _ => Config::default(),
        }
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("mailpost").join("config.toml"))
}

fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&contents)?)
}

fn apply_env_overrides(config: &mut Config) {
    if let Some(v) = env_path("MAILPOST_USER_DB") {
        config.paths.user_db = v;
    }
    if let Some(v) = env_path("MAILPOST_NET_ROOT") {
        config.paths.net_root = v;
    }
    if let Some(v) = env_path("MAILPOST_SPOOL_DIR") {
        config.paths.spool_dir = v;
    }
    if let Some(v) = env_path("MAILPOST_MAIL_DAEMON") {
        config.paths.mail_daemon = v;
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(PathBuf::from(v.trim())),
        _ => None,
    }
}
