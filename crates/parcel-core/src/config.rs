//! Runtime configuration.
//!
//! Loaded from `~/.parcel/config.toml` when present, then overridden from the
//! environment (`PARCEL_DOWNLOAD_DIR`, `PARCEL_STALL_TIMEOUT_SECS`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::install::CommandTemplates;
use crate::paths;

/// Overrides the download directory.
pub const DOWNLOAD_DIR_ENV: &str = "PARCEL_DOWNLOAD_DIR";
/// Overrides the stall timeout, in seconds; `0` disables it.
pub const STALL_TIMEOUT_ENV: &str = "PARCEL_STALL_TIMEOUT_SECS";

const DEFAULT_STALL_TIMEOUT_SECS: u64 = 60;

/// Resolved runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub download_dir: PathBuf,
    /// `None` disables stall detection.
    pub stall_timeout: Option<Duration>,
    pub commands: CommandTemplates,
    /// Handler namespaces in priority order.
    pub handler_order: Vec<String>,
}

/// On-disk shape; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    download_dir: Option<PathBuf>,
    stall_timeout_secs: Option<u64>,
    commands: Option<CommandTemplates>,
    handler_order: Vec<String>,
}

impl Config {
    /// Defaults rooted at `home`.
    pub fn with_home(home: &Path) -> Self {
        Self {
            download_dir: home.join("cache"),
            stall_timeout: Some(Duration::from_secs(DEFAULT_STALL_TIMEOUT_SECS)),
            commands: CommandTemplates::default(),
            handler_order: Vec::new(),
        }
    }

    /// Load `~/.parcel/config.toml` (if it exists) plus environment overrides.
    pub fn load() -> Result<Self> {
        let home = paths::parcel_home()?;
        let path = paths::config_path()?;
        let mut config = if path.exists() {
            Self::from_file(&path, &home)?
        } else {
            Self::with_home(&home)
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Parse a config file, with defaults rooted at `home`.
    pub fn from_file(path: &Path, home: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text, home).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    /// Parse config text, with defaults rooted at `home`.
    pub fn from_toml(text: &str, home: &Path) -> Result<Self> {
        let file: ConfigFile = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        let mut config = Self::with_home(home);
        if let Some(dir) = file.download_dir {
            config.download_dir = dir;
        }
        if let Some(secs) = file.stall_timeout_secs {
            config.stall_timeout = stall_timeout(secs);
        }
        if let Some(commands) = file.commands {
            config.commands = commands;
        }
        config.handler_order = file.handler_order;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var(DOWNLOAD_DIR_ENV) {
            self.download_dir = PathBuf::from(dir);
        }
        if let Ok(secs) = std::env::var(STALL_TIMEOUT_ENV) {
            let secs = secs
                .trim()
                .parse::<u64>()
                .map_err(|e| Error::Config(format!("{STALL_TIMEOUT_ENV}: {e}")))?;
            self.stall_timeout = stall_timeout(secs);
        }
        Ok(())
    }
}

/// Zero disables stall detection.
fn stall_timeout(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
