//! Well-known locations under the parcel home directory.

use dirs::home_dir;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Environment variable overriding the parcel home directory.
pub const HOME_ENV: &str = "PARCEL_HOME";

/// Returns the parcel home directory, or None if the user's home cannot be resolved.
pub fn try_parcel_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var(HOME_ENV) {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".parcel"))
}

/// Returns the canonical parcel home directory (`~/.parcel`).
pub fn parcel_home() -> Result<PathBuf> {
    try_parcel_home().ok_or_else(|| {
        Error::Config(format!(
            "could not determine home directory, set {HOME_ENV} to override"
        ))
    })
}

/// Configuration file: ~/.parcel/config.toml
pub fn config_path() -> Result<PathBuf> {
    Ok(parcel_home()?.join("config.toml"))
}

/// Default file-backed catalog: ~/.parcel/catalog.toml
pub fn catalog_path() -> Result<PathBuf> {
    Ok(parcel_home()?.join("catalog.toml"))
}
