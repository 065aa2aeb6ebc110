//! Per-user config directory.
//!
//! Unix: `$HOME/.srec-lite`. Windows: `%APPDATA%\SrecLite`.
//! `SREC_LITE_CONFIG_DIR` or an explicit path overrides the default.

use std::path::PathBuf;

use crate::utils::fs::ensure_private_dir;
use crate::{Error, Result};

/// Environment variable overriding the config directory.
pub const CONFIG_DIR_ENV: &str = "SREC_LITE_CONFIG_DIR";

#[cfg(windows)]
fn default_config_dir() -> Option<PathBuf> {
    ::dirs::config_dir().map(|dir| dir.join("SrecLite"))
}

#[cfg(not(windows))]
fn default_config_dir() -> Option<PathBuf> {
    ::dirs::home_dir().map(|home| home.join(".srec-lite"))
}

/// Pick the config directory: explicit path, then env override, then default.
pub fn resolve_config_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir);
    }

    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    default_config_dir()
        .ok_or_else(|| Error::config("could not determine the user's home directory"))
}

/// Resolve the config directory and create it (mode `0700` on Unix) if absent.
pub fn prepare_config_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    let dir = resolve_config_dir(explicit)?;
    ensure_private_dir("creating config directory", &dir)?;
    Ok(dir)
}
