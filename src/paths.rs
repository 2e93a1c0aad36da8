//! Application directory paths for charla.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//! The config location can be overridden for testing or custom deployments
//! with `CHARLA_CONFIG_DIR`.

use std::path::PathBuf;

/// Configuration directory.
///
/// Resolves to `dirs::config_dir()/charla/` by default. Override with the
/// `CHARLA_CONFIG_DIR` environment variable.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("CHARLA_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("charla"))
        .unwrap_or_else(|| PathBuf::from("/tmp/charla-config"))
}

/// Default path of the client config file.
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}
