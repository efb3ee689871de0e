//! Config file location and command-line overrides.

use std::path::{Path, PathBuf};

use stencil_core::GeneratorConfig;

/// `~/.stencil`, holding `config.toml` and, unless configured otherwise,
/// the metadata database.
pub fn home_dir() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".stencil")
}

pub fn default_path() -> PathBuf {
    home_dir().join("config.toml")
}

/// Load the config file, apply `--flag=value` overrides, and default the
/// data directory to [`home_dir`].
pub fn load(path: &Path, overrides: &[String]) -> anyhow::Result<GeneratorConfig> {
    let mut config = GeneratorConfig::load(path)
        .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?
        .apply_args(overrides);
    if config.data_dir.is_none() && config.db_path.is_none() {
        config.data_dir = Some(home_dir());
    }
    Ok(config)
}
