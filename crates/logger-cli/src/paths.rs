//! File system locations used by the CLI.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

/// Directory for CLI state (~/.stream-logger).
pub fn base_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
    Ok(home.join(".stream-logger"))
}

/// Default logger database (~/.stream-logger/logger.sqlite).
pub fn default_database_path() -> Result<PathBuf> {
    Ok(database_path_in(&base_dir()?))
}

fn database_path_in(base: &Path) -> PathBuf {
    base.join("logger.sqlite")
}
