//! Config path resolution.
//!
//! Pattern database file:
//! 1. Explicit path
//! 2. `PUBLISHER_PATTERNS_CONFIG`
//! 3. `$XDG_CONFIG_HOME/publisher_patterns/publisher_patterns.json`
//! 4. Platform config dir
//!
//! Unconfirmed store directory:
//! 1. Explicit directory
//! 2. `PUBLISHER_PATTERNS_DATA`
//! 3. `$XDG_DATA_HOME/publisher_patterns`
//! 4. Platform data dir

use crate::{DATABASE_FILE_NAME, UNCONFIRMED_FILE_NAME};
use std::path::{Path, PathBuf};
use thiserror::Error;

const ENV_CONFIG_FILE: &str = "PUBLISHER_PATTERNS_CONFIG";
const ENV_DATA_DIR: &str = "PUBLISHER_PATTERNS_DATA";
const DIR_NAME: &str = "publisher_patterns";

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to resolve config directory")]
    ConfigDirUnavailable,

    #[error("failed to resolve data directory")]
    DataDirUnavailable,
}

/// Where the engine reads and writes its documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    pub database_file: PathBuf,
    pub unconfirmed_file: PathBuf,
}

impl ConfigPaths {
    /// Both documents inside one directory, with default filenames.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            database_file: dir.join(DATABASE_FILE_NAME),
            unconfirmed_file: dir.join(UNCONFIRMED_FILE_NAME),
        }
    }
}

/// Resolve both paths from explicit overrides, environment, and defaults.
pub fn resolve_paths(
    explicit_database: Option<&Path>,
    explicit_data_dir: Option<&Path>,
) -> Result<ConfigPaths, ResolveError> {
    let database_file = match explicit_database {
        Some(path) => path.to_path_buf(),
        None => resolve_database_file()?,
    };
    let data_dir = match explicit_data_dir {
        Some(dir) => dir.to_path_buf(),
        None => resolve_data_dir()?,
    };

    Ok(ConfigPaths {
        database_file,
        unconfirmed_file: data_dir.join(UNCONFIRMED_FILE_NAME),
    })
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn resolve_database_file() -> Result<PathBuf, ResolveError> {
    if let Some(path) = non_empty_env(ENV_CONFIG_FILE) {
        return Ok(PathBuf::from(path));
    }

    if let Some(xdg) = non_empty_env("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg).join(DIR_NAME).join(DATABASE_FILE_NAME));
    }

    dirs::config_dir()
        .map(|base| base.join(DIR_NAME).join(DATABASE_FILE_NAME))
        .ok_or(ResolveError::ConfigDirUnavailable)
}

fn resolve_data_dir() -> Result<PathBuf, ResolveError> {
    if let Some(dir) = non_empty_env(ENV_DATA_DIR) {
        return Ok(PathBuf::from(dir));
    }

    if let Some(xdg) = non_empty_env("XDG_DATA_HOME") {
        return Ok(PathBuf::from(xdg).join(DIR_NAME));
    }

    dirs::data_dir()
        .map(|base| base.join(DIR_NAME))
        .ok_or(ResolveError::DataDirUnavailable)
}
