//! Path resolution for cradlesync configuration and data files.
//!
//! All cradlesync data is stored in `~/.cradlesync/`:
//! - `config.yaml` - Main configuration file
//! - `queue.db` - SQLite database holding the sync queue

use std::path::PathBuf;

use crate::error::Error;

/// Paths to cradlesync configuration and data files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    /// Root directory: `~/.cradlesync/`
    pub root: PathBuf,
    /// Config file: `~/.cradlesync/config.yaml`
    pub config_file: PathBuf,
    /// Database file: `~/.cradlesync/queue.db`
    pub database: PathBuf,
}

impl Paths {
    /// Create paths based on the user's home directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, Error> {
        let home = std::env::var("HOME")
            .map_err(|_| Error::Config("Could not determine home directory".to_string()))?;

        Ok(Self::with_root(PathBuf::from(home).join(".cradlesync")))
    }

    /// Create paths with a custom root directory.
    #[must_use]
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            config_file: root.join("config.yaml"),
            database: root.join("queue.db"),
            root,
        }
    }

    /// Ensure the root directory exists.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation fails.
    pub fn ensure_dirs(&self) -> Result<(), Error> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root).map_err(|e| {
                Error::Config(format!(
                    "Failed to create directory {}: {e}",
                    self.root.display()
                ))
            })?;
        }
        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| Self::with_root(PathBuf::from(".cradlesync")))
    }
}
