//! Configuration management for cradlesync.
//!
//! This module handles loading and saving configuration from `~/.cradlesync/`.

mod paths;
mod settings;

pub use paths::Paths;
pub use settings::{BackoffConfig, Config, ConnectivityConfig, LoggingConfig, RemoteConfig, SyncConfig};
