//! cradlesync - offline change queue and sync engine for baby-care tracking
//!
//! Mutations recorded while the device is offline are queued, persisted, and
//! replayed against the backend in FIFO order once connectivity returns. See
//! [`sync::SyncQueue`] for the engine and [`storage::SqliteStore`] for the
//! on-disk queue.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod storage;
pub mod sync;

pub use cli::args::{Cli, Commands, OutputFormat};
pub use error::Error;
pub use storage::SqliteStore;
pub use sync::{ChangeType, PendingChange, SyncQueue, SyncStatus};
